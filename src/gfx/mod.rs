mod debug;

pub mod barrier;
pub mod buffer;
pub mod commands;
pub mod context;
pub mod depth;
pub mod descriptor;
pub mod device;
pub mod driver;
pub mod error;
pub mod instance;
pub mod memory;
pub mod resources;
pub mod shader;
pub mod swapchain;
pub mod vulkan;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;
