// re-exports
pub use ash;
pub use winit;

pub mod application;
pub mod gfx;

mod debug;
