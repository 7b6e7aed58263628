use ash::vk;
use winit::{
    raw_window_handle::{
        HandleError, HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle,
    },
    window::Window,
};

/// What the context needs from the windowing side: a size and the two native handles used
/// for surface creation. The handles are passed through untouched.
#[derive(Debug, Clone, Copy)]
pub struct WindowTarget {
    pub width: u32,
    pub height: u32,
    pub display_handle: RawDisplayHandle,
    pub window_handle: RawWindowHandle,
}

impl WindowTarget {
    pub fn from_window(window: &Window) -> Result<Self, HandleError> {
        let size = window.inner_size();

        Ok(Self {
            width: size.width,
            height: size.height,
            display_handle: window.display_handle()?.as_raw(),
            window_handle: window.window_handle()?.as_raw(),
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width,
            height: self.height,
        }
    }
}
