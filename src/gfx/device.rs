use ash::{khr, vk};
use thiserror::Error;

use super::{
    driver::{DeviceDesc, Driver},
    error::ErrorKind,
    instance::GpuDescriptor,
    window::WindowTarget,
};

/// Substituted when the surface has no preferred format.
pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

const QUEUE_PRIORITIES: [f32; 1] = [0.0];

/// The logical device side of the context: surface, chosen queue family and its one queue,
/// and the surface format every swapchain image uses.
#[derive(Debug)]
pub struct DeviceContext {
    pub(crate) physical_device: vk::PhysicalDevice,
    pub(crate) surface: vk::SurfaceKHR,
    pub(crate) queue_family_index: u32,
    pub(crate) queue: vk::Queue,
    pub(crate) surface_format: vk::SurfaceFormatKHR,
}

#[derive(Debug, Error)]
pub enum DeviceCreateError {
    #[error("vulkan call to create the surface failed")]
    SurfaceCreation(vk::Result),

    #[error("vulkan call to query surface support failed")]
    SurfaceSupportQuery(vk::Result),

    #[error("can't find a queue for graphics+presenting on {0}")]
    NoSuitableQueue(String),

    #[error("vulkan call to query surface formats failed")]
    FormatQuery(vk::Result),

    #[error("no surface formats reported")]
    NoSurfaceFormat,

    #[error("vulkan call to create logical device failed")]
    VulkanCreation(vk::Result),

    #[error("vulkan call to fetch the device queue failed")]
    QueueFetching(vk::Result),
}

impl DeviceCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuitableQueue(_) => ErrorKind::QueueNotFound,
            Self::NoSurfaceFormat => ErrorKind::FormatUnsupported,
            Self::SurfaceCreation(result)
            | Self::SurfaceSupportQuery(result)
            | Self::FormatQuery(result)
            | Self::VulkanCreation(result)
            | Self::QueueFetching(result) => ErrorKind::from_vk(*result),
        }
    }
}

/// First queue family, in enumeration order, that has graphics capability and can present to
/// `surface`.
///
/// Graphics and presentation always share this one family. Hardware exposing them only on
/// separate families is rejected.
pub fn select_queue_family(
    driver: &dyn Driver,
    gpu: &GpuDescriptor,
    surface: vk::SurfaceKHR,
) -> Result<u32, DeviceCreateError> {
    for (index, family) in gpu.queue_families.iter().enumerate() {
        let index = index as u32;
        let supports_present = driver
            .surface_support(gpu.handle, index, surface)
            .map_err(DeviceCreateError::SurfaceSupportQuery)?;

        if supports_present && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            return Ok(index);
        }
    }

    Err(DeviceCreateError::NoSuitableQueue(gpu.name().to_owned()))
}

/// First reported format, or [`DEFAULT_SURFACE_FORMAT`] when that one is `UNDEFINED`.
pub fn select_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    match formats {
        [] => None,
        [first, ..] if first.format == vk::Format::UNDEFINED => Some(DEFAULT_SURFACE_FORMAT),
        [first, ..] => Some(*first),
    }
}

impl DeviceContext {
    pub(crate) fn create(
        driver: &mut dyn Driver,
        gpu: &GpuDescriptor,
        window: &WindowTarget,
    ) -> Result<Self, DeviceCreateError> {
        let surface = driver
            .create_surface(window.display_handle, window.window_handle)
            .map_err(DeviceCreateError::SurfaceCreation)?;

        match Self::create_on_surface(driver, gpu, surface) {
            Ok(device) => Ok(device),
            Err(err) => {
                driver.destroy_surface(surface);
                Err(err)
            }
        }
    }

    fn create_on_surface(
        driver: &mut dyn Driver,
        gpu: &GpuDescriptor,
        surface: vk::SurfaceKHR,
    ) -> Result<Self, DeviceCreateError> {
        let queue_family_index = select_queue_family(driver, gpu, surface)?;
        log::debug!("selected queue family {queue_family_index}");

        let formats = driver
            .surface_formats(gpu.handle, surface)
            .map_err(DeviceCreateError::FormatQuery)?;
        let surface_format =
            select_surface_format(&formats).ok_or(DeviceCreateError::NoSurfaceFormat)?;
        log::debug!("selected surface format {surface_format:?}");

        let extensions = [khr::swapchain::NAME];
        let desc = DeviceDesc {
            queue_family_index,
            queue_priorities: &QUEUE_PRIORITIES,
            extensions: &extensions,
        };
        driver
            .create_device(gpu.handle, &desc)
            .map_err(DeviceCreateError::VulkanCreation)?;

        let queue = match driver.device_queue(queue_family_index, 0) {
            Ok(queue) => queue,
            Err(err) => {
                driver.destroy_device();
                return Err(DeviceCreateError::QueueFetching(err));
            }
        };

        Ok(Self {
            physical_device: gpu.handle,
            surface,
            queue_family_index,
            queue,
            surface_format,
        })
    }

    pub fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Destroys the logical device, then the surface.
    pub(crate) fn destroy(&self, driver: &mut dyn Driver) {
        log::debug!("destroying device");
        driver.destroy_device();
        driver.destroy_surface(self.surface);
    }
}
