use ash::vk;
use thiserror::Error;

use super::{
    commands::CommandRecorder, device::DeviceContext, driver::Driver, error::ErrorKind,
};

/// Present mode by priority: mailbox, then immediate, then FIFO which every implementation
/// must support.
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| available.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// One more image than the minimum, clamped to the maximum when there is one.
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count + 1;
    match capabilities.max_image_count {
        0 => image_count,
        max => image_count.min(max),
    }
}

/// The surface's current extent, or `window_extent` when the surface leaves it to the
/// swapchain (`width == u32::MAX`).
pub fn resolve_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    window_extent: vk::Extent2D,
) -> vk::Extent2D {
    match capabilities.current_extent.width {
        u32::MAX => window_extent,
        _ => capabilities.current_extent,
    }
}

pub fn select_pre_transform(
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::SurfaceTransformFlagsKHR {
    if capabilities
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        capabilities.current_transform
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainImage {
    /// Owned by the swapchain, never destroyed here.
    pub image: vk::Image,
    pub view: vk::ImageView,
}

#[derive(Debug)]
pub struct Swapchain {
    pub(crate) handle: vk::SwapchainKHR,

    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub format: vk::SurfaceFormatKHR,
    pub images: Vec<SwapchainImage>,

    pub current_image_index: usize,
}

#[derive(Debug, Error)]
pub enum SwapchainCreateError {
    #[error("vulkan call to query surface capabilities failed")]
    CapabilitiesQuery(vk::Result),

    #[error("vulkan call to query present modes failed")]
    PresentModesQuery(vk::Result),

    #[error("vulkan call to create the swapchain failed")]
    VulkanCreation(vk::Result),

    #[error("vulkan call to fetch swapchain images failed")]
    ImageFetching(vk::Result),

    #[error("recording swapchain image layout transition failed")]
    LayoutTransition(vk::Result),

    #[error("vulkan call to create swapchain image views failed")]
    ImageViewCreation(vk::Result),
}

impl SwapchainCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilitiesQuery(result)
            | Self::PresentModesQuery(result)
            | Self::VulkanCreation(result)
            | Self::ImageFetching(result)
            | Self::LayoutTransition(result)
            | Self::ImageViewCreation(result) => ErrorKind::from_vk(*result),
        }
    }
}

impl Swapchain {
    pub(crate) fn create(
        driver: &dyn Driver,
        device: &DeviceContext,
        recorder: &CommandRecorder,
        window_extent: vk::Extent2D,
    ) -> Result<Self, SwapchainCreateError> {
        let capabilities = driver
            .surface_capabilities(device.physical_device, device.surface)
            .map_err(SwapchainCreateError::CapabilitiesQuery)?;
        let present_modes = driver
            .surface_present_modes(device.physical_device, device.surface)
            .map_err(SwapchainCreateError::PresentModesQuery)?;

        let extent = resolve_extent(&capabilities, window_extent);
        let present_mode = select_present_mode(&present_modes);
        let min_image_count = select_image_count(&capabilities);
        let pre_transform = select_pre_transform(&capabilities);
        let format = device.surface_format;
        log::debug!(
            "creating swapchain: {}x{}, {present_mode:?}, {min_image_count} images",
            extent.width,
            extent.height
        );

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(device.surface)
            .min_image_count(min_image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true);

        let handle = driver
            .create_swapchain(&create_info)
            .map_err(SwapchainCreateError::VulkanCreation)?;

        let mut images = Vec::new();
        if let Err(err) = Self::prepare_images(driver, recorder, handle, format.format, &mut images)
        {
            for image in &images {
                driver.destroy_image_view(image.view);
            }
            driver.destroy_swapchain(handle);
            return Err(err);
        }

        Ok(Self {
            handle,
            extent,
            present_mode,
            format,
            images,
            current_image_index: 0,
        })
    }

    /// Transitions every swapchain image to `COLOR_ATTACHMENT_OPTIMAL` and creates its view.
    /// Views created before a failure are left in `images` for the caller to release.
    fn prepare_images(
        driver: &dyn Driver,
        recorder: &CommandRecorder,
        handle: vk::SwapchainKHR,
        format: vk::Format,
        images: &mut Vec<SwapchainImage>,
    ) -> Result<(), SwapchainCreateError> {
        let image_handles = driver
            .swapchain_images(handle)
            .map_err(SwapchainCreateError::ImageFetching)?;

        for image in image_handles {
            recorder
                .transition_layout(
                    driver,
                    image,
                    vk::ImageAspectFlags::COLOR,
                    vk::ImageLayout::UNDEFINED,
                    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                )
                .map_err(SwapchainCreateError::LayoutTransition)?;

            let view_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(
                    vk::ComponentMapping::default()
                        .r(vk::ComponentSwizzle::R)
                        .g(vk::ComponentSwizzle::G)
                        .b(vk::ComponentSwizzle::B)
                        .a(vk::ComponentSwizzle::A),
                )
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .base_mip_level(0)
                        .level_count(1)
                        .base_array_layer(0)
                        .layer_count(1),
                );
            let view = driver
                .create_image_view(&view_info)
                .map_err(SwapchainCreateError::ImageViewCreation)?;

            images.push(SwapchainImage { image, view });
        }

        Ok(())
    }

    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    pub(crate) fn destroy(&self, driver: &dyn Driver) {
        log::debug!("destroying swapchain");
        for image in &self.images {
            driver.destroy_image_view(image.view);
        }
        driver.destroy_swapchain(self.handle);
    }
}
