use ash::vk;
use thiserror::Error;

use super::{
    commands::CommandRecorder,
    driver::Driver,
    error::ErrorKind,
    instance::GpuDescriptor,
    memory::{MemoryAllocateError, MemoryRegion},
};

pub const DEPTH_FORMAT: vk::Format = vk::Format::D16_UNORM;

/// Linear tiling when the format can be a depth attachment with it, otherwise optimal tiling,
/// otherwise `None`.
pub fn select_tiling(properties: &vk::FormatProperties) -> Option<vk::ImageTiling> {
    let feature = vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT;

    if properties.linear_tiling_features.contains(feature) {
        Some(vk::ImageTiling::LINEAR)
    } else if properties.optimal_tiling_features.contains(feature) {
        Some(vk::ImageTiling::OPTIMAL)
    } else {
        None
    }
}

pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM_S8_UINT
        | vk::Format::D24_UNORM_S8_UINT
        | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::DEPTH,
    }
}

#[derive(Debug)]
pub struct DepthResource {
    pub(crate) image: vk::Image,
    pub(crate) memory: MemoryRegion,
    pub(crate) view: vk::ImageView,

    pub format: vk::Format,
    pub tiling: vk::ImageTiling,
    /// Window extent at creation. It can differ from the swapchain extent when the surface
    /// reports its own current extent.
    pub extent: vk::Extent2D,
}

#[derive(Debug, Error)]
pub enum DepthCreateError {
    #[error("vulkan call to query depth format properties failed")]
    FormatQuery(vk::Result),

    #[error("depth format {0:?} unsupported")]
    UnsupportedFormat(vk::Format),

    #[error("vulkan call to create depth image failed")]
    ImageCreation(vk::Result),

    #[error("vulkan call to query depth image memory requirements failed")]
    MemoryRequirementsQuery(vk::Result),

    #[error("depth image memory allocation failed")]
    MemoryAllocation(#[from] MemoryAllocateError),

    #[error("vulkan call to bind depth image memory failed")]
    MemoryBinding(vk::Result),

    #[error("recording depth image layout transition failed")]
    LayoutTransition(vk::Result),

    #[error("vulkan call to create depth image view failed")]
    ImageViewCreation(vk::Result),
}

impl DepthCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_) => ErrorKind::FormatUnsupported,
            Self::MemoryAllocation(err) => err.kind(),
            Self::FormatQuery(result)
            | Self::ImageCreation(result)
            | Self::MemoryRequirementsQuery(result)
            | Self::MemoryBinding(result)
            | Self::LayoutTransition(result)
            | Self::ImageViewCreation(result) => ErrorKind::from_vk(*result),
        }
    }
}

impl DepthResource {
    pub(crate) fn create(
        driver: &dyn Driver,
        gpu: &GpuDescriptor,
        recorder: &CommandRecorder,
        extent: vk::Extent2D,
    ) -> Result<Self, DepthCreateError> {
        let format = DEPTH_FORMAT;
        let properties = driver
            .format_properties(gpu.handle, format)
            .map_err(DepthCreateError::FormatQuery)?;
        let tiling = select_tiling(&properties).ok_or(DepthCreateError::UnsupportedFormat(format))?;
        log::debug!("depth buffer: {format:?} with {tiling:?} tiling");

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(tiling)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let image = driver
            .create_image(&image_info)
            .map_err(DepthCreateError::ImageCreation)?;

        let memory = match Self::bind_memory(driver, gpu, image) {
            Ok(memory) => memory,
            Err(err) => {
                driver.destroy_image(image);
                return Err(err);
            }
        };

        let aspect_mask = aspect_mask(format);
        let view = match Self::finish_image(driver, recorder, image, format, aspect_mask) {
            Ok(view) => view,
            Err(err) => {
                driver.destroy_image(image);
                memory.free(driver);
                return Err(err);
            }
        };

        Ok(Self {
            image,
            memory,
            view,
            format,
            tiling,
            extent,
        })
    }

    fn bind_memory(
        driver: &dyn Driver,
        gpu: &GpuDescriptor,
        image: vk::Image,
    ) -> Result<MemoryRegion, DepthCreateError> {
        let requirements = driver
            .image_memory_requirements(image)
            .map_err(DepthCreateError::MemoryRequirementsQuery)?;
        let memory = MemoryRegion::allocate(
            driver,
            &gpu.memory_properties,
            &requirements,
            vk::MemoryPropertyFlags::empty(),
        )?;

        if let Err(err) = driver.bind_image_memory(image, memory.handle, 0) {
            memory.free(driver);
            return Err(DepthCreateError::MemoryBinding(err));
        }

        Ok(memory)
    }

    fn finish_image(
        driver: &dyn Driver,
        recorder: &CommandRecorder,
        image: vk::Image,
        format: vk::Format,
        aspect_mask: vk::ImageAspectFlags,
    ) -> Result<vk::ImageView, DepthCreateError> {
        recorder
            .transition_layout(
                driver,
                image,
                aspect_mask,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            )
            .map_err(DepthCreateError::LayoutTransition)?;

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
                    .aspect_mask(aspect_mask)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );

        driver
            .create_image_view(&view_info)
            .map_err(DepthCreateError::ImageViewCreation)
    }

    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    pub(crate) fn destroy(&self, driver: &dyn Driver) {
        log::debug!("destroying depth buffer");
        driver.destroy_image_view(self.view);
        driver.destroy_image(self.image);
        self.memory.free(driver);
    }
}
