use std::ffi::{CStr, c_void};

use ash::{prelude::VkResult, vk};
use winit::raw_window_handle::{RawDisplayHandle, RawWindowHandle};

/// Everything needed to create the API instance.
#[derive(Debug, Clone)]
pub struct InstanceDesc<'a> {
    pub application_name: &'a CStr,
    pub application_version: u32,
    pub engine_name: &'a CStr,
    pub engine_version: u32,
    pub api_version: u32,

    pub extensions: Vec<&'a CStr>,
    pub layers: Vec<&'a CStr>,

    /// Install a debug messenger forwarding driver messages to `log`. Only honored when the
    /// debug utils extension is part of `extensions`.
    pub debug_messenger: bool,
}

/// Everything needed to create the logical device. One queue is created per priority.
#[derive(Debug, Clone)]
pub struct DeviceDesc<'a> {
    pub queue_family_index: u32,
    pub queue_priorities: &'a [f32],
    pub extensions: &'a [&'a CStr],
}

/// The driver call surface used by the bootstrap layer.
///
/// There is exactly one live implementation, [`crate::gfx::vulkan::VulkanDriver`]. Every
/// manager in [`crate::gfx`] only talks to the GPU through this trait, which keeps all the
/// sequencing and negotiation logic testable against a fake.
///
/// Handles and create infos are the raw `ash::vk` types. Implementations are not required to
/// be thread safe: the underlying API demands external synchronization on every handle, and
/// nothing in this crate submits work concurrently.
pub trait Driver {
    // instance level

    /// Number of instance layers the loader currently reports.
    fn instance_layer_count(&self) -> VkResult<u32>;

    /// Fetches up to `capacity` layer records. Returns `None` when the loader reported more
    /// layers than `capacity` (`VK_INCOMPLETE`), meaning the count changed since it was queried.
    fn instance_layers(&self, capacity: u32) -> VkResult<Option<Vec<vk::LayerProperties>>>;

    /// The generic surface extension plus the platform specific one for `display_handle`.
    fn required_surface_extensions(
        &self,
        display_handle: RawDisplayHandle,
    ) -> VkResult<Vec<&'static CStr>>;

    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> VkResult<()>;
    fn destroy_instance(&mut self);

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>>;
    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>>;
    fn memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties>;
    fn device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceProperties>;
    fn format_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        format: vk::Format,
    ) -> VkResult<vk::FormatProperties>;

    // surface

    fn create_surface(
        &self,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR>;
    fn destroy_surface(&self, surface: vk::SurfaceKHR);
    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool>;
    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>>;
    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR>;
    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>>;

    // device level

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc<'_>,
    ) -> VkResult<()>;
    fn destroy_device(&mut self);
    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue>;

    fn create_command_pool(&self, info: &vk::CommandPoolCreateInfo<'_>)
    -> VkResult<vk::CommandPool>;
    fn destroy_command_pool(&self, pool: vk::CommandPool);
    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>>;
    fn begin_command_buffer(
        &self,
        cmd_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()>;
    fn cmd_pipeline_barrier(
        &self,
        cmd_buffer: vk::CommandBuffer,
        src_stages: vk::PipelineStageFlags,
        dst_stages: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) -> VkResult<()>;

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>>;

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image>;
    fn destroy_image(&self, image: vk::Image);
    fn image_memory_requirements(&self, image: vk::Image) -> VkResult<vk::MemoryRequirements>;
    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView>;
    fn destroy_image_view(&self, view: vk::ImageView);

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer>;
    fn destroy_buffer(&self, buffer: vk::Buffer);
    fn buffer_memory_requirements(&self, buffer: vk::Buffer)
    -> VkResult<vk::MemoryRequirements>;
    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()>;

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory>;
    fn free_memory(&self, memory: vk::DeviceMemory);
    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void>;
    fn unmap_memory(&self, memory: vk::DeviceMemory);
    fn flush_mapped_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<()>;

    fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule>;
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);
    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);
    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);
    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>>;
    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) -> VkResult<()>;
}
