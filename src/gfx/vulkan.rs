use std::ffi::{CStr, c_char, c_void};

use ash::{ext, khr, prelude::VkResult, vk};
use winit::raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use super::{
    debug::DebugMessenger,
    driver::{DeviceDesc, Driver, InstanceDesc},
};

struct LiveInstance {
    handle: ash::Instance,
    surface_loader: khr::surface::Instance,
    debug_messenger: Option<DebugMessenger>,
}

struct LiveDevice {
    handle: ash::Device,
    swapchain_loader: khr::swapchain::Device,
}

/// [`Driver`] implementation bound to the system Vulkan loader.
///
/// The adapter owns the `ash` dispatch tables for the instance and the logical device once
/// they are created. Device level calls made before [`Driver::create_device`] fail with
/// `VK_ERROR_INITIALIZATION_FAILED`.
pub struct VulkanDriver {
    device: Option<LiveDevice>,
    instance: Option<LiveInstance>,
    entry: ash::Entry,
}

impl VulkanDriver {
    pub fn load() -> Result<Self, ash::LoadingError> {
        // SAFETY: This is basically foreign code execution, and there is not way to properly ensure safety
        // here. It is unfortunately an uncontrollable risk we must accept.
        let entry = unsafe { ash::Entry::load() }?;

        Ok(Self {
            device: None,
            instance: None,
            entry,
        })
    }

    fn instance(&self) -> VkResult<&LiveInstance> {
        self.instance
            .as_ref()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn device(&self) -> VkResult<&ash::Device> {
        self.device
            .as_ref()
            .map(|device| &device.handle)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn swapchain_loader(&self) -> VkResult<&khr::swapchain::Device> {
        self.device
            .as_ref()
            .map(|device| &device.swapchain_loader)
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }
}

impl Drop for VulkanDriver {
    fn drop(&mut self) {
        self.destroy_device();
        self.destroy_instance();
    }
}

fn name_pointers(names: &[&CStr]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

// SAFETY (applies to every call below): all handles passed in were created through this same
// adapter, and the owning `Context` destroys children before their parents.
impl Driver for VulkanDriver {
    fn instance_layer_count(&self) -> VkResult<u32> {
        let mut count = 0;
        // A null properties pointer only asks the loader for the count.
        unsafe {
            (self.entry.fp_v1_0().enumerate_instance_layer_properties)(
                &mut count,
                std::ptr::null_mut(),
            )
        }
        .result_with_success(count)
    }

    fn instance_layers(&self, capacity: u32) -> VkResult<Option<Vec<vk::LayerProperties>>> {
        let mut count = capacity;
        let mut layers = vec![vk::LayerProperties::default(); capacity as usize];
        let result = unsafe {
            (self.entry.fp_v1_0().enumerate_instance_layer_properties)(
                &mut count,
                layers.as_mut_ptr(),
            )
        };

        match result {
            vk::Result::SUCCESS => {
                layers.truncate(count as usize);
                Ok(Some(layers))
            }
            vk::Result::INCOMPLETE => Ok(None),
            err => Err(err),
        }
    }

    fn required_surface_extensions(
        &self,
        display_handle: RawDisplayHandle,
    ) -> VkResult<Vec<&'static CStr>> {
        let extensions = ash_window::enumerate_required_extensions(display_handle)?;

        // ash_window only hands out pointers to static extension name constants.
        Ok(extensions
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect())
    }

    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> VkResult<()> {
        let app_info = vk::ApplicationInfo::default()
            .application_name(desc.application_name)
            .application_version(desc.application_version)
            .engine_name(desc.engine_name)
            .engine_version(desc.engine_version)
            .api_version(desc.api_version);
        let extensions = name_pointers(&desc.extensions);
        let layers = name_pointers(&desc.layers);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        // SAFETY: The entry is stored alongside the instance and dropped after it.
        let handle = unsafe { self.entry.create_instance(&create_info, None) }?;

        let debug_messenger = match desc.debug_messenger
            && desc.extensions.contains(&ext::debug_utils::NAME)
        {
            true => match DebugMessenger::create(&self.entry, &handle) {
                Ok(messenger) => Some(messenger),
                Err(err) => {
                    unsafe { handle.destroy_instance(None) };
                    return Err(err);
                }
            },
            false => None,
        };
        let surface_loader = khr::surface::Instance::new(&self.entry, &handle);

        self.instance = Some(LiveInstance {
            handle,
            surface_loader,
            debug_messenger,
        });

        Ok(())
    }

    fn destroy_instance(&mut self) {
        if let Some(mut instance) = self.instance.take() {
            drop(instance.debug_messenger.take());

            log::debug!("destroying instance");
            unsafe { instance.handle.destroy_instance(None) };
        }
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.handle.enumerate_physical_devices() }
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        let instance = &self.instance()?.handle;
        Ok(unsafe { instance.get_physical_device_queue_family_properties(physical_device) })
    }

    fn memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        let instance = &self.instance()?.handle;
        Ok(unsafe { instance.get_physical_device_memory_properties(physical_device) })
    }

    fn device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceProperties> {
        let instance = &self.instance()?.handle;
        Ok(unsafe { instance.get_physical_device_properties(physical_device) })
    }

    fn format_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        format: vk::Format,
    ) -> VkResult<vk::FormatProperties> {
        let instance = &self.instance()?.handle;
        Ok(unsafe { instance.get_physical_device_format_properties(physical_device, format) })
    }

    fn create_surface(
        &self,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        let instance = &self.instance()?.handle;
        // SAFETY: The window handles come straight from a live window, which the caller keeps
        // alive for as long as the surface.
        unsafe {
            ash_window::create_surface(&self.entry, instance, display_handle, window_handle, None)
        }
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        if let Ok(instance) = self.instance() {
            unsafe { instance.surface_loader.destroy_surface(surface, None) };
        }
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        unsafe {
            self.instance()?
                .surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, surface)
        }
    }

    fn surface_formats(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        unsafe {
            self.instance()?
                .surface_loader
                .get_physical_device_surface_formats(physical_device, surface)
        }
    }

    fn surface_capabilities(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.instance()?
                .surface_loader
                .get_physical_device_surface_capabilities(physical_device, surface)
        }
    }

    fn surface_present_modes(
        &self,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        unsafe {
            self.instance()?
                .surface_loader
                .get_physical_device_surface_present_modes(physical_device, surface)
        }
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc<'_>,
    ) -> VkResult<()> {
        let instance = &self.instance()?.handle;

        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(desc.queue_family_index)
            .queue_priorities(desc.queue_priorities)];
        let extensions = name_pointers(desc.extensions);
        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions);

        let handle = unsafe { instance.create_device(physical_device, &create_info, None) }?;
        let swapchain_loader = khr::swapchain::Device::new(instance, &handle);

        self.device = Some(LiveDevice {
            handle,
            swapchain_loader,
        });

        Ok(())
    }

    fn destroy_device(&mut self) {
        if let Some(device) = self.device.take() {
            log::debug!("destroying logical device");
            unsafe { device.handle.destroy_device(None) };
        }
    }

    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue> {
        Ok(unsafe {
            self.device()?
                .get_device_queue(queue_family_index, queue_index)
        })
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        unsafe { self.device()?.create_command_pool(info, None) }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_command_pool(pool, None) };
        }
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        unsafe { self.device()?.allocate_command_buffers(info) }
    }

    fn begin_command_buffer(
        &self,
        cmd_buffer: vk::CommandBuffer,
        info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        unsafe { self.device()?.begin_command_buffer(cmd_buffer, info) }
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd_buffer: vk::CommandBuffer,
        src_stages: vk::PipelineStageFlags,
        dst_stages: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) -> VkResult<()> {
        unsafe {
            self.device()?.cmd_pipeline_barrier(
                cmd_buffer,
                src_stages,
                dst_stages,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                image_barriers,
            )
        };

        Ok(())
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        unsafe { self.swapchain_loader()?.create_swapchain(info, None) }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        if let Ok(loader) = self.swapchain_loader() {
            unsafe { loader.destroy_swapchain(swapchain, None) };
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        unsafe { self.swapchain_loader()?.get_swapchain_images(swapchain) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        unsafe { self.device()?.create_image(info, None) }
    }

    fn destroy_image(&self, image: vk::Image) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_image(image, None) };
        }
    }

    fn image_memory_requirements(&self, image: vk::Image) -> VkResult<vk::MemoryRequirements> {
        Ok(unsafe { self.device()?.get_image_memory_requirements(image) })
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.device()?.bind_image_memory(image, memory, offset) }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        unsafe { self.device()?.create_image_view(info, None) }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_image_view(view, None) };
        }
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        unsafe { self.device()?.create_buffer(info, None) }
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_buffer(buffer, None) };
        }
    }

    fn buffer_memory_requirements(
        &self,
        buffer: vk::Buffer,
    ) -> VkResult<vk::MemoryRequirements> {
        Ok(unsafe { self.device()?.get_buffer_memory_requirements(buffer) })
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        unsafe { self.device()?.bind_buffer_memory(buffer, memory, offset) }
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        unsafe { self.device()?.allocate_memory(info, None) }
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        if let Ok(device) = self.device() {
            unsafe { device.free_memory(memory, None) };
        }
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        unsafe {
            self.device()?
                .map_memory(memory, offset, size, vk::MemoryMapFlags::empty())
        }
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        if let Ok(device) = self.device() {
            unsafe { device.unmap_memory(memory) };
        }
    }

    fn flush_mapped_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<()> {
        let range = vk::MappedMemoryRange::default()
            .memory(memory)
            .offset(offset)
            .size(size);
        unsafe { self.device()?.flush_mapped_memory_ranges(&[range]) }
    }

    fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        unsafe { self.device()?.create_shader_module(info, None) }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_shader_module(module, None) };
        }
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        unsafe { self.device()?.create_descriptor_set_layout(info, None) }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_descriptor_set_layout(layout, None) };
        }
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        unsafe { self.device()?.create_pipeline_layout(info, None) }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_pipeline_layout(layout, None) };
        }
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        unsafe { self.device()?.create_descriptor_pool(info, None) }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        if let Ok(device) = self.device() {
            unsafe { device.destroy_descriptor_pool(pool, None) };
        }
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        unsafe { self.device()?.allocate_descriptor_sets(info) }
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) -> VkResult<()> {
        unsafe { self.device()?.update_descriptor_sets(writes, &[]) };

        Ok(())
    }
}
