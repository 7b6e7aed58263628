//! In-memory [`Driver`] used by the unit tests.

use std::{
    cell::{Ref, RefCell},
    collections::{HashMap, VecDeque},
    ffi::{CStr, c_char, c_void},
    ptr::NonNull,
    rc::Rc,
};

use ash::{
    prelude::VkResult,
    vk::{self, Handle},
};
use winit::raw_window_handle::{
    RawDisplayHandle, RawWindowHandle, XlibDisplayHandle, XlibWindowHandle,
};

use super::{
    driver::{DeviceDesc, Driver, InstanceDesc},
    window::WindowTarget,
};

const PHYSICAL_DEVICE_BASE: u64 = 0x1000;
pub(crate) const UNTOUCHED_BYTE: u8 = 0xCD;

pub(crate) fn fixed_name<const N: usize>(name: &str) -> [c_char; N] {
    let mut out = [0 as c_char; N];
    for (dst, src) in out.iter_mut().zip(name.bytes()) {
        *dst = src as c_char;
    }
    out
}

pub(crate) fn layer(name: &str) -> vk::LayerProperties {
    vk::LayerProperties {
        layer_name: fixed_name(name),
        ..Default::default()
    }
}

pub(crate) fn test_window(width: u32, height: u32) -> WindowTarget {
    WindowTarget {
        width,
        height,
        display_handle: RawDisplayHandle::Xlib(XlibDisplayHandle::new(None, 0)),
        window_handle: RawWindowHandle::Xlib(XlibWindowHandle::new(1)),
    }
}

pub(crate) fn queue_family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FakeGpu {
    pub name: String,
    pub device_type: vk::PhysicalDeviceType,
    pub vendor_id: u32,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub present_support: Vec<bool>,
    pub memory_types: Vec<vk::MemoryPropertyFlags>,
}

impl FakeGpu {
    /// A discrete GPU with a single graphics + present queue family and the usual trio of
    /// memory types: device local, host visible, host visible + coherent.
    pub(crate) fn simple(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            vendor_id: 0x10DE,
            queue_families: vec![queue_family(
                vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            )],
            present_support: vec![true],
            memory_types: vec![
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
                vk::MemoryPropertyFlags::HOST_VISIBLE,
                vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Event {
    Created(&'static str, u64),
    Destroyed(&'static str, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BarrierRecord {
    pub cmd_buffer: vk::CommandBuffer,
    pub image: vk::Image,
    pub aspect_mask: vk::ImageAspectFlags,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_stages: vk::PipelineStageFlags,
    pub dst_stages: vk::PipelineStageFlags,
    pub level_count: u32,
    pub layer_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SwapchainRecord {
    pub handle: vk::SwapchainKHR,
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub extent: vk::Extent2D,
    pub array_layers: u32,
    pub usage: vk::ImageUsageFlags,
    pub sharing_mode: vk::SharingMode,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    pub composite_alpha: vk::CompositeAlphaFlagsKHR,
    pub present_mode: vk::PresentModeKHR,
    pub clipped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ImageRecord {
    pub handle: vk::Image,
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub tiling: vk::ImageTiling,
    pub usage: vk::ImageUsageFlags,
    pub initial_layout: vk::ImageLayout,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ViewRecord {
    pub handle: vk::ImageView,
    pub image: vk::Image,
    pub format: vk::Format,
    pub view_type: vk::ImageViewType,
    pub aspect_mask: vk::ImageAspectFlags,
    pub components: vk::ComponentMapping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AllocationRecord {
    pub handle: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    pub type_index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LayoutBindingRecord {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stage_flags: vk::ShaderStageFlags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PipelineLayoutRecord {
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    pub push_constant_range_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PoolRecord {
    pub handle: vk::DescriptorPool,
    pub max_sets: u32,
    pub sizes: Vec<(vk::DescriptorType, u32)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WriteRecord {
    pub dst_set: vk::DescriptorSet,
    pub dst_binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub buffer: Option<(vk::Buffer, vk::DeviceSize, vk::DeviceSize)>,
    pub sampler: Option<vk::Sampler>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InstanceRecord {
    pub api_version: u32,
    pub extensions: Vec<String>,
    pub layers: Vec<String>,
    pub debug_messenger: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeviceRecord {
    pub physical_device: vk::PhysicalDevice,
    pub queue_family_index: u32,
    pub queue_priorities: Vec<f32>,
    pub extensions: Vec<String>,
}

#[derive(Default)]
pub(crate) struct FakeState {
    next_handle: u64,
    memory: HashMap<u64, Box<[u8]>>,
    mapped: HashMap<u64, bool>,
    buffer_sizes: HashMap<u64, vk::DeviceSize>,
    image_sizes: HashMap<u64, vk::DeviceSize>,
    pool_usage: HashMap<u64, (u32, u32)>,

    pub events: Vec<Event>,
    pub layer_count_queries: u32,
    pub instance: Option<InstanceRecord>,
    pub device: Option<DeviceRecord>,
    pub command_pools: Vec<(vk::CommandPoolCreateFlags, u32)>,
    pub command_buffer_allocations: Vec<(vk::CommandBufferLevel, u32)>,
    pub begun: Vec<vk::CommandBuffer>,
    pub barriers: Vec<BarrierRecord>,
    pub swapchains: Vec<SwapchainRecord>,
    pub swapchain_images: Vec<vk::Image>,
    pub images: Vec<ImageRecord>,
    pub views: Vec<ViewRecord>,
    pub buffers: Vec<(vk::Buffer, vk::DeviceSize, vk::BufferUsageFlags)>,
    pub allocations: Vec<AllocationRecord>,
    pub bindings: Vec<(u64, vk::DeviceMemory, vk::DeviceSize)>,
    pub flushes: Vec<(vk::DeviceMemory, vk::DeviceSize, vk::DeviceSize)>,
    pub shader_code_sizes: Vec<usize>,
    pub set_layouts: Vec<Vec<LayoutBindingRecord>>,
    pub pipeline_layouts: Vec<PipelineLayoutRecord>,
    pub pools: Vec<PoolRecord>,
    pub descriptor_updates: Vec<Vec<WriteRecord>>,
}

impl FakeState {
    fn handle<H: Handle>(&mut self, kind: &'static str) -> H {
        self.next_handle += 1;
        self.events.push(Event::Created(kind, self.next_handle));
        H::from_raw(self.next_handle)
    }

    fn destroyed<H: Handle>(&mut self, kind: &'static str, handle: H) {
        self.events.push(Event::Destroyed(kind, handle.as_raw()));
    }

    pub(crate) fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.memory[&memory.as_raw()].to_vec()
    }
}

pub(crate) struct FakeDriver {
    pub layers: RefCell<Vec<vk::LayerProperties>>,
    /// Layers appearing right after each count query, one entry per query.
    pub layer_growth: RefCell<VecDeque<Vec<&'static str>>>,
    pub surface_extensions: Vec<&'static CStr>,
    pub gpus: Vec<FakeGpu>,
    pub surface_formats: Vec<vk::SurfaceFormatKHR>,
    pub surface_capabilities: vk::SurfaceCapabilitiesKHR,
    pub present_modes: Vec<vk::PresentModeKHR>,
    pub depth_format_properties: vk::FormatProperties,
    /// Number of images handed out per swapchain, defaults to the requested minimum.
    pub swapchain_image_count: Option<u32>,
    pub buffer_alignment: vk::DeviceSize,
    pub memory_type_bits: u32,
    /// Name of a create operation that must fail with `VK_ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fail_on: Option<&'static str>,

    /// Shared so tests can keep inspecting it once the driver is boxed into a context.
    pub state: Rc<RefCell<FakeState>>,
}

impl FakeDriver {
    pub(crate) fn new() -> Self {
        Self {
            layers: RefCell::new(vec![layer("VK_LAYER_KHRONOS_validation")]),
            layer_growth: RefCell::new(VecDeque::new()),
            surface_extensions: vec![c"VK_KHR_surface", c"VK_KHR_xlib_surface"],
            gpus: vec![FakeGpu::simple("Fake GPU")],
            surface_formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            surface_capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 8,
                current_extent: vk::Extent2D {
                    width: 800,
                    height: 600,
                },
                max_image_array_layers: 1,
                supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY
                    | vk::SurfaceTransformFlagsKHR::ROTATE_90,
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT
                    | vk::ImageUsageFlags::TRANSFER_DST,
                ..Default::default()
            },
            present_modes: vec![vk::PresentModeKHR::FIFO],
            depth_format_properties: vk::FormatProperties {
                optimal_tiling_features: vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
                ..Default::default()
            },
            swapchain_image_count: None,
            buffer_alignment: 256,
            memory_type_bits: 0b111,
            fail_on: None,
            state: Rc::new(RefCell::new(FakeState::default())),
        }
    }

    pub(crate) fn state(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.state.borrow().events.clone()
    }

    pub(crate) fn shared_state(&self) -> Rc<RefCell<FakeState>> {
        Rc::clone(&self.state)
    }

    pub(crate) fn memory_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state.borrow().memory_contents(memory)
    }

    pub(crate) fn is_mapped(&self, memory: vk::DeviceMemory) -> bool {
        self.state
            .borrow()
            .mapped
            .get(&memory.as_raw())
            .copied()
            .unwrap_or(false)
    }

    fn check(&self, operation: &'static str) -> VkResult<()> {
        match self.fail_on == Some(operation) {
            true => Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY),
            false => Ok(()),
        }
    }

    fn gpu(&self, physical_device: vk::PhysicalDevice) -> VkResult<&FakeGpu> {
        physical_device
            .as_raw()
            .checked_sub(PHYSICAL_DEVICE_BASE)
            .and_then(|index| self.gpus.get(index as usize))
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    fn require_device(&self) -> VkResult<()> {
        match self.state.borrow().device.is_some() {
            true => Ok(()),
            false => Err(vk::Result::ERROR_INITIALIZATION_FAILED),
        }
    }

    fn destroy<H: Handle>(&self, kind: &'static str, handle: H) {
        self.state.borrow_mut().destroyed(kind, handle);
    }
}

fn names(names: &[&CStr]) -> Vec<String> {
    names
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

// Arrays behind create-info pointers are only read for the duration of each call, which is
// what the real driver guarantees as well.
unsafe fn slice_of<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    match ptr.is_null() || count == 0 {
        true => &[],
        false => unsafe { std::slice::from_raw_parts(ptr, count as usize) },
    }
}

impl Driver for FakeDriver {
    fn instance_layer_count(&self) -> VkResult<u32> {
        let count = self.layers.borrow().len() as u32;
        self.state.borrow_mut().layer_count_queries += 1;

        if let Some(appearing) = self.layer_growth.borrow_mut().pop_front() {
            self.layers
                .borrow_mut()
                .extend(appearing.into_iter().map(layer));
        }

        Ok(count)
    }

    fn instance_layers(&self, capacity: u32) -> VkResult<Option<Vec<vk::LayerProperties>>> {
        let layers = self.layers.borrow();
        match layers.len() > capacity as usize {
            true => Ok(None),
            false => Ok(Some(layers.clone())),
        }
    }

    fn required_surface_extensions(
        &self,
        _display_handle: RawDisplayHandle,
    ) -> VkResult<Vec<&'static CStr>> {
        Ok(self.surface_extensions.clone())
    }

    fn create_instance(&mut self, desc: &InstanceDesc<'_>) -> VkResult<()> {
        self.check("instance")?;

        let mut state = self.state.borrow_mut();
        state.instance = Some(InstanceRecord {
            api_version: desc.api_version,
            extensions: names(&desc.extensions),
            layers: names(&desc.layers),
            debug_messenger: desc.debug_messenger,
        });
        state.events.push(Event::Created("instance", 0));
        Ok(())
    }

    fn destroy_instance(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.instance.take().is_some() {
            state.events.push(Event::Destroyed("instance", 0));
        }
    }

    fn enumerate_physical_devices(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.gpus.len() as u64)
            .map(|index| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + index))
            .collect())
    }

    fn queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self.gpu(physical_device)?.queue_families.clone())
    }

    fn memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        let gpu = self.gpu(physical_device)?;
        let mut properties = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: gpu.memory_types.len() as u32,
            memory_heap_count: 1,
            ..Default::default()
        };
        for (index, &flags) in gpu.memory_types.iter().enumerate() {
            properties.memory_types[index] = vk::MemoryType {
                property_flags: flags,
                heap_index: 0,
            };
        }
        Ok(properties)
    }

    fn device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceProperties> {
        let gpu = self.gpu(physical_device)?;
        Ok(vk::PhysicalDeviceProperties {
            api_version: vk::API_VERSION_1_3,
            vendor_id: gpu.vendor_id,
            device_type: gpu.device_type,
            device_name: fixed_name(&gpu.name),
            ..Default::default()
        })
    }

    fn format_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        format: vk::Format,
    ) -> VkResult<vk::FormatProperties> {
        self.gpu(physical_device)?;
        match format {
            vk::Format::D16_UNORM => Ok(self.depth_format_properties),
            _ => Ok(vk::FormatProperties::default()),
        }
    }

    fn create_surface(
        &self,
        _display_handle: RawDisplayHandle,
        _window_handle: RawWindowHandle,
    ) -> VkResult<vk::SurfaceKHR> {
        self.check("surface")?;
        Ok(self.state.borrow_mut().handle("surface"))
    }

    fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        self.destroy("surface", surface);
    }

    fn surface_support(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<bool> {
        Ok(self
            .gpu(physical_device)?
            .present_support
            .get(queue_family_index as usize)
            .copied()
            .unwrap_or(false))
    }

    fn surface_formats(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::SurfaceFormatKHR>> {
        Ok(self.surface_formats.clone())
    }

    fn surface_capabilities(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<vk::SurfaceCapabilitiesKHR> {
        Ok(self.surface_capabilities)
    }

    fn surface_present_modes(
        &self,
        _physical_device: vk::PhysicalDevice,
        _surface: vk::SurfaceKHR,
    ) -> VkResult<Vec<vk::PresentModeKHR>> {
        Ok(self.present_modes.clone())
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc<'_>,
    ) -> VkResult<()> {
        self.check("device")?;
        self.gpu(physical_device)?;

        let mut state = self.state.borrow_mut();
        state.device = Some(DeviceRecord {
            physical_device,
            queue_family_index: desc.queue_family_index,
            queue_priorities: desc.queue_priorities.to_vec(),
            extensions: names(desc.extensions),
        });
        state.events.push(Event::Created("device", 0));
        Ok(())
    }

    fn destroy_device(&mut self) {
        let mut state = self.state.borrow_mut();
        if state.device.take().is_some() {
            state.events.push(Event::Destroyed("device", 0));
        }
    }

    fn device_queue(&self, queue_family_index: u32, queue_index: u32) -> VkResult<vk::Queue> {
        self.require_device()?;
        Ok(vk::Queue::from_raw(
            0x100 + u64::from(queue_family_index) * 16 + u64::from(queue_index),
        ))
    }

    fn create_command_pool(
        &self,
        info: &vk::CommandPoolCreateInfo<'_>,
    ) -> VkResult<vk::CommandPool> {
        self.require_device()?;
        self.check("command_pool")?;

        let mut state = self.state.borrow_mut();
        state
            .command_pools
            .push((info.flags, info.queue_family_index));
        Ok(state.handle("command_pool"))
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        self.destroy("command_pool", pool);
    }

    fn allocate_command_buffers(
        &self,
        info: &vk::CommandBufferAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::CommandBuffer>> {
        self.require_device()?;

        let mut state = self.state.borrow_mut();
        state
            .command_buffer_allocations
            .push((info.level, info.command_buffer_count));
        Ok((0..info.command_buffer_count)
            .map(|_| state.handle("command_buffer"))
            .collect())
    }

    fn begin_command_buffer(
        &self,
        cmd_buffer: vk::CommandBuffer,
        _info: &vk::CommandBufferBeginInfo<'_>,
    ) -> VkResult<()> {
        self.check("begin")?;
        self.state.borrow_mut().begun.push(cmd_buffer);
        Ok(())
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd_buffer: vk::CommandBuffer,
        src_stages: vk::PipelineStageFlags,
        dst_stages: vk::PipelineStageFlags,
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.begun.contains(&cmd_buffer) {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }

        for barrier in image_barriers {
            state.barriers.push(BarrierRecord {
                cmd_buffer,
                image: barrier.image,
                aspect_mask: barrier.subresource_range.aspect_mask,
                old_layout: barrier.old_layout,
                new_layout: barrier.new_layout,
                src_access: barrier.src_access_mask,
                dst_access: barrier.dst_access_mask,
                src_stages,
                dst_stages,
                level_count: barrier.subresource_range.level_count,
                layer_count: barrier.subresource_range.layer_count,
            });
        }
        Ok(())
    }

    fn create_swapchain(
        &self,
        info: &vk::SwapchainCreateInfoKHR<'_>,
    ) -> VkResult<vk::SwapchainKHR> {
        self.require_device()?;
        self.check("swapchain")?;

        let mut state = self.state.borrow_mut();
        let handle = state.handle("swapchain");
        state.swapchains.push(SwapchainRecord {
            handle,
            surface: info.surface,
            min_image_count: info.min_image_count,
            format: info.image_format,
            color_space: info.image_color_space,
            extent: info.image_extent,
            array_layers: info.image_array_layers,
            usage: info.image_usage,
            sharing_mode: info.image_sharing_mode,
            pre_transform: info.pre_transform,
            composite_alpha: info.composite_alpha,
            present_mode: info.present_mode,
            clipped: info.clipped == vk::TRUE,
        });

        let image_count = self.swapchain_image_count.unwrap_or(info.min_image_count);
        for _ in 0..image_count {
            state.next_handle += 1;
            let image = vk::Image::from_raw(state.next_handle);
            state.swapchain_images.push(image);
        }
        Ok(handle)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.destroy("swapchain", swapchain);
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VkResult<Vec<vk::Image>> {
        let state = self.state.borrow();
        match state.swapchains.iter().any(|record| record.handle == swapchain) {
            true => Ok(state.swapchain_images.clone()),
            false => Err(vk::Result::ERROR_SURFACE_LOST_KHR),
        }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo<'_>) -> VkResult<vk::Image> {
        self.require_device()?;
        self.check("image")?;

        let mut state = self.state.borrow_mut();
        let handle: vk::Image = state.handle("image");
        state.images.push(ImageRecord {
            handle,
            image_type: info.image_type,
            format: info.format,
            extent: info.extent,
            mip_levels: info.mip_levels,
            array_layers: info.array_layers,
            tiling: info.tiling,
            usage: info.usage,
            initial_layout: info.initial_layout,
        });
        let size = u64::from(info.extent.width) * u64::from(info.extent.height) * 2;
        state.image_sizes.insert(handle.as_raw(), size);
        Ok(handle)
    }

    fn destroy_image(&self, image: vk::Image) {
        self.destroy("image", image);
    }

    fn image_memory_requirements(&self, image: vk::Image) -> VkResult<vk::MemoryRequirements> {
        let size = self.state.borrow().image_sizes[&image.as_raw()];
        Ok(vk::MemoryRequirements {
            size: size.next_multiple_of(self.buffer_alignment),
            alignment: self.buffer_alignment,
            memory_type_bits: self.memory_type_bits,
        })
    }

    fn bind_image_memory(
        &self,
        image: vk::Image,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.state
            .borrow_mut()
            .bindings
            .push((image.as_raw(), memory, offset));
        Ok(())
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> VkResult<vk::ImageView> {
        self.require_device()?;
        self.check("image_view")?;

        let mut state = self.state.borrow_mut();
        let handle = state.handle("image_view");
        state.views.push(ViewRecord {
            handle,
            image: info.image,
            format: info.format,
            view_type: info.view_type,
            aspect_mask: info.subresource_range.aspect_mask,
            components: info.components,
        });
        Ok(handle)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy("image_view", view);
    }

    fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) -> VkResult<vk::Buffer> {
        self.require_device()?;
        self.check("buffer")?;

        let mut state = self.state.borrow_mut();
        let handle: vk::Buffer = state.handle("buffer");
        state.buffers.push((handle, info.size, info.usage));
        state.buffer_sizes.insert(handle.as_raw(), info.size);
        Ok(handle)
    }

    fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.destroy("buffer", buffer);
    }

    fn buffer_memory_requirements(
        &self,
        buffer: vk::Buffer,
    ) -> VkResult<vk::MemoryRequirements> {
        let size = self.state.borrow().buffer_sizes[&buffer.as_raw()];
        Ok(vk::MemoryRequirements {
            size: size.next_multiple_of(self.buffer_alignment),
            alignment: self.buffer_alignment,
            memory_type_bits: self.memory_type_bits,
        })
    }

    fn bind_buffer_memory(
        &self,
        buffer: vk::Buffer,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
    ) -> VkResult<()> {
        self.state
            .borrow_mut()
            .bindings
            .push((buffer.as_raw(), memory, offset));
        Ok(())
    }

    fn allocate_memory(&self, info: &vk::MemoryAllocateInfo<'_>) -> VkResult<vk::DeviceMemory> {
        self.require_device()?;
        self.check("memory")?;

        let mut state = self.state.borrow_mut();
        let handle: vk::DeviceMemory = state.handle("memory");
        state.allocations.push(AllocationRecord {
            handle,
            size: info.allocation_size,
            type_index: info.memory_type_index,
        });
        state.memory.insert(
            handle.as_raw(),
            vec![UNTOUCHED_BYTE; info.allocation_size as usize].into_boxed_slice(),
        );
        Ok(handle)
    }

    fn free_memory(&self, memory: vk::DeviceMemory) {
        self.destroy("memory", memory);
    }

    fn map_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<*mut c_void> {
        let mut state = self.state.borrow_mut();
        if state.mapped.get(&memory.as_raw()).copied().unwrap_or(false) {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }

        let region = state
            .memory
            .get_mut(&memory.as_raw())
            .ok_or(vk::Result::ERROR_MEMORY_MAP_FAILED)?;
        let end = match size {
            vk::WHOLE_SIZE => region.len() as u64,
            size => offset + size,
        };
        if end > region.len() as u64 {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }

        let ptr = NonNull::from(&mut region[offset as usize..]).cast::<c_void>();
        state.mapped.insert(memory.as_raw(), true);
        Ok(ptr.as_ptr())
    }

    fn unmap_memory(&self, memory: vk::DeviceMemory) {
        self.state.borrow_mut().mapped.insert(memory.as_raw(), false);
    }

    fn flush_mapped_memory(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
    ) -> VkResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.mapped.get(&memory.as_raw()).copied().unwrap_or(false) {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        state.flushes.push((memory, offset, size));
        Ok(())
    }

    fn create_shader_module(
        &self,
        info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        self.require_device()?;
        self.check("shader_module")?;

        let mut state = self.state.borrow_mut();
        state.shader_code_sizes.push(info.code_size);
        Ok(state.handle("shader_module"))
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy("shader_module", module);
    }

    fn create_descriptor_set_layout(
        &self,
        info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        self.require_device()?;
        self.check("descriptor_set_layout")?;

        let bindings = unsafe { slice_of(info.p_bindings, info.binding_count) }
            .iter()
            .map(|binding| LayoutBindingRecord {
                binding: binding.binding,
                descriptor_type: binding.descriptor_type,
                descriptor_count: binding.descriptor_count,
                stage_flags: binding.stage_flags,
            })
            .collect();

        let mut state = self.state.borrow_mut();
        state.set_layouts.push(bindings);
        Ok(state.handle("descriptor_set_layout"))
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroy("descriptor_set_layout", layout);
    }

    fn create_pipeline_layout(
        &self,
        info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        self.require_device()?;
        self.check("pipeline_layout")?;

        let set_layouts = unsafe { slice_of(info.p_set_layouts, info.set_layout_count) }.to_vec();

        let mut state = self.state.borrow_mut();
        state.pipeline_layouts.push(PipelineLayoutRecord {
            set_layouts,
            push_constant_range_count: info.push_constant_range_count,
        });
        Ok(state.handle("pipeline_layout"))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy("pipeline_layout", layout);
    }

    fn create_descriptor_pool(
        &self,
        info: &vk::DescriptorPoolCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorPool> {
        self.require_device()?;
        self.check("descriptor_pool")?;

        let sizes = unsafe { slice_of(info.p_pool_sizes, info.pool_size_count) }
            .iter()
            .map(|size| (size.ty, size.descriptor_count))
            .collect();

        let mut state = self.state.borrow_mut();
        let handle: vk::DescriptorPool = state.handle("descriptor_pool");
        state.pools.push(PoolRecord {
            handle,
            max_sets: info.max_sets,
            sizes,
        });
        state.pool_usage.insert(handle.as_raw(), (0, info.max_sets));
        Ok(handle)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy("descriptor_pool", pool);
    }

    fn allocate_descriptor_sets(
        &self,
        info: &vk::DescriptorSetAllocateInfo<'_>,
    ) -> VkResult<Vec<vk::DescriptorSet>> {
        let mut state = self.state.borrow_mut();
        let (allocated, max_sets) = state
            .pool_usage
            .get(&info.descriptor_pool.as_raw())
            .copied()
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)?;
        if allocated + info.descriptor_set_count > max_sets {
            return Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY);
        }
        state.pool_usage.insert(
            info.descriptor_pool.as_raw(),
            (allocated + info.descriptor_set_count, max_sets),
        );

        Ok((0..info.descriptor_set_count)
            .map(|_| state.handle("descriptor_set"))
            .collect())
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) -> VkResult<()> {
        let records = writes
            .iter()
            .map(|write| {
                let buffer = unsafe { slice_of(write.p_buffer_info, write.descriptor_count) }
                    .first()
                    .map(|info| (info.buffer, info.offset, info.range));
                let sampler = unsafe { slice_of(write.p_image_info, write.descriptor_count) }
                    .first()
                    .map(|info| info.sampler);

                WriteRecord {
                    dst_set: write.dst_set,
                    dst_binding: write.dst_binding,
                    descriptor_type: write.descriptor_type,
                    descriptor_count: write.descriptor_count,
                    buffer,
                    sampler,
                }
            })
            .collect();

        self.state.borrow_mut().descriptor_updates.push(records);
        Ok(())
    }
}
