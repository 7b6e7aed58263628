use std::{
    ffi::CString,
    path::{Path, PathBuf},
};

use ash::vk;
use thiserror::Error;
use winit::window::Window;

use crate::debug::StageTimer;

use super::{
    buffer::{Buffer, BufferBuildError, BufferBuilder, BufferDataUploadError, TypedBuffer},
    commands::{CommandRecorder, CommandRecorderCreateError},
    depth::{DepthCreateError, DepthResource},
    descriptor::{
        Binding, BindingError, DescriptorLayout, DescriptorLayoutBuilder,
        DescriptorLayoutCreateError,
    },
    device::{DeviceContext, DeviceCreateError},
    driver::Driver,
    error::ErrorKind,
    instance::{
        DeviceSelector, FirstDevice, GpuDescriptor, GpuSelectError, InstanceCreateError,
        InstanceManager,
    },
    resources::{BufferId, DescriptorLayoutId, ResourceArena, ShaderId, TypedBufferId},
    shader::{ShaderLoadError, ShaderModule},
    swapchain::{Swapchain, SwapchainCreateError},
    vulkan::VulkanDriver,
    window::WindowTarget,
};

pub struct ContextCreateInfo {
    pub application_name: CString,
    pub application_version: u32,
    pub api_version: u32,
    /// Only honored when the validation layer is installed.
    pub enable_validation: bool,
    /// Shaders are loaded from `<shader_dir>/<name>.spv`.
    pub shader_dir: PathBuf,
    pub device_selector: Box<dyn DeviceSelector>,
}

impl Default for ContextCreateInfo {
    fn default() -> Self {
        Self {
            application_name: CString::default(),
            application_version: 0,
            api_version: vk::API_VERSION_1_0,
            enable_validation: cfg!(debug_assertions),
            shader_dir: PathBuf::from("shader"),
            device_selector: Box::new(FirstDevice),
        }
    }
}

/// Owns the driver adapter and everything bootstrapped on it. Dropping the context tears it all
/// down in reverse creation order.
///
/// Not meant to be shared between threads: the driver requires external synchronization on
/// every handle the context owns.
pub struct Context {
    pub(crate) resources: ResourceArena,
    pub(crate) depth: DepthResource,
    pub(crate) swapchain: Swapchain,
    pub(crate) recorder: CommandRecorder,
    pub(crate) device: DeviceContext,
    pub(crate) gpu_index: usize,
    pub(crate) instance: InstanceManager,

    shader_dir: PathBuf,
    driver: Box<dyn Driver>,
}

#[derive(Debug, Error)]
pub enum ContextCreateError {
    #[error("unable to get necessary handles from window")]
    InvalidWindow(#[from] winit::raw_window_handle::HandleError),

    #[error("vulkan library loading failed")]
    VulkanLoad(#[from] ash::LoadingError),

    #[error("instance creation failed")]
    InstanceCreation(#[from] InstanceCreateError),

    #[error("physical device selection failed")]
    GpuSelection(#[from] GpuSelectError),

    #[error("device creation failed")]
    DeviceCreation(#[from] DeviceCreateError),

    #[error("command recorder creation failed")]
    CommandRecorderCreation(#[from] CommandRecorderCreateError),

    #[error("swapchain creation failed")]
    SwapchainCreation(#[from] SwapchainCreateError),

    #[error("depth resource creation failed")]
    DepthCreation(#[from] DepthCreateError),
}

impl ContextCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidWindow(_) | Self::VulkanLoad(_) => ErrorKind::Driver,
            Self::InstanceCreation(err) => err.kind(),
            Self::GpuSelection(err) => err.kind(),
            Self::DeviceCreation(err) => err.kind(),
            Self::CommandRecorderCreation(err) => err.kind(),
            Self::SwapchainCreation(err) => err.kind(),
            Self::DepthCreation(err) => err.kind(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource was already destroyed")]
    Stale,

    #[error("buffer upload failed")]
    BufferUpload(#[from] BufferDataUploadError),

    #[error("descriptor binding failed")]
    Binding(#[from] BindingError),
}

impl ResourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Stale => ErrorKind::Driver,
            Self::BufferUpload(err) => err.kind(),
            Self::Binding(err) => err.kind(),
        }
    }
}

/// Everything created so far by an unfinished bootstrap, destroyed in reverse order.
#[derive(Default)]
struct Unwind<'a> {
    device: Option<&'a DeviceContext>,
    recorder: Option<&'a CommandRecorder>,
    swapchain: Option<&'a Swapchain>,
}

impl Unwind<'_> {
    fn run(self, driver: &mut dyn Driver, instance: &InstanceManager) {
        log::warn!("context bootstrap failed, destroying partially created context");
        if let Some(swapchain) = self.swapchain {
            swapchain.destroy(driver);
        }
        if let Some(recorder) = self.recorder {
            recorder.destroy(driver);
        }
        if let Some(device) = self.device {
            device.destroy(driver);
        }
        instance.destroy(driver);
    }
}

impl Context {
    pub fn new(window: &Window, create_info: &ContextCreateInfo) -> Result<Self, ContextCreateError> {
        let target = WindowTarget::from_window(window)?;
        let driver = VulkanDriver::load()?;

        Self::with_driver(Box::new(driver), &target, create_info)
    }

    /// Runs the bootstrap pipeline on any driver adapter: instance, device, command recorder,
    /// swapchain, depth resource. A failing stage destroys what the previous ones created.
    pub fn with_driver(
        mut driver: Box<dyn Driver>,
        window: &WindowTarget,
        create_info: &ContextCreateInfo,
    ) -> Result<Self, ContextCreateError> {
        let _timer = StageTimer::new(log::Level::Info, "context bootstrap");

        let instance = {
            let _timer = StageTimer::new(log::Level::Debug, "instance creation");
            InstanceManager::create(
                driver.as_mut(),
                &create_info.application_name,
                create_info.application_version,
                create_info.api_version,
                create_info.enable_validation,
                window.display_handle,
            )?
        };

        let gpu_index = match instance.select_gpu(create_info.device_selector.as_ref()) {
            Ok(gpu_index) => gpu_index,
            Err(err) => {
                Unwind::default().run(driver.as_mut(), &instance);
                return Err(err.into());
            }
        };
        let gpu = &instance.gpus()[gpu_index];

        let device = {
            let _timer = StageTimer::new(log::Level::Debug, "device creation");
            DeviceContext::create(driver.as_mut(), gpu, window)
        };
        let device = match device {
            Ok(device) => device,
            Err(err) => {
                Unwind::default().run(driver.as_mut(), &instance);
                return Err(err.into());
            }
        };

        let recorder = match CommandRecorder::try_new(driver.as_ref(), device.queue_family_index)
        {
            Ok(recorder) => recorder,
            Err(err) => {
                let unwind = Unwind {
                    device: Some(&device),
                    ..Default::default()
                };
                unwind.run(driver.as_mut(), &instance);
                return Err(err.into());
            }
        };

        let swapchain = {
            let _timer = StageTimer::new(log::Level::Debug, "swapchain creation");
            Swapchain::create(driver.as_ref(), &device, &recorder, window.extent())
        };
        let swapchain = match swapchain {
            Ok(swapchain) => swapchain,
            Err(err) => {
                let unwind = Unwind {
                    device: Some(&device),
                    recorder: Some(&recorder),
                    ..Default::default()
                };
                unwind.run(driver.as_mut(), &instance);
                return Err(err.into());
            }
        };

        let depth = match DepthResource::create(driver.as_ref(), gpu, &recorder, window.extent()) {
            Ok(depth) => depth,
            Err(err) => {
                let unwind = Unwind {
                    device: Some(&device),
                    recorder: Some(&recorder),
                    swapchain: Some(&swapchain),
                };
                unwind.run(driver.as_mut(), &instance);
                return Err(err.into());
            }
        };

        Ok(Self {
            resources: ResourceArena::default(),
            depth,
            swapchain,
            recorder,
            device,
            gpu_index,
            instance,
            shader_dir: create_info.shader_dir.clone(),
            driver,
        })
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn instance(&self) -> &InstanceManager {
        &self.instance
    }

    /// The GPU the context was bootstrapped on.
    pub fn gpu(&self) -> &GpuDescriptor {
        &self.instance.gpus()[self.gpu_index]
    }

    pub fn device(&self) -> &DeviceContext {
        &self.device
    }

    /// Holds every setup barrier recorded so far. Ending and submitting it is left to the
    /// caller driving the render loop.
    pub fn command_recorder(&self) -> &CommandRecorder {
        &self.recorder
    }

    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    pub fn depth(&self) -> &DepthResource {
        &self.depth
    }

    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    pub fn create_buffer(
        &mut self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        host_coherent: bool,
    ) -> Result<BufferId, BufferBuildError> {
        let builder = BufferBuilder::uniform_buffer_default(size)
            .with_usage(usage)
            .with_host_coherent(host_coherent);

        self.build_buffer(builder)
    }

    pub fn build_buffer(&mut self, builder: BufferBuilder) -> Result<BufferId, BufferBuildError> {
        let memory_properties = self.gpu().memory_properties;
        let buffer = builder.build(self.driver.as_ref(), &memory_properties)?;

        Ok(self.resources.buffers.insert(buffer))
    }

    pub fn create_typed_buffer<T: bytemuck::Pod>(
        &mut self,
        usage: vk::BufferUsageFlags,
        host_coherent: bool,
    ) -> Result<TypedBufferId<T>, BufferBuildError> {
        let memory_properties = self.gpu().memory_properties;
        let buffer =
            TypedBuffer::<T>::create(self.driver.as_ref(), &memory_properties, usage, host_coherent)?;

        Ok(TypedBufferId::new(
            self.resources.buffers.insert(buffer.into_inner()),
        ))
    }

    pub fn buffer(&self, id: BufferId) -> Option<&Buffer> {
        self.resources.buffers.get(id)
    }

    pub fn upload_buffer(&self, id: BufferId, data: &[u8]) -> Result<(), ResourceError> {
        let buffer = self.resources.buffers.get(id).ok_or(ResourceError::Stale)?;
        buffer.upload_data(self.driver.as_ref(), data)?;

        Ok(())
    }

    pub fn upload_typed<T: bytemuck::Pod>(
        &self,
        id: TypedBufferId<T>,
        value: &T,
    ) -> Result<(), ResourceError> {
        self.upload_buffer(id.untyped(), bytemuck::bytes_of(value))
    }

    /// Returns `false` if the buffer was already destroyed.
    pub fn destroy_buffer(&mut self, id: BufferId) -> bool {
        match self.resources.buffers.remove(id) {
            Some(buffer) => {
                buffer.destroy(self.driver.as_ref());
                true
            }
            None => false,
        }
    }

    pub fn load_shader(&mut self, name: &str) -> Result<ShaderId, ShaderLoadError> {
        let shader = ShaderModule::load(self.driver.as_ref(), &self.shader_dir, name)?;

        Ok(self.resources.shaders.insert(shader))
    }

    pub fn shader(&self, id: ShaderId) -> Option<&ShaderModule> {
        self.resources.shaders.get(id)
    }

    pub fn destroy_shader(&mut self, id: ShaderId) -> bool {
        match self.resources.shaders.remove(id) {
            Some(shader) => {
                shader.destroy(self.driver.as_ref());
                true
            }
            None => false,
        }
    }

    pub fn create_descriptor_layout(
        &mut self,
        builder: &DescriptorLayoutBuilder,
    ) -> Result<DescriptorLayoutId, DescriptorLayoutCreateError> {
        let layout = builder.create(self.driver.as_ref())?;

        Ok(self.resources.layouts.insert(layout))
    }

    pub fn descriptor_layout(&self, id: DescriptorLayoutId) -> Option<&DescriptorLayout> {
        self.resources.layouts.get(id)
    }

    /// Allocates the single descriptor set of the layout's pool.
    pub fn create_binding(&self, id: DescriptorLayoutId) -> Result<Binding, ResourceError> {
        let layout = self.resources.layouts.get(id).ok_or(ResourceError::Stale)?;

        Ok(layout.create_binding(self.driver.as_ref(), id)?)
    }

    pub fn bind_buffer(
        &self,
        binding: &mut Binding,
        index: usize,
        buffer: BufferId,
    ) -> Result<(), ResourceError> {
        let id = buffer;
        let buffer = self.resources.buffers.get(id).ok_or(ResourceError::Stale)?;
        binding.set_buffer(index, id, buffer)?;

        Ok(())
    }

    /// Submits the binding's writes. Fails with [`ResourceError::Stale`] without touching the
    /// device when its layout or any bound buffer was destroyed.
    pub fn apply_binding(&self, binding: &Binding) -> Result<(), ResourceError> {
        let layout_alive = self.resources.layouts.contains_key(binding.layout());
        let buffers_alive = binding
            .bound_buffers()
            .all(|id| self.resources.buffers.contains_key(id));
        if !layout_alive || !buffers_alive {
            return Err(ResourceError::Stale);
        }

        binding.apply(self.driver.as_ref())?;

        Ok(())
    }

    /// Also releases every binding created from the layout, applying them afterwards fails.
    pub fn destroy_descriptor_layout(&mut self, id: DescriptorLayoutId) -> bool {
        match self.resources.layouts.remove(id) {
            Some(layout) => {
                layout.destroy(self.driver.as_ref());
                true
            }
            None => false,
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        log::debug!("destroying context");

        let driver = self.driver.as_mut();
        if !self.resources.is_empty() {
            log::debug!("destroying resources left in the context");
            self.resources.destroy_all(driver);
        }
        self.depth.destroy(driver);
        self.swapchain.destroy(driver);
        self.recorder.destroy(driver);
        self.device.destroy(driver);
        self.instance.destroy(driver);
    }
}
