use std::marker::PhantomData;

use ash::vk;
use thiserror::Error;

use super::{
    driver::Driver,
    error::ErrorKind,
    memory::{MemoryAllocateError, MemoryRegion},
};

/// A host visible buffer backed by its own memory allocation.
///
/// `size` is what the caller asked for, `memory.size` is what the driver required. The latter
/// can be larger, uploads only ever touch the first `size` bytes.
#[derive(Debug)]
pub struct Buffer {
    pub(crate) handle: vk::Buffer,
    pub(crate) memory: MemoryRegion,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,

    pub name: String,
}

#[derive(Error, Debug)]
pub enum BufferBuildError {
    #[error("buffer size must be non zero")]
    ZeroSize,

    #[error("vulkan creation failed")]
    VulkanCreation(vk::Result),

    #[error("vulkan call to query memory requirements failed")]
    MemoryRequirementsQuery(vk::Result),

    #[error("memory allocation failed")]
    Allocation(#[from] MemoryAllocateError),

    #[error("vulkan allocation binding failed")]
    AllocationBinding(vk::Result),
}

impl BufferBuildError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroSize => ErrorKind::Driver,
            Self::Allocation(err) => err.kind(),
            Self::VulkanCreation(result)
            | Self::MemoryRequirementsQuery(result)
            | Self::AllocationBinding(result) => ErrorKind::from_vk(*result),
        }
    }
}

#[derive(Error, Debug)]
pub enum BufferDataUploadError {
    #[error(
        "data size ({data_size}) does not match the buffer size ({buffer_size}), check that T is #[repr(C)]"
    )]
    SizeMismatch {
        data_size: usize,
        buffer_size: vk::DeviceSize,
    },

    #[error("buffer memory mapping failed")]
    MemoryMapping(vk::Result),

    #[error("flushing mapped buffer memory failed")]
    MemoryFlush(vk::Result),
}

impl BufferDataUploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SizeMismatch { .. } => ErrorKind::Driver,
            Self::MemoryMapping(result) | Self::MemoryFlush(result) => ErrorKind::from_vk(*result),
        }
    }
}

impl Buffer {
    /// Creates the buffer, then allocates and binds host visible memory at offset 0. With
    /// `host_coherent` the memory type must also be host coherent.
    pub fn create(
        driver: &dyn Driver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        host_coherent: bool,
    ) -> Result<Self, BufferBuildError> {
        BufferBuilder::uniform_buffer_default(size)
            .with_usage(usage)
            .with_host_coherent(host_coherent)
            .build(driver, memory_properties)
    }

    pub fn handle(&self) -> vk::Buffer {
        self.handle
    }

    /// Logical size, as requested at creation.
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Size of the backing allocation, as required by the driver.
    pub fn physical_size(&self) -> vk::DeviceSize {
        self.memory.size
    }

    pub fn usage(&self) -> vk::BufferUsageFlags {
        self.usage
    }

    /// Copies `data` into the buffer. `data` must be exactly [`Buffer::size`] bytes long.
    ///
    /// The whole allocation is mapped, only the logical range is written. Non coherent memory
    /// is flushed before unmapping.
    pub fn upload_data(&self, driver: &dyn Driver, data: &[u8]) -> Result<(), BufferDataUploadError> {
        if data.len() as u64 != self.size {
            return Err(BufferDataUploadError::SizeMismatch {
                data_size: data.len(),
                buffer_size: self.size,
            });
        }

        let mapped = driver
            .map_memory(self.memory.handle, 0, self.memory.size)
            .map_err(BufferDataUploadError::MemoryMapping)?;

        // SAFETY: the mapping covers `memory.size >= size` bytes and nothing else aliases it
        // while it is mapped.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), mapped.cast::<u8>(), data.len());
        }

        let flushed = match self.memory.is_host_coherent() {
            true => Ok(()),
            false => driver
                .flush_mapped_memory(self.memory.handle, 0, vk::WHOLE_SIZE)
                .map_err(BufferDataUploadError::MemoryFlush),
        };
        driver.unmap_memory(self.memory.handle);

        flushed
    }

    pub fn upload_pod<T: bytemuck::Pod>(
        &self,
        driver: &dyn Driver,
        pod: &T,
    ) -> Result<(), BufferDataUploadError> {
        self.upload_data(driver, bytemuck::bytes_of(pod))
    }

    pub(crate) fn destroy(&self, driver: &dyn Driver) {
        log::debug!("destroying buffer {}", self.name);
        driver.destroy_buffer(self.handle);
        self.memory.free(driver);
    }
}

pub struct BufferBuilder {
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
    pub host_coherent: bool,

    pub name: String,
}

impl BufferBuilder {
    pub fn uniform_buffer_default(size: vk::DeviceSize) -> Self {
        Self {
            size,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            host_coherent: true,
            name: String::from("unnamed buffer"),
        }
    }

    pub fn with_usage(mut self, usage: vk::BufferUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_host_coherent(mut self, host_coherent: bool) -> Self {
        self.host_coherent = host_coherent;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        name.clone_into(&mut self.name);
        self
    }

    pub fn build(
        self,
        driver: &dyn Driver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
    ) -> Result<Buffer, BufferBuildError> {
        if self.size == 0 {
            return Err(BufferBuildError::ZeroSize);
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(self.size)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        let handle = driver
            .create_buffer(&buffer_info)
            .map_err(BufferBuildError::VulkanCreation)?;

        let memory = match self.bind_memory(driver, memory_properties, handle) {
            Ok(memory) => memory,
            Err(err) => {
                driver.destroy_buffer(handle);
                return Err(err);
            }
        };

        log::debug!(
            "created buffer {} ({} bytes, {} physical)",
            self.name,
            self.size,
            memory.size
        );

        Ok(Buffer {
            handle,
            memory,
            size: self.size,
            usage: self.usage,
            name: self.name,
        })
    }

    fn bind_memory(
        &self,
        driver: &dyn Driver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        handle: vk::Buffer,
    ) -> Result<MemoryRegion, BufferBuildError> {
        let requirements = driver
            .buffer_memory_requirements(handle)
            .map_err(BufferBuildError::MemoryRequirementsQuery)?;

        let mut required = vk::MemoryPropertyFlags::HOST_VISIBLE;
        if self.host_coherent {
            required |= vk::MemoryPropertyFlags::HOST_COHERENT;
        }
        let memory = MemoryRegion::allocate(driver, memory_properties, &requirements, required)?;

        if let Err(err) = driver.bind_buffer_memory(handle, memory.handle, 0) {
            memory.free(driver);
            return Err(BufferBuildError::AllocationBinding(err));
        }

        Ok(memory)
    }
}

/// A [`Buffer`] sized for exactly one `T`.
#[derive(Debug)]
pub struct TypedBuffer<T: bytemuck::Pod> {
    buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> TypedBuffer<T> {
    pub fn create(
        driver: &dyn Driver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        usage: vk::BufferUsageFlags,
        host_coherent: bool,
    ) -> Result<Self, BufferBuildError> {
        let buffer = Buffer::create(
            driver,
            memory_properties,
            size_of::<T>() as vk::DeviceSize,
            usage,
            host_coherent,
        )?;

        Ok(Self::from_buffer_unchecked(buffer))
    }

    pub(crate) fn from_buffer_unchecked(buffer: Buffer) -> Self {
        Self {
            buffer,
            _marker: PhantomData,
        }
    }

    pub fn upload(&self, driver: &dyn Driver, value: &T) -> Result<(), BufferDataUploadError> {
        self.buffer.upload_pod(driver, value)
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn into_inner(self) -> Buffer {
        self.buffer
    }
}
