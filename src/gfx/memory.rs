use ash::vk;
use thiserror::Error;

use super::{driver::Driver, error::ErrorKind};

#[derive(Debug, Error)]
pub enum MemoryTypeSelectError {
    #[error("no memory type in mask {type_bits:#034b} has properties {required:?}")]
    NoMatchingType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },
}

/// Returns the lowest memory type index allowed by `type_bits` whose property flags contain
/// every flag of `required`.
///
/// This is a pure lookup in the snapshot of memory properties captured at enumeration time.
pub fn select_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Result<u32, MemoryTypeSelectError> {
    let type_count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);

    (0..type_count)
        .filter(|index| type_bits & (1 << index) != 0)
        .find(|&index| {
            memory_properties.memory_types[index as usize]
                .property_flags
                .contains(required)
        })
        .ok_or(MemoryTypeSelectError::NoMatchingType {
            type_bits,
            required,
        })
}

#[derive(Debug, Error)]
pub enum MemoryAllocateError {
    #[error("memory type selection failed")]
    TypeSelection(#[from] MemoryTypeSelectError),

    #[error("vulkan call to allocate memory failed")]
    Allocation(vk::Result),
}

impl MemoryAllocateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeSelection(_) => ErrorKind::ResourceExhausted,
            Self::Allocation(result) => ErrorKind::from_vk(*result),
        }
    }
}

/// A dedicated device memory allocation, owned by exactly one buffer or image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    pub handle: vk::DeviceMemory,
    pub size: vk::DeviceSize,
    pub type_index: u32,
    pub property_flags: vk::MemoryPropertyFlags,
}

impl MemoryRegion {
    pub(crate) fn allocate(
        driver: &dyn Driver,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        requirements: &vk::MemoryRequirements,
        required: vk::MemoryPropertyFlags,
    ) -> Result<Self, MemoryAllocateError> {
        let type_index =
            select_memory_type(memory_properties, requirements.memory_type_bits, required)?;

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(type_index);
        let handle = driver
            .allocate_memory(&allocate_info)
            .map_err(MemoryAllocateError::Allocation)?;

        Ok(Self {
            handle,
            size: requirements.size,
            type_index,
            property_flags: memory_properties.memory_types[type_index as usize].property_flags,
        })
    }

    pub fn is_host_visible(&self) -> bool {
        self.property_flags
            .contains(vk::MemoryPropertyFlags::HOST_VISIBLE)
    }

    pub fn is_host_coherent(&self) -> bool {
        self.property_flags
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
    }

    pub(crate) fn free(&self, driver: &dyn Driver) {
        driver.free_memory(self.handle);
    }
}
