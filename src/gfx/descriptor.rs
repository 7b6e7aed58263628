use ash::vk;
use thiserror::Error;

use super::{
    buffer::Buffer,
    driver::Driver,
    error::ErrorKind,
    resources::{BufferId, DescriptorLayoutId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    UniformBuffer,
    Sampler,
}

impl DescriptorKind {
    pub fn descriptor_type(self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::Sampler => vk::DescriptorType::SAMPLER,
        }
    }
}

/// Shader stages a binding is visible to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderVisibility {
    Vertex,
    Fragment,
    Both,
}

impl ShaderVisibility {
    pub fn stage_flags(self) -> vk::ShaderStageFlags {
        match self {
            Self::Vertex => vk::ShaderStageFlags::VERTEX,
            Self::Fragment => vk::ShaderStageFlags::FRAGMENT,
            Self::Both => vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub slot: u32,
    pub kind: DescriptorKind,
    pub visibility: ShaderVisibility,
}

#[derive(Debug, Error)]
pub enum DescriptorDeclareError {
    #[error("binding declared at slot {slot} but the next free slot is {expected}")]
    SlotMismatch { slot: u32, expected: u32 },
}

#[derive(Debug, Error)]
pub enum DescriptorLayoutCreateError {
    #[error("a descriptor layout needs at least one binding")]
    Empty,

    #[error("vulkan call to create descriptor set layout failed")]
    SetLayoutCreation(vk::Result),

    #[error("vulkan call to create pipeline layout failed")]
    PipelineLayoutCreation(vk::Result),

    #[error("vulkan call to create descriptor pool failed")]
    PoolCreation(vk::Result),
}

impl DescriptorLayoutCreateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Empty => ErrorKind::Driver,
            Self::SetLayoutCreation(result)
            | Self::PipelineLayoutCreation(result)
            | Self::PoolCreation(result) => ErrorKind::from_vk(*result),
        }
    }
}

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("vulkan call to allocate descriptor set failed")]
    Allocation(vk::Result),

    #[error("binding index {index} out of range, layout declares {count} bindings")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("binding {index} is a {expected:?} binding, got a {found:?} resource")]
    KindMismatch {
        index: usize,
        expected: DescriptorKind,
        found: DescriptorKind,
    },

    #[error("binding {index} has no resource set")]
    Unfilled { index: usize },

    #[error("vulkan call to update descriptor sets failed")]
    Update(vk::Result),
}

impl BindingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Allocation(result) | Self::Update(result) => ErrorKind::from_vk(*result),
            Self::IndexOutOfRange { .. } | Self::KindMismatch { .. } | Self::Unfilled { .. } => {
                ErrorKind::Driver
            }
        }
    }
}

/// Collects binding declarations in slot order.
#[derive(Debug, Default, Clone)]
pub struct DescriptorLayoutBuilder {
    bindings: Vec<DescriptorBinding>,
}

impl DescriptorLayoutBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a binding. `slot` has to be the number of bindings declared so far.
    pub fn add(
        &mut self,
        slot: u32,
        kind: DescriptorKind,
        visibility: ShaderVisibility,
    ) -> Result<&mut Self, DescriptorDeclareError> {
        let expected = self.bindings.len() as u32;
        if slot != expected {
            return Err(DescriptorDeclareError::SlotMismatch { slot, expected });
        }

        self.bindings.push(DescriptorBinding {
            slot,
            kind,
            visibility,
        });
        Ok(self)
    }

    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    /// Creates the set layout, a pipeline layout around it, and a pool holding one set.
    pub fn create(&self, driver: &dyn Driver) -> Result<DescriptorLayout, DescriptorLayoutCreateError> {
        if self.bindings.is_empty() {
            return Err(DescriptorLayoutCreateError::Empty);
        }

        let layout_bindings: Vec<_> = self
            .bindings
            .iter()
            .map(|binding| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(binding.slot)
                    .descriptor_type(binding.kind.descriptor_type())
                    .descriptor_count(1)
                    .stage_flags(binding.visibility.stage_flags())
            })
            .collect();
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&layout_bindings);
        let set_layout = driver
            .create_descriptor_set_layout(&layout_info)
            .map_err(DescriptorLayoutCreateError::SetLayoutCreation)?;

        let set_layouts = [set_layout];
        let pipeline_layout_info = vk::PipelineLayoutCreateInfo::default().set_layouts(&set_layouts);
        let pipeline_layout = match driver.create_pipeline_layout(&pipeline_layout_info) {
            Ok(pipeline_layout) => pipeline_layout,
            Err(err) => {
                driver.destroy_descriptor_set_layout(set_layout);
                return Err(DescriptorLayoutCreateError::PipelineLayoutCreation(err));
            }
        };

        let pool_sizes: Vec<_> = self
            .bindings
            .iter()
            .map(|binding| {
                vk::DescriptorPoolSize::default()
                    .ty(binding.kind.descriptor_type())
                    .descriptor_count(1)
            })
            .collect();
        let pool_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(1)
            .pool_sizes(&pool_sizes);
        let pool = match driver.create_descriptor_pool(&pool_info) {
            Ok(pool) => pool,
            Err(err) => {
                driver.destroy_pipeline_layout(pipeline_layout);
                driver.destroy_descriptor_set_layout(set_layout);
                return Err(DescriptorLayoutCreateError::PoolCreation(err));
            }
        };

        log::debug!(
            "created descriptor layout with {} bindings",
            self.bindings.len()
        );

        Ok(DescriptorLayout {
            bindings: self.bindings.clone(),
            set_layout,
            pipeline_layout,
            pool,
        })
    }
}

/// The objects built from a [`DescriptorLayoutBuilder`]. The pool has room for exactly one
/// descriptor set.
#[derive(Debug)]
pub struct DescriptorLayout {
    pub(crate) bindings: Vec<DescriptorBinding>,
    pub(crate) set_layout: vk::DescriptorSetLayout,
    pub(crate) pipeline_layout: vk::PipelineLayout,
    pub(crate) pool: vk::DescriptorPool,
}

impl DescriptorLayout {
    pub fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }

    pub fn set_layout(&self) -> vk::DescriptorSetLayout {
        self.set_layout
    }

    pub fn pipeline_layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }

    /// Allocates the descriptor set and prepares one write per declared binding. `layout_id`
    /// is the arena key this layout is stored under.
    pub(crate) fn create_binding(
        &self,
        driver: &dyn Driver,
        layout_id: DescriptorLayoutId,
    ) -> Result<Binding, BindingError> {
        let set_layouts = [self.set_layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&set_layouts);
        let set = driver
            .allocate_descriptor_sets(&allocate_info)
            .map_err(BindingError::Allocation)?
            .first()
            .copied()
            .ok_or(BindingError::Allocation(vk::Result::ERROR_UNKNOWN))?;

        let writes = self
            .bindings
            .iter()
            .map(|binding| PreparedWrite {
                binding: binding.slot,
                kind: binding.kind,
                resource: None,
                buffer: None,
            })
            .collect();

        Ok(Binding {
            layout: layout_id,
            set,
            writes,
        })
    }

    /// Destroys the pool (and every set allocated from it), the pipeline layout, then the set
    /// layout.
    pub(crate) fn destroy(&self, driver: &dyn Driver) {
        log::debug!("destroying descriptor layout");
        driver.destroy_descriptor_pool(self.pool);
        driver.destroy_pipeline_layout(self.pipeline_layout);
        driver.destroy_descriptor_set_layout(self.set_layout);
    }
}

#[derive(Debug, Clone, Copy)]
enum Resource {
    Buffer(vk::DescriptorBufferInfo),
    Sampler(vk::DescriptorImageInfo),
}

#[derive(Debug, Clone, Copy)]
struct PreparedWrite {
    binding: u32,
    kind: DescriptorKind,
    resource: Option<Resource>,
    buffer: Option<BufferId>,
}

/// One descriptor set and the pending writes for each of its bindings. Nothing reaches the
/// device before it is applied through the context.
///
/// The set lives in the pool of `layout` and each buffer write refers back to its arena key,
/// so the context can refuse to apply a binding whose layout or buffers are gone.
#[derive(Debug)]
pub struct Binding {
    layout: DescriptorLayoutId,
    set: vk::DescriptorSet,
    writes: Vec<PreparedWrite>,
}

impl Binding {
    pub fn set(&self) -> vk::DescriptorSet {
        self.set
    }

    pub fn layout(&self) -> DescriptorLayoutId {
        self.layout
    }

    pub(crate) fn bound_buffers(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.writes.iter().filter_map(|write| write.buffer)
    }

    fn write_mut(
        &mut self,
        index: usize,
        found: DescriptorKind,
    ) -> Result<&mut PreparedWrite, BindingError> {
        let count = self.writes.len();
        let write = self
            .writes
            .get_mut(index)
            .ok_or(BindingError::IndexOutOfRange { index, count })?;
        if write.kind != found {
            return Err(BindingError::KindMismatch {
                index,
                expected: write.kind,
                found,
            });
        }

        Ok(write)
    }

    /// Points uniform buffer binding `index` at the whole logical range of `buffer`, stored
    /// under `id`.
    pub(crate) fn set_buffer(
        &mut self,
        index: usize,
        id: BufferId,
        buffer: &Buffer,
    ) -> Result<(), BindingError> {
        let write = self.write_mut(index, DescriptorKind::UniformBuffer)?;
        write.buffer = Some(id);
        write.resource = Some(Resource::Buffer(
            vk::DescriptorBufferInfo::default()
                .buffer(buffer.handle())
                .offset(0)
                .range(buffer.size()),
        ));

        Ok(())
    }

    pub fn set_sampler(&mut self, index: usize, sampler: vk::Sampler) -> Result<(), BindingError> {
        let write = self.write_mut(index, DescriptorKind::Sampler)?;
        write.buffer = None;
        write.resource = Some(Resource::Sampler(
            vk::DescriptorImageInfo::default().sampler(sampler),
        ));

        Ok(())
    }

    /// Submits every prepared write in one update.
    pub(crate) fn apply(&self, driver: &dyn Driver) -> Result<(), BindingError> {
        let writes = self
            .writes
            .iter()
            .enumerate()
            .map(|(index, write)| {
                let resource = write
                    .resource
                    .as_ref()
                    .ok_or(BindingError::Unfilled { index })?;

                let descriptor_write = vk::WriteDescriptorSet::default()
                    .dst_set(self.set)
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(write.kind.descriptor_type());
                Ok(match resource {
                    Resource::Buffer(info) => {
                        descriptor_write.buffer_info(std::slice::from_ref(info))
                    }
                    Resource::Sampler(info) => {
                        descriptor_write.image_info(std::slice::from_ref(info))
                    }
                })
            })
            .collect::<Result<Vec<_>, BindingError>>()?;

        driver
            .update_descriptor_sets(&writes)
            .map_err(BindingError::Update)
    }
}
