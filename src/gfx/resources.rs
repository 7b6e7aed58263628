use std::marker::PhantomData;

use slotmap::{SlotMap, new_key_type};

use super::{
    buffer::Buffer, descriptor::DescriptorLayout, driver::Driver, shader::ShaderModule,
};

new_key_type! {
    pub struct BufferId;
    pub struct ShaderId;
    pub struct DescriptorLayoutId;
}

/// A [`BufferId`] that remembers the record type the buffer was sized for.
pub struct TypedBufferId<T> {
    pub(crate) id: BufferId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedBufferId<T> {
    pub(crate) fn new(id: BufferId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn untyped(self) -> BufferId {
        self.id
    }
}

impl<T> Clone for TypedBufferId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for TypedBufferId<T> {}

impl<T> PartialEq for TypedBufferId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for TypedBufferId<T> {}

impl<T> std::fmt::Debug for TypedBufferId<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypedBufferId").field(&self.id).finish()
    }
}

/// Device-dependent resources handed out by a context.
#[derive(Default)]
pub(crate) struct ResourceArena {
    pub buffers: SlotMap<BufferId, Buffer>,
    pub shaders: SlotMap<ShaderId, ShaderModule>,
    pub layouts: SlotMap<DescriptorLayoutId, DescriptorLayout>,
}

impl ResourceArena {
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty() && self.shaders.is_empty() && self.layouts.is_empty()
    }

    /// Destroys every remaining resource: descriptor layouts, then shaders, then buffers.
    pub fn destroy_all(&mut self, driver: &dyn Driver) {
        for (_, layout) in self.layouts.drain() {
            layout.destroy(driver);
        }
        for (_, shader) in self.shaders.drain() {
            shader.destroy(driver);
        }
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy(driver);
        }
    }
}
