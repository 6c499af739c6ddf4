use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Type-safe resource handle
pub struct Handle<T> {
    id: u64,
    _phantom: PhantomData<fn() -> T>,
}

// No bounds on T.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Handle").field(&self.id).finish()
    }
}

/// Handle ID generator
static HANDLE_ID: AtomicU64 = AtomicU64::new(1);

impl<T> Handle<T> {
    /// Allocate a fresh, never-registered handle.
    pub fn next() -> Self {
        Self {
            id: HANDLE_ID.fetch_add(1, Ordering::Relaxed),
            _phantom: PhantomData,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A wgpu object that can live in a [`ResourceRegistry`].
pub trait Resource: Sized + 'static {
    #[doc(hidden)]
    fn table(registry: &ResourceRegistry) -> &HashMap<u64, Self>;
    #[doc(hidden)]
    fn table_mut(registry: &mut ResourceRegistry) -> &mut HashMap<u64, Self>;
}

macro_rules! registry_resource {
    ($ty:ty, $field:ident) => {
        impl Resource for $ty {
            fn table(registry: &ResourceRegistry) -> &HashMap<u64, Self> {
                &registry.$field
            }

            fn table_mut(registry: &mut ResourceRegistry) -> &mut HashMap<u64, Self> {
                &mut registry.$field
            }
        }
    };
}

/// Registry mapping handles to actual wgpu resources
/// Provides type-safe resource lookup and management
#[derive(Default)]
pub struct ResourceRegistry {
    buffers: HashMap<u64, wgpu::Buffer>,
    bind_group_layouts: HashMap<u64, wgpu::BindGroupLayout>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    render_pipelines: HashMap<u64, wgpu::RenderPipeline>,
    shader_modules: HashMap<u64, wgpu::ShaderModule>,
}

registry_resource!(wgpu::Buffer, buffers);
registry_resource!(wgpu::BindGroupLayout, bind_group_layouts);
registry_resource!(wgpu::BindGroup, bind_groups);
registry_resource!(wgpu::RenderPipeline, render_pipelines);
registry_resource!(wgpu::ShaderModule, shader_modules);

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource and return its handle
    pub fn insert<T: Resource>(&mut self, resource: T) -> Handle<T> {
        let handle = Handle::next();
        T::table_mut(self).insert(handle.id, resource);
        handle
    }

    /// Look up a resource by handle
    pub fn get<T: Resource>(&self, handle: Handle<T>) -> Option<&T> {
        T::table(self).get(&handle.id)
    }

    /// Remove a resource, handing ownership back to the caller
    pub fn remove<T: Resource>(&mut self, handle: Handle<T>) -> Option<T> {
        T::table_mut(self).remove(&handle.id)
    }

    pub fn len<T: Resource>(&self) -> usize {
        T::table(self).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = Handle::<wgpu::Buffer>::next();
        let b = Handle::<wgpu::Buffer>::next();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn unknown_handle_misses() {
        let registry = ResourceRegistry::new();
        assert!(registry.get(Handle::<wgpu::RenderPipeline>::next()).is_none());
        assert_eq!(registry.len::<wgpu::Buffer>(), 0);
    }
}
