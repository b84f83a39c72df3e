//! Generational handle tables for native engine objects.
//!
//! Handles carry the generation of the slot they were issued from, so a handle kept
//! past its deletion never resolves to whatever object later reuses the slot.

use crate::error::{Canvas2dError, Canvas2dResult};
use std::fmt;
use std::marker::PhantomData;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GenIndex {
    pub index: u32,
    pub generation: u32,
}

/// Kind marker for a handle type.
pub trait HandleKind {
    const NAME: &'static str;
}

/// A typed generational handle.
pub struct Handle<K> {
    id: GenIndex,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Handle<K> {
    fn new(id: GenIndex) -> Self {
        Self {
            id,
            _kind: PhantomData,
        }
    }

    pub fn index(&self) -> u32 {
        self.id.index
    }

    pub fn generation(&self) -> u32 {
        self.id.generation
    }
}

impl<K> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Handle<K> {}

impl<K> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K> Eq for Handle<K> {}

impl<K> std::hash::Hash for Handle<K> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}v{}", K::NAME, self.id.index, self.id.generation)
    }
}

#[derive(Debug)]
pub enum SurfaceKind {}
#[derive(Debug)]
pub enum ShaderKind {}
#[derive(Debug)]
pub enum ImageKind {}

impl HandleKind for SurfaceKind {
    const NAME: &'static str = "surface";
}
impl HandleKind for ShaderKind {
    const NAME: &'static str = "shader";
}
impl HandleKind for ImageKind {
    const NAME: &'static str = "image";
}

/// Native surface (render target) handle.
pub type SurfaceId = Handle<SurfaceKind>;
/// Native shader handle.
pub type ShaderId = Handle<ShaderKind>;
/// Native image handle.
pub type ImageId = Handle<ImageKind>;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
    next_free: Option<u32>,
}

/// Slot storage behind one handle kind.
pub struct HandleTable<K, T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind, T> Default for HandleTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: HandleKind, T> HandleTable<K, T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
            _kind: PhantomData,
        }
    }

    pub fn insert(&mut self, value: T) -> Handle<K> {
        self.len += 1;
        if let Some(i) = self.free_head {
            let slot = &mut self.slots[i as usize];
            self.free_head = slot.next_free.take();
            slot.value = Some(value);
            return Handle::new(GenIndex {
                index: i,
                generation: slot.generation,
            });
        }
        let i = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
            next_free: None,
        });
        Handle::new(GenIndex {
            index: i,
            generation: 0,
        })
    }

    pub fn get(&self, handle: Handle<K>) -> Canvas2dResult<&T> {
        self.slots
            .get(handle.id.index as usize)
            .filter(|slot| slot.generation == handle.id.generation)
            .and_then(|slot| slot.value.as_ref())
            .ok_or(Canvas2dError::UnknownHandle { kind: K::NAME })
    }

    pub fn get_mut(&mut self, handle: Handle<K>) -> Canvas2dResult<&mut T> {
        self.slots
            .get_mut(handle.id.index as usize)
            .filter(|slot| slot.generation == handle.id.generation)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(Canvas2dError::UnknownHandle { kind: K::NAME })
    }

    pub fn remove(&mut self, handle: Handle<K>) -> Canvas2dResult<T> {
        let slot = self
            .slots
            .get_mut(handle.id.index as usize)
            .filter(|slot| slot.generation == handle.id.generation)
            .ok_or(Canvas2dError::UnknownHandle { kind: K::NAME })?;
        let value = slot
            .value
            .take()
            .ok_or(Canvas2dError::UnknownHandle { kind: K::NAME })?;
        slot.generation = slot.generation.wrapping_add(1);
        slot.next_free = self.free_head;
        self.free_head = Some(handle.id.index);
        self.len -= 1;
        Ok(value)
    }

    pub fn contains(&self, handle: Handle<K>) -> bool {
        self.get(handle).is_ok()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
