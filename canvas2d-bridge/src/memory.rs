//! Linear memory shared between the bridge and the raster engine.
//!
//! Numeric payloads (points, colors, matrices, pixels) cross the engine boundary as
//! little-endian arrays written into a single byte heap. Fixed-shape payloads reuse
//! [`ScratchRegions`] reserved once per engine; variable-length payloads are
//! allocated for one call and freed when it returns. A [`ManagedBuffer`] hands the
//! freeing responsibility to the caller instead.

use crate::engine::NativeContext;
use crate::error::{Canvas2dError, Canvas2dResult};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::rc::Weak;

/// Allocation granularity in bytes.
pub const ALIGN: usize = 8;

/// Bytes reserved at offset 0 so that no allocation is ever the null pointer.
const NULL_GUARD: usize = ALIGN;

/// Offset of an allocation inside [`LinearMemory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ptr(u32);

impl Ptr {
    /// The null pointer. Never returned by [`LinearMemory::malloc`].
    pub const NULL: Ptr = Ptr(0);

    /// Byte offset into linear memory.
    pub fn offset(self) -> usize {
        self.0 as usize
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Pointer `bytes` past this one.
    pub fn add(self, bytes: usize) -> Ptr {
        Ptr(self.0.saturating_add(bytes as u32))
    }

    pub(crate) fn raw(self) -> u32 {
        self.0
    }
}

/// Sizing of the linear memory heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Bytes committed when the heap is created.
    pub initial_bytes: usize,
    /// Hard ceiling; allocations beyond it fail with `OutOfMemory`.
    pub max_bytes: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            initial_bytes: 64 * 1024,
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

/// A growable byte heap with a first-fit free-list allocator.
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
    max_bytes: usize,
    /// End of the region handed out so far.
    top: usize,
    /// Free blocks below `top`, keyed by offset.
    free_blocks: BTreeMap<usize, usize>,
    /// Live allocations, offset to rounded size.
    live: HashMap<usize, usize>,
}

impl LinearMemory {
    pub fn new(config: MemoryConfig) -> Self {
        let max_bytes = config.max_bytes.min(u32::MAX as usize);
        let initial = config.initial_bytes.clamp(NULL_GUARD, max_bytes.max(NULL_GUARD));
        Self {
            bytes: vec![0; initial],
            max_bytes,
            top: NULL_GUARD,
            free_blocks: BTreeMap::new(),
            live: HashMap::new(),
        }
    }

    /// Allocate `byte_size` zeroed bytes, 8-byte aligned.
    pub fn malloc(&mut self, byte_size: usize) -> Canvas2dResult<Ptr> {
        let oom = Canvas2dError::OutOfMemory {
            requested: byte_size,
            capacity: self.max_bytes,
        };
        let size = byte_size
            .max(1)
            .checked_next_multiple_of(ALIGN)
            .ok_or(oom)?;

        let reused = self
            .free_blocks
            .iter()
            .find(|(_, &len)| len >= size)
            .map(|(&offset, &len)| (offset, len));

        let offset = match reused {
            Some((offset, len)) => {
                self.free_blocks.remove(&offset);
                if len > size {
                    self.free_blocks.insert(offset + size, len - size);
                }
                offset
            }
            None => {
                let offset = self.top;
                let end = offset.checked_add(size).ok_or(Canvas2dError::OutOfMemory {
                    requested: byte_size,
                    capacity: self.max_bytes,
                })?;
                self.grow_to(end, byte_size)?;
                self.top = end;
                offset
            }
        };

        self.bytes[offset..offset + size].fill(0);
        self.live.insert(offset, size);
        Ok(Ptr(offset as u32))
    }

    /// Release an allocation. Unknown pointers and double frees are errors.
    pub fn free(&mut self, ptr: Ptr) -> Canvas2dResult<()> {
        let offset = ptr.offset();
        let size = self
            .live
            .remove(&offset)
            .ok_or(Canvas2dError::InvalidPointer(ptr.raw()))?;
        self.release_block(offset, size);
        Ok(())
    }

    fn release_block(&mut self, mut offset: usize, mut size: usize) {
        if let Some(next) = self.free_blocks.remove(&(offset + size)) {
            size += next;
        }
        let previous = self
            .free_blocks
            .range(..offset)
            .next_back()
            .map(|(&o, &l)| (o, l));
        if let Some((prev_offset, prev_len)) = previous {
            if prev_offset + prev_len == offset {
                self.free_blocks.remove(&prev_offset);
                offset = prev_offset;
                size += prev_len;
            }
        }
        if offset + size == self.top {
            self.top = offset;
        } else {
            self.free_blocks.insert(offset, size);
        }
    }

    fn grow_to(&mut self, end: usize, requested: usize) -> Canvas2dResult<()> {
        if end <= self.bytes.len() {
            return Ok(());
        }
        if end > self.max_bytes {
            return Err(Canvas2dError::OutOfMemory {
                requested,
                capacity: self.max_bytes,
            });
        }
        let mut new_len = self.bytes.len().max(NULL_GUARD);
        while new_len < end {
            new_len = new_len.saturating_mul(2);
        }
        let new_len = new_len.min(self.max_bytes);
        log::trace!(target: "canvas::memory", "grow {} -> {} bytes", self.bytes.len(), new_len);
        self.bytes.resize(new_len, 0);
        Ok(())
    }

    /// Number of live allocations.
    pub fn live_allocations(&self) -> usize {
        self.live.len()
    }

    /// Total bytes held by live allocations (after alignment).
    pub fn allocated_bytes(&self) -> usize {
        self.live.values().sum()
    }

    /// Bytes currently committed to the heap.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    fn range(&self, ptr: Ptr, len: usize) -> Canvas2dResult<Range<usize>> {
        let start = ptr.offset();
        match start.checked_add(len) {
            Some(end) if !ptr.is_null() && end <= self.top => Ok(start..end),
            _ => Err(Canvas2dError::OutOfBounds {
                ptr: ptr.raw(),
                len,
            }),
        }
    }

    pub fn bytes(&self, ptr: Ptr, len: usize) -> Canvas2dResult<&[u8]> {
        let range = self.range(ptr, len)?;
        Ok(&self.bytes[range])
    }

    pub fn bytes_mut(&mut self, ptr: Ptr, len: usize) -> Canvas2dResult<&mut [u8]> {
        let range = self.range(ptr, len)?;
        Ok(&mut self.bytes[range])
    }

    pub fn write_bytes(&mut self, ptr: Ptr, data: &[u8]) -> Canvas2dResult<()> {
        self.bytes_mut(ptr, data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn read_bytes(&self, ptr: Ptr, len: usize) -> Canvas2dResult<Vec<u8>> {
        Ok(self.bytes(ptr, len)?.to_vec())
    }

    pub fn write_f32s(&mut self, ptr: Ptr, values: &[f32]) -> Canvas2dResult<()> {
        let dst = self.bytes_mut(ptr, values.len() * 4)?;
        for (chunk, value) in dst.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn read_f32s(&self, ptr: Ptr, count: usize) -> Canvas2dResult<Vec<f32>> {
        let src = self.bytes(ptr, count * 4)?;
        Ok(src
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn write_i32s(&mut self, ptr: Ptr, values: &[i32]) -> Canvas2dResult<()> {
        let dst = self.bytes_mut(ptr, values.len() * 4)?;
        for (chunk, value) in dst.chunks_exact_mut(4).zip(values) {
            chunk.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }

    pub fn read_i32s(&self, ptr: Ptr, count: usize) -> Canvas2dResult<Vec<i32>> {
        let src = self.bytes(ptr, count * 4)?;
        Ok(src
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Allocate and fill a float array in one step.
    pub fn alloc_f32s(&mut self, values: &[f32]) -> Canvas2dResult<Ptr> {
        let ptr = self.malloc(values.len() * 4)?;
        self.write_f32s(ptr, values)?;
        Ok(ptr)
    }

    /// Allocate and fill a byte array in one step.
    pub fn alloc_bytes(&mut self, data: &[u8]) -> Canvas2dResult<Ptr> {
        let ptr = self.malloc(data.len())?;
        self.write_bytes(ptr, data)?;
        Ok(ptr)
    }
}

/// Fixed-shape payload slots reserved once per engine context.
///
/// Each call writes its payload and hands the pointer to the engine, which consumes
/// it before returning, so one slot per shape is enough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScratchRegions {
    /// 4 x f32 RGBA color.
    pub color: Ptr,
    /// 9 x f32 row-major 3x3 matrix.
    pub matrix: Ptr,
    /// 4 x i32 integer rect (x, y, width, height).
    pub irect: Ptr,
    /// 4 x f32 rect (left, top, right, bottom).
    pub rect: Ptr,
    /// 4 x f32 source rect for image draws.
    pub src_rect: Ptr,
}

impl ScratchRegions {
    pub fn reserve(memory: &mut LinearMemory) -> Canvas2dResult<Self> {
        Ok(Self {
            color: memory.malloc(4 * 4)?,
            matrix: memory.malloc(9 * 4)?,
            irect: memory.malloc(4 * 4)?,
            rect: memory.malloc(4 * 4)?,
            src_rect: memory.malloc(4 * 4)?,
        })
    }
}

/// A caller-owned allocation in an engine's linear memory.
///
/// The caller frees it with [`ManagedBuffer::free`]; freeing twice or touching
/// it afterwards is a [`Canvas2dError::BufferFreed`] error. A buffer dropped without
/// being freed releases its allocation.
#[derive(Debug)]
pub struct ManagedBuffer {
    ptr: Ptr,
    byte_len: usize,
    owner: Weak<RefCell<NativeContext>>,
    freed: bool,
}

impl ManagedBuffer {
    pub(crate) fn new(ptr: Ptr, byte_len: usize, owner: Weak<RefCell<NativeContext>>) -> Self {
        Self {
            ptr,
            byte_len,
            owner,
            freed: false,
        }
    }

    /// Pointer to the start of the buffer.
    pub fn ptr(&self) -> Canvas2dResult<Ptr> {
        if self.freed {
            return Err(Canvas2dError::BufferFreed(self.ptr.raw()));
        }
        Ok(self.ptr)
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// Whether this buffer lives in the given engine context.
    pub(crate) fn belongs_to(&self, native: &std::rc::Rc<RefCell<NativeContext>>) -> bool {
        std::ptr::eq(self.owner.as_ptr(), std::rc::Rc::as_ptr(native))
    }

    fn with_memory<R>(
        &self,
        f: impl FnOnce(&mut LinearMemory, Ptr) -> Canvas2dResult<R>,
    ) -> Canvas2dResult<R> {
        let ptr = self.ptr()?;
        let owner = self
            .owner
            .upgrade()
            .ok_or(Canvas2dError::UnknownHandle { kind: "engine" })?;
        let mut native = owner
            .try_borrow_mut()
            .map_err(|_| Canvas2dError::EngineBusy)?;
        f(native.engine.memory_mut(), ptr)
    }

    pub fn write_f32s(&self, values: &[f32]) -> Canvas2dResult<()> {
        if values.len() * 4 > self.byte_len {
            return Err(Canvas2dError::OutOfBounds {
                ptr: self.ptr.raw(),
                len: values.len() * 4,
            });
        }
        self.with_memory(|memory, ptr| memory.write_f32s(ptr, values))
    }

    pub fn read_f32s(&self, count: usize) -> Canvas2dResult<Vec<f32>> {
        let count = count.min(self.byte_len / 4);
        self.with_memory(|memory, ptr| memory.read_f32s(ptr, count))
    }

    pub fn write_bytes(&self, data: &[u8]) -> Canvas2dResult<()> {
        if data.len() > self.byte_len {
            return Err(Canvas2dError::OutOfBounds {
                ptr: self.ptr.raw(),
                len: data.len(),
            });
        }
        self.with_memory(|memory, ptr| memory.write_bytes(ptr, data))
    }

    pub fn read_bytes(&self) -> Canvas2dResult<Vec<u8>> {
        let len = self.byte_len;
        self.with_memory(|memory, ptr| memory.read_bytes(ptr, len))
    }

    /// Free the buffer. Exactly one call succeeds.
    pub fn free(&mut self) -> Canvas2dResult<()> {
        self.with_memory(|memory, ptr| memory.free(ptr))?;
        self.freed = true;
        Ok(())
    }

    /// Free through an already borrowed engine context.
    pub(crate) fn free_in(&mut self, native: &mut NativeContext) -> Canvas2dResult<()> {
        let ptr = self.ptr()?;
        native.engine.memory_mut().free(ptr)?;
        self.freed = true;
        Ok(())
    }
}

impl Drop for ManagedBuffer {
    fn drop(&mut self) {
        if self.freed {
            return;
        }
        if let Err(err) = self.free() {
            log::debug!(target: "canvas::memory", "managed buffer not released on drop: {}", err);
        }
    }
}
