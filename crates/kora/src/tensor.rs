//! Runtime tensor contract shared by every backend.
//!
//! A tensor is owned by exactly one backend's registry; "portable" tensors
//! may additionally be aliased read-only into other registries as migrants.
//! Buffers sit behind a lock so migrant readers and the owning writer can be
//! scheduled from different worker threads.

use std::ops::{Deref, DerefMut};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{ExecError, ExecResult};
use crate::ir::{DType, Layout, OperandInfo, Shape};

/// Lazily allocated byte storage for one tensor.
pub struct Buffer {
    bytes: RwLock<Option<Vec<u8>>>,
}

impl Buffer {
    pub fn unallocated() -> Self {
        Self {
            bytes: RwLock::new(None),
        }
    }

    pub fn allocated(len: usize) -> Self {
        Self {
            bytes: RwLock::new(Some(vec![0; len])),
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.bytes.read().expect("buffer lock poisoned").is_some()
    }

    /// Allocates zeroed storage; keeps existing storage if already allocated.
    pub fn ensure_allocated(&self, len: usize) {
        let mut bytes = self.bytes.write().expect("buffer lock poisoned");
        if bytes.is_none() {
            *bytes = Some(vec![0; len]);
        }
    }

    /// Releases the storage. Reading an unallocated buffer is an error.
    pub fn release(&self) {
        *self.bytes.write().expect("buffer lock poisoned") = None;
    }

    pub fn read(&self) -> ExecResult<BufferReadGuard<'_>> {
        let guard = self.bytes.read().expect("buffer lock poisoned");
        if guard.is_none() {
            return Err(ExecError::state("read from unallocated tensor buffer"));
        }
        Ok(BufferReadGuard(guard))
    }

    pub fn write(&self) -> ExecResult<BufferWriteGuard<'_>> {
        let guard = self.bytes.write().expect("buffer lock poisoned");
        if guard.is_none() {
            return Err(ExecError::state("write to unallocated tensor buffer"));
        }
        Ok(BufferWriteGuard(guard))
    }

    pub fn copy_from_slice(&self, src: &[u8]) -> ExecResult<()> {
        let mut guard = self.write()?;
        if guard.len() != src.len() {
            return Err(ExecError::invalid_io(format!(
                "buffer length mismatch: expected {}, got {}",
                guard.len(),
                src.len()
            )));
        }
        guard.copy_from_slice(src);
        Ok(())
    }

    pub fn to_vec(&self) -> ExecResult<Vec<u8>> {
        Ok(self.read()?.to_vec())
    }
}

pub struct BufferReadGuard<'a>(RwLockReadGuard<'a, Option<Vec<u8>>>);

impl Deref for BufferReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0.as_deref().unwrap_or(&[])
    }
}

pub struct BufferWriteGuard<'a>(RwLockWriteGuard<'a, Option<Vec<u8>>>);

impl Deref for BufferWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.0.as_deref().unwrap_or(&[])
    }
}

impl DerefMut for BufferWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.0.as_deref_mut().unwrap_or(&mut [])
    }
}

/// Runtime tensor identified by its operand index in some registry.
pub trait Tensor: Send + Sync {
    fn dtype(&self) -> DType;

    fn shape(&self) -> &Shape;

    fn layout(&self) -> Layout;

    /// Dynamic tensors allocate at run time and are released by the dealloc
    /// shim after their final use; static buffers live as long as the
    /// executor.
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Portable tensors can be aliased read-only into other backends'
    /// registries as migrants.
    fn is_portable(&self) -> bool {
        false
    }

    fn buffer(&self) -> &Buffer;

    fn byte_len(&self) -> usize {
        self.shape().num_elements() * self.dtype().size_in_bytes()
    }
}

/// Plain host-memory tensor; the native tensor type of the builtin backend.
pub struct HostTensor {
    info: OperandInfo,
    layout: Layout,
    buffer: Buffer,
}

impl HostTensor {
    /// Static tensors are allocated immediately, dynamic ones on first write.
    pub fn new(info: OperandInfo, layout: Layout) -> Self {
        let buffer = if info.is_dynamic {
            Buffer::unallocated()
        } else {
            Buffer::allocated(info.byte_len())
        };
        Self {
            info,
            layout,
            buffer,
        }
    }

    pub fn info(&self) -> &OperandInfo {
        &self.info
    }
}

impl Tensor for HostTensor {
    fn dtype(&self) -> DType {
        self.info.dtype
    }

    fn shape(&self) -> &Shape {
        &self.info.shape
    }

    fn layout(&self) -> Layout {
        self.layout
    }

    fn is_dynamic(&self) -> bool {
        self.info.is_dynamic
    }

    fn is_portable(&self) -> bool {
        true
    }

    fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}

// Typed accessors used by host kernels and tests. Buffers store
// little-endian bytes; these convert at the boundary.

pub fn read_f32(tensor: &dyn Tensor) -> ExecResult<Vec<f32>> {
    if tensor.dtype() != DType::F32 {
        return Err(ExecError::invalid_io(format!(
            "expected f32 tensor, got {}",
            tensor.dtype()
        )));
    }
    let guard = tensor.buffer().read()?;
    Ok(guard
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub fn write_f32(tensor: &dyn Tensor, values: &[f32]) -> ExecResult<()> {
    if tensor.dtype() != DType::F32 {
        return Err(ExecError::invalid_io(format!(
            "expected f32 tensor, got {}",
            tensor.dtype()
        )));
    }
    tensor.buffer().ensure_allocated(tensor.byte_len());
    let mut guard = tensor.buffer().write()?;
    if guard.len() != values.len() * 4 {
        return Err(ExecError::invalid_io(format!(
            "f32 write of {} elements into a buffer of {} bytes",
            values.len(),
            guard.len()
        )));
    }
    for (chunk, value) in guard.chunks_exact_mut(4).zip(values) {
        chunk.copy_from_slice(&value.to_le_bytes());
    }
    Ok(())
}

pub fn read_scalar_bool(tensor: &dyn Tensor) -> ExecResult<bool> {
    if tensor.dtype() != DType::Bool {
        return Err(ExecError::invalid_io(format!(
            "expected bool tensor, got {}",
            tensor.dtype()
        )));
    }
    let guard = tensor.buffer().read()?;
    guard
        .first()
        .map(|byte| *byte != 0)
        .ok_or_else(|| ExecError::invalid_io("empty bool tensor"))
}

pub fn write_scalar_bool(tensor: &dyn Tensor, value: bool) -> ExecResult<()> {
    tensor.buffer().ensure_allocated(tensor.byte_len());
    let mut guard = tensor.buffer().write()?;
    if guard.is_empty() {
        return Err(ExecError::invalid_io("empty bool tensor"));
    }
    guard[0] = value as u8;
    Ok(())
}
