use kora::ir::{DType, Layout, OperandInfo, Shape};
use kora::tensor::{Buffer, Tensor};

/// Native tensor of the reference CPU backend.
///
/// Plain host memory, so it is portable: other backends may alias it
/// read-only through migrant registration. Static tensors are allocated at
/// context build time; dynamic ones allocate on first write and are
/// released by the dealloc shim after their final use.
pub struct CpuTensor {
    info: OperandInfo,
    layout: Layout,
    buffer: Buffer,
}

impl CpuTensor {
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

impl Tensor for CpuTensor {
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
