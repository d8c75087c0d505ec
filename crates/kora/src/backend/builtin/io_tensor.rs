use crate::ir::{DType, Layout, OperandInfo, Shape};
use crate::tensor::{Buffer, Tensor};

/// Boundary tensor for a graph input or output, owned by the builtin
/// backend.
///
/// Hosts copy bytes in through `Executor::set_input` and out through
/// `Executor::get_output`; backend kernels reach the same storage as a
/// portable migrant. IO buffers are allocated for the executor's lifetime
/// and never appear in dealloc lists.
pub struct IoTensor {
    info: OperandInfo,
    layout: Layout,
    buffer: Buffer,
}

impl IoTensor {
    pub fn new(info: OperandInfo, layout: Layout) -> Self {
        let buffer = Buffer::allocated(info.byte_len());
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

impl Tensor for IoTensor {
    fn dtype(&self) -> DType {
        self.info.dtype
    }

    fn shape(&self) -> &Shape {
        &self.info.shape
    }

    fn layout(&self) -> Layout {
        self.layout
    }

    fn is_portable(&self) -> bool {
        true
    }

    fn buffer(&self) -> &Buffer {
        &self.buffer
    }
}
