use std::sync::Arc;

use crate::error::{ExecError, ExecResult};
use crate::exec::Function;
use crate::ir::PermuteType;
use crate::tensor::Tensor;

/// Copies one tensor into another, converting the feature-map layout.
///
/// The only kernel whose input and output are different tensor objects; it
/// therefore requires every other backend's tensors to be finalized before
/// it is generated. Tensors of rank other than 4 are layout-agnostic and
/// copied as-is.
pub struct PermuteKernel {
    input: Arc<dyn Tensor>,
    output: Arc<dyn Tensor>,
    permute_type: PermuteType,
}

impl PermuteKernel {
    pub fn new(input: Arc<dyn Tensor>, output: Arc<dyn Tensor>, permute_type: PermuteType) -> Self {
        Self {
            input,
            output,
            permute_type,
        }
    }

    fn copy_bytes(&self) -> ExecResult<()> {
        let src = self.input.buffer().read()?;
        self.output.buffer().ensure_allocated(self.output.byte_len());
        let mut dst = self.output.buffer().write()?;
        if src.len() != dst.len() {
            return Err(ExecError::invalid_io(format!(
                "permute copy length mismatch: {} vs {}",
                src.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(&src);
        Ok(())
    }

    fn permute_rank4(&self, to_nchw: bool) -> ExecResult<()> {
        let dims = self.input.shape().dims().to_vec();
        let elem = self.input.dtype().size_in_bytes();
        // Logical extents are NHWC regardless of direction; only the memory
        // order of the destination differs.
        let (n, h, w, c) = if to_nchw {
            (dims[0], dims[1], dims[2], dims[3])
        } else {
            (dims[0], dims[2], dims[3], dims[1])
        };

        let src = self.input.buffer().read()?;
        self.output.buffer().ensure_allocated(self.output.byte_len());
        let mut dst = self.output.buffer().write()?;
        if src.len() != dst.len() {
            return Err(ExecError::invalid_io(format!(
                "permute length mismatch: {} vs {}",
                src.len(),
                dst.len()
            )));
        }

        for batch in 0..n {
            for row in 0..h {
                for col in 0..w {
                    for ch in 0..c {
                        let nhwc = ((batch * h + row) * w + col) * c + ch;
                        let nchw = ((batch * c + ch) * h + row) * w + col;
                        let (src_at, dst_at) = if to_nchw {
                            (nhwc * elem, nchw * elem)
                        } else {
                            (nchw * elem, nhwc * elem)
                        };
                        dst[dst_at..dst_at + elem].copy_from_slice(&src[src_at..src_at + elem]);
                    }
                }
            }
        }
        Ok(())
    }
}

impl Function for PermuteKernel {
    fn run(&mut self) -> ExecResult<()> {
        match self.permute_type {
            PermuteType::Copy => self.copy_bytes(),
            PermuteType::NhwcToNchw => {
                if self.input.shape().rank() == 4 {
                    self.permute_rank4(true)
                } else {
                    self.copy_bytes()
                }
            }
            PermuteType::NchwToNhwc => {
                if self.input.shape().rank() == 4 {
                    self.permute_rank4(false)
                } else {
                    self.copy_bytes()
                }
            }
        }
    }
}
