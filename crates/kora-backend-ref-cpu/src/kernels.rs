//! Naive reference kernels over f32 host memory.
//!
//! Correctness-first loops with no vectorization; feature maps are NHWC and
//! conv filters OHWI.

use std::sync::Arc;

use kora::error::{ExecError, ExecResult};
use kora::exec::Function;
use kora::ir::{ComparisonOp, Conv2dSpec, ElementwiseBinaryOp, ElementwiseUnaryOp};
use kora::tensor::{read_f32, write_f32, Tensor};

fn expect_same_len(lhs: usize, rhs: usize) -> ExecResult<()> {
    if lhs != rhs {
        return Err(ExecError::invalid_io(format!(
            "elementwise operands differ in length: {lhs} vs {rhs}"
        )));
    }
    Ok(())
}

pub struct BinaryKernel {
    op: ElementwiseBinaryOp,
    lhs: Arc<dyn Tensor>,
    rhs: Arc<dyn Tensor>,
    output: Arc<dyn Tensor>,
}

impl BinaryKernel {
    pub fn new(
        op: ElementwiseBinaryOp,
        lhs: Arc<dyn Tensor>,
        rhs: Arc<dyn Tensor>,
        output: Arc<dyn Tensor>,
    ) -> Self {
        Self {
            op,
            lhs,
            rhs,
            output,
        }
    }
}

impl Function for BinaryKernel {
    fn run(&mut self) -> ExecResult<()> {
        let lhs = read_f32(self.lhs.as_ref())?;
        let rhs = read_f32(self.rhs.as_ref())?;
        expect_same_len(lhs.len(), rhs.len())?;
        let result: Vec<f32> = lhs
            .iter()
            .zip(&rhs)
            .map(|(a, b)| match self.op {
                ElementwiseBinaryOp::Add => a + b,
                ElementwiseBinaryOp::Sub => a - b,
                ElementwiseBinaryOp::Mul => a * b,
                ElementwiseBinaryOp::Div => a / b,
            })
            .collect();
        write_f32(self.output.as_ref(), &result)
    }
}

pub struct UnaryKernel {
    op: ElementwiseUnaryOp,
    input: Arc<dyn Tensor>,
    output: Arc<dyn Tensor>,
}

impl UnaryKernel {
    pub fn new(op: ElementwiseUnaryOp, input: Arc<dyn Tensor>, output: Arc<dyn Tensor>) -> Self {
        Self { op, input, output }
    }
}

impl Function for UnaryKernel {
    fn run(&mut self) -> ExecResult<()> {
        let input = read_f32(self.input.as_ref())?;
        let result: Vec<f32> = input
            .iter()
            .map(|v| match self.op {
                ElementwiseUnaryOp::Relu => v.max(0.0),
                ElementwiseUnaryOp::Neg => -v,
                ElementwiseUnaryOp::Abs => v.abs(),
                ElementwiseUnaryOp::Exp => v.exp(),
                ElementwiseUnaryOp::Tanh => v.tanh(),
            })
            .collect();
        write_f32(self.output.as_ref(), &result)
    }
}

pub struct CompareKernel {
    op: ComparisonOp,
    lhs: Arc<dyn Tensor>,
    rhs: Arc<dyn Tensor>,
    output: Arc<dyn Tensor>,
}

impl CompareKernel {
    pub fn new(
        op: ComparisonOp,
        lhs: Arc<dyn Tensor>,
        rhs: Arc<dyn Tensor>,
        output: Arc<dyn Tensor>,
    ) -> Self {
        Self {
            op,
            lhs,
            rhs,
            output,
        }
    }
}

impl Function for CompareKernel {
    fn run(&mut self) -> ExecResult<()> {
        let lhs = read_f32(self.lhs.as_ref())?;
        let rhs = read_f32(self.rhs.as_ref())?;
        expect_same_len(lhs.len(), rhs.len())?;
        self.output
            .buffer()
            .ensure_allocated(self.output.byte_len());
        let mut out = self.output.buffer().write()?;
        if out.len() != lhs.len() {
            return Err(ExecError::invalid_io(format!(
                "compare output length mismatch: {} vs {}",
                out.len(),
                lhs.len()
            )));
        }
        for (slot, (a, b)) in out.iter_mut().zip(lhs.iter().zip(&rhs)) {
            let hit = match self.op {
                ComparisonOp::Less => a < b,
                ComparisonOp::LessEqual => a <= b,
                ComparisonOp::Equal => a == b,
                ComparisonOp::GreaterEqual => a >= b,
                ComparisonOp::Greater => a > b,
                ComparisonOp::NotEqual => a != b,
            };
            *slot = hit as u8;
        }
        Ok(())
    }
}

/// Naive NHWC convolution with an OHWI filter and optional bias.
pub struct Conv2dKernel {
    spec: Conv2dSpec,
    input: Arc<dyn Tensor>,
    filter: Arc<dyn Tensor>,
    bias: Option<Arc<dyn Tensor>>,
    output: Arc<dyn Tensor>,
}

impl Conv2dKernel {
    pub fn new(
        spec: Conv2dSpec,
        input: Arc<dyn Tensor>,
        filter: Arc<dyn Tensor>,
        bias: Option<Arc<dyn Tensor>>,
        output: Arc<dyn Tensor>,
    ) -> Self {
        Self {
            spec,
            input,
            filter,
            bias,
            output,
        }
    }
}

impl Function for Conv2dKernel {
    fn run(&mut self) -> ExecResult<()> {
        let in_dims = self.input.shape().dims().to_vec();
        let filter_dims = self.filter.shape().dims().to_vec();
        if in_dims.len() != 4 || filter_dims.len() != 4 {
            return Err(ExecError::invalid_io(
                "conv2d expects rank-4 input and filter",
            ));
        }
        let (batch, in_h, in_w, in_c) = (in_dims[0], in_dims[1], in_dims[2], in_dims[3]);
        let (out_c, k_h, k_w, f_in_c) = (
            filter_dims[0],
            filter_dims[1],
            filter_dims[2],
            filter_dims[3],
        );
        if f_in_c != in_c {
            return Err(ExecError::invalid_io(format!(
                "conv2d filter expects {f_in_c} input channels, input has {in_c}"
            )));
        }
        let [stride_h, stride_w] = self.spec.strides;
        let [pad_h, pad_w] = self.spec.padding;
        let out_h = (in_h + 2 * pad_h - k_h) / stride_h + 1;
        let out_w = (in_w + 2 * pad_w - k_w) / stride_w + 1;

        let input = read_f32(self.input.as_ref())?;
        let filter = read_f32(self.filter.as_ref())?;
        let bias = match &self.bias {
            Some(bias) => Some(read_f32(bias.as_ref())?),
            None => None,
        };

        let mut result = vec![0f32; batch * out_h * out_w * out_c];
        for b in 0..batch {
            for oy in 0..out_h {
                for ox in 0..out_w {
                    for oc in 0..out_c {
                        let mut acc = bias.as_ref().map(|bias| bias[oc]).unwrap_or(0.0);
                        for ky in 0..k_h {
                            for kx in 0..k_w {
                                let iy = (oy * stride_h + ky) as isize - pad_h as isize;
                                let ix = (ox * stride_w + kx) as isize - pad_w as isize;
                                if iy < 0 || ix < 0 || iy >= in_h as isize || ix >= in_w as isize {
                                    continue;
                                }
                                let (iy, ix) = (iy as usize, ix as usize);
                                for ic in 0..in_c {
                                    let in_at = ((b * in_h + iy) * in_w + ix) * in_c + ic;
                                    let f_at = ((oc * k_h + ky) * k_w + kx) * in_c + ic;
                                    acc += input[in_at] * filter[f_at];
                                }
                            }
                        }
                        result[((b * out_h + oy) * out_w + ox) * out_c + oc] = acc;
                    }
                }
            }
        }
        write_f32(self.output.as_ref(), &result)
    }
}

/// Concatenates along one axis; inputs and output share all other extents.
pub struct ConcatKernel {
    axis: usize,
    inputs: Vec<Arc<dyn Tensor>>,
    output: Arc<dyn Tensor>,
}

impl ConcatKernel {
    pub fn new(axis: usize, inputs: Vec<Arc<dyn Tensor>>, output: Arc<dyn Tensor>) -> Self {
        Self {
            axis,
            inputs,
            output,
        }
    }
}

impl Function for ConcatKernel {
    fn run(&mut self) -> ExecResult<()> {
        let out_dims = self.output.shape().dims().to_vec();
        if self.axis >= out_dims.len() {
            return Err(ExecError::invalid_io(format!(
                "concat axis {} out of range for rank {}",
                self.axis,
                out_dims.len()
            )));
        }
        let outer: usize = out_dims[..self.axis].iter().product();
        let inner: usize = out_dims[self.axis + 1..].iter().product();
        let out_axis = out_dims[self.axis];

        let mut slabs = Vec::with_capacity(self.inputs.len());
        for input in &self.inputs {
            let axis_len = input.shape().dim(self.axis);
            slabs.push((read_f32(input.as_ref())?, axis_len));
        }

        let mut result = vec![0f32; outer * out_axis * inner];
        for o in 0..outer {
            let mut out_offset = 0;
            for (values, axis_len) in &slabs {
                let take = axis_len * inner;
                let src_at = o * take;
                let dst_at = (o * out_axis + out_offset) * inner;
                result[dst_at..dst_at + take].copy_from_slice(&values[src_at..src_at + take]);
                out_offset += axis_len;
            }
        }
        write_f32(self.output.as_ref(), &result)
    }
}

/// Dense byte copy: reshape never moves data.
pub struct ReshapeKernel {
    input: Arc<dyn Tensor>,
    output: Arc<dyn Tensor>,
}

impl ReshapeKernel {
    pub fn new(input: Arc<dyn Tensor>, output: Arc<dyn Tensor>) -> Self {
        Self { input, output }
    }
}

impl Function for ReshapeKernel {
    fn run(&mut self) -> ExecResult<()> {
        let src = self.input.buffer().read()?;
        self.output
            .buffer()
            .ensure_allocated(self.output.byte_len());
        let mut dst = self.output.buffer().write()?;
        if src.len() != dst.len() {
            return Err(ExecError::invalid_io(format!(
                "reshape length mismatch: {} vs {}",
                src.len(),
                dst.len()
            )));
        }
        dst.copy_from_slice(&src);
        Ok(())
    }
}
