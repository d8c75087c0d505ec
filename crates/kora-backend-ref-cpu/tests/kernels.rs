use std::sync::Arc;

use kora::exec::Function;
use kora::ir::{
    ComparisonOp, Conv2dSpec, DType, ElementwiseBinaryOp, Layout, OperandInfo, Shape,
};
use kora::tensor::{read_f32, write_f32, Tensor};
use kora_backend_ref_cpu::kernels::{BinaryKernel, CompareKernel, ConcatKernel, Conv2dKernel};
use kora_backend_ref_cpu::CpuTensor;

fn f32_tensor(dims: Vec<usize>, values: &[f32]) -> Arc<CpuTensor> {
    let tensor = Arc::new(CpuTensor::new(
        OperandInfo::new(DType::F32, Shape::new(dims)),
        Layout::Nhwc,
    ));
    write_f32(tensor.as_ref(), values).unwrap();
    tensor
}

fn empty_f32(dims: Vec<usize>) -> Arc<CpuTensor> {
    Arc::new(CpuTensor::new(
        OperandInfo::new(DType::F32, Shape::new(dims)),
        Layout::Nhwc,
    ))
}

#[test]
fn add_is_elementwise() {
    let lhs = f32_tensor(vec![4], &[1.0, 2.0, 3.0, 4.0]);
    let rhs = f32_tensor(vec![4], &[10.0, 20.0, 30.0, 40.0]);
    let out = empty_f32(vec![4]);
    let mut kernel = BinaryKernel::new(
        ElementwiseBinaryOp::Add,
        lhs as Arc<dyn Tensor>,
        rhs as Arc<dyn Tensor>,
        Arc::clone(&out) as Arc<dyn Tensor>,
    );
    kernel.run().unwrap();
    assert_eq!(
        read_f32(out.as_ref()).unwrap(),
        vec![11.0, 22.0, 33.0, 44.0]
    );
}

#[test]
fn mismatched_operand_lengths_are_rejected() {
    let lhs = f32_tensor(vec![4], &[1.0, 2.0, 3.0, 4.0]);
    let rhs = f32_tensor(vec![2], &[1.0, 2.0]);
    let out = empty_f32(vec![4]);
    let mut kernel = BinaryKernel::new(
        ElementwiseBinaryOp::Mul,
        lhs as Arc<dyn Tensor>,
        rhs as Arc<dyn Tensor>,
        out as Arc<dyn Tensor>,
    );
    assert!(kernel.run().is_err());
}

#[test]
fn valid_padding_convolution_matches_hand_computation() {
    // 3x3 single-channel input, 2x2 all-ones filter, no padding:
    // each output is the sum of a 2x2 window.
    let input = f32_tensor(
        vec![1, 3, 3, 1],
        &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
    );
    let filter = f32_tensor(vec![1, 2, 2, 1], &[1.0; 4]);
    let out = empty_f32(vec![1, 2, 2, 1]);
    let mut kernel = Conv2dKernel::new(
        Conv2dSpec {
            strides: [1, 1],
            padding: [0, 0],
        },
        input as Arc<dyn Tensor>,
        filter as Arc<dyn Tensor>,
        None,
        Arc::clone(&out) as Arc<dyn Tensor>,
    );
    kernel.run().unwrap();
    assert_eq!(
        read_f32(out.as_ref()).unwrap(),
        vec![12.0, 16.0, 24.0, 28.0]
    );
}

#[test]
fn bias_is_added_per_output_channel() {
    let input = f32_tensor(vec![1, 2, 2, 1], &[1.0, 1.0, 1.0, 1.0]);
    let filter = f32_tensor(vec![2, 1, 1, 1], &[1.0, 2.0]);
    let bias = f32_tensor(vec![2], &[0.5, -0.5]);
    let out = empty_f32(vec![1, 2, 2, 2]);
    let mut kernel = Conv2dKernel::new(
        Conv2dSpec {
            strides: [1, 1],
            padding: [0, 0],
        },
        input as Arc<dyn Tensor>,
        filter as Arc<dyn Tensor>,
        Some(bias as Arc<dyn Tensor>),
        Arc::clone(&out) as Arc<dyn Tensor>,
    );
    kernel.run().unwrap();
    assert_eq!(
        read_f32(out.as_ref()).unwrap(),
        vec![1.5, 1.5, 1.5, 1.5, 1.5, 1.5, 1.5, 1.5]
    );
}

#[test]
fn concat_joins_along_the_leading_axis() {
    let first = f32_tensor(vec![2, 2], &[1.0, 2.0, 3.0, 4.0]);
    let second = f32_tensor(vec![1, 2], &[5.0, 6.0]);
    let out = empty_f32(vec![3, 2]);
    let mut kernel = ConcatKernel::new(
        0,
        vec![first as Arc<dyn Tensor>, second as Arc<dyn Tensor>],
        Arc::clone(&out) as Arc<dyn Tensor>,
    );
    kernel.run().unwrap();
    assert_eq!(
        read_f32(out.as_ref()).unwrap(),
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]
    );
}

#[test]
fn concat_joins_along_an_inner_axis() {
    let first = f32_tensor(vec![2, 1], &[1.0, 2.0]);
    let second = f32_tensor(vec![2, 2], &[3.0, 4.0, 5.0, 6.0]);
    let out = empty_f32(vec![2, 3]);
    let mut kernel = ConcatKernel::new(
        1,
        vec![first as Arc<dyn Tensor>, second as Arc<dyn Tensor>],
        Arc::clone(&out) as Arc<dyn Tensor>,
    );
    kernel.run().unwrap();
    assert_eq!(
        read_f32(out.as_ref()).unwrap(),
        vec![1.0, 3.0, 4.0, 2.0, 5.0, 6.0]
    );
}

#[test]
fn compare_writes_boolean_bytes() {
    let lhs = f32_tensor(vec![3], &[1.0, 5.0, 2.0]);
    let rhs = f32_tensor(vec![3], &[2.0, 2.0, 2.0]);
    let out = Arc::new(CpuTensor::new(
        OperandInfo::new(DType::Bool, Shape::new(vec![3])),
        Layout::Nhwc,
    ));
    let mut kernel = CompareKernel::new(
        ComparisonOp::Less,
        lhs as Arc<dyn Tensor>,
        rhs as Arc<dyn Tensor>,
        Arc::clone(&out) as Arc<dyn Tensor>,
    );
    kernel.run().unwrap();
    let bytes = out.buffer().to_vec().unwrap();
    assert_eq!(bytes, vec![1, 0, 0]);
}
