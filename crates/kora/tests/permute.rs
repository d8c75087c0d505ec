use std::sync::Arc;

use kora::backend::builtin::kernel::PermuteKernel;
use kora::exec::Function;
use kora::ir::{DType, Layout, OperandInfo, PermuteType, Shape};
use kora::tensor::{read_f32, write_f32, HostTensor, Tensor};

fn host_tensor(dims: Vec<usize>, layout: Layout) -> Arc<HostTensor> {
    Arc::new(HostTensor::new(
        OperandInfo::new(DType::F32, Shape::new(dims)),
        layout,
    ))
}

#[test]
fn nhwc_to_nchw_reorders_channels() {
    let input = host_tensor(vec![1, 2, 2, 2], Layout::Nhwc);
    let output = host_tensor(vec![1, 2, 2, 2], Layout::Nchw);
    // value(h, w, c) = h*4 + w*2 + c
    write_f32(
        input.as_ref(),
        &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
    )
    .unwrap();

    let mut kernel = PermuteKernel::new(
        Arc::clone(&input) as Arc<dyn Tensor>,
        Arc::clone(&output) as Arc<dyn Tensor>,
        PermuteType::NhwcToNchw,
    );
    kernel.run().unwrap();

    let result = read_f32(output.as_ref()).unwrap();
    assert_eq!(result, vec![0.0, 2.0, 4.0, 6.0, 1.0, 3.0, 5.0, 7.0]);
}

#[test]
fn nchw_to_nhwc_is_the_inverse() {
    let input = host_tensor(vec![1, 2, 2, 2], Layout::Nchw);
    let output = host_tensor(vec![1, 2, 2, 2], Layout::Nhwc);
    write_f32(
        input.as_ref(),
        &[0.0, 2.0, 4.0, 6.0, 1.0, 3.0, 5.0, 7.0],
    )
    .unwrap();

    let mut kernel = PermuteKernel::new(
        Arc::clone(&input) as Arc<dyn Tensor>,
        Arc::clone(&output) as Arc<dyn Tensor>,
        PermuteType::NchwToNhwc,
    );
    kernel.run().unwrap();

    let result = read_f32(output.as_ref()).unwrap();
    assert_eq!(
        result,
        vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
    );
}

#[test]
fn low_rank_tensors_are_copied_verbatim() {
    let input = host_tensor(vec![3], Layout::Nhwc);
    let output = host_tensor(vec![3], Layout::Nchw);
    write_f32(input.as_ref(), &[1.0, 2.0, 3.0]).unwrap();

    let mut kernel = PermuteKernel::new(
        Arc::clone(&input) as Arc<dyn Tensor>,
        Arc::clone(&output) as Arc<dyn Tensor>,
        PermuteType::NhwcToNchw,
    );
    kernel.run().unwrap();

    assert_eq!(read_f32(output.as_ref()).unwrap(), vec![1.0, 2.0, 3.0]);
}
