pub mod backend;
pub mod context;
pub mod kernels;
pub mod tensor;

pub use backend::{CpuBackend, CpuConfig};
pub use tensor::CpuTensor;

use std::sync::Arc;

/// Register the CPU backend with the global backend registry under "cpu".
pub fn register_cpu_backend() {
    kora::backend::registry::register_backend("cpu", || {
        Arc::new(CpuBackend::new()) as Arc<dyn kora::backend::Backend>
    });
}
