use std::sync::Arc;

use kora::backend::{Backend, BackendConfig, BackendContext, ContextData};
use kora::error::CompileResult;

use crate::context::CpuBackendContext;

/// Host-synchronous configuration; there is no device queue to flush, so
/// the barrier is a no-op.
pub struct CpuConfig {
    id: String,
}

impl BackendConfig for CpuConfig {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_dynamic_tensor(&self) -> bool {
        true
    }
}

/// Reference CPU backend: portable host tensors plus naive f32 kernels.
pub struct CpuBackend {
    config: Arc<CpuConfig>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::named("cpu")
    }

    /// A second instance under a different id stands in for an accelerator
    /// in multi-backend setups.
    pub fn named(id: impl Into<String>) -> Self {
        Self {
            config: Arc::new(CpuConfig { id: id.into() }),
        }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpuBackend {
    fn config(&self) -> Arc<dyn BackendConfig> {
        Arc::clone(&self.config) as Arc<dyn BackendConfig>
    }

    fn new_context(&self, data: ContextData) -> CompileResult<Box<dyn BackendContext>> {
        let id = kora::backend::BackendId::new(self.config.id());
        Ok(Box::new(CpuBackendContext::new(id, data)))
    }
}
