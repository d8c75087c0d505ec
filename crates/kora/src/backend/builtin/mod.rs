//! The builtin backend: owner of graph-IO boundary tensors and of the
//! kernels that cross backend boundaries (permute) or subgraph boundaries
//! (if/while).

pub mod context;
pub mod io_tensor;
pub mod kernel;

pub use context::BuiltinContext;
pub use io_tensor::IoTensor;

use std::sync::Arc;

use crate::backend::{Backend, BackendConfig, BackendContext, ContextData};
use crate::error::CompileResult;

/// Registry id of the builtin backend.
pub const CONFIG_ID: &str = "builtin";

pub struct BuiltinConfig;

impl BackendConfig for BuiltinConfig {
    fn id(&self) -> &str {
        CONFIG_ID
    }

    fn supports_permutation(&self) -> bool {
        true
    }

    fn supports_dynamic_tensor(&self) -> bool {
        true
    }
}

pub struct BuiltinBackend {
    config: Arc<BuiltinConfig>,
}

impl BuiltinBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(BuiltinConfig),
        }
    }
}

impl Default for BuiltinBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for BuiltinBackend {
    fn config(&self) -> Arc<dyn BackendConfig> {
        Arc::clone(&self.config) as Arc<dyn BackendConfig>
    }

    fn new_context(&self, data: ContextData) -> CompileResult<Box<dyn BackendContext>> {
        Ok(Box::new(BuiltinContext::new(data)))
    }
}
