use std::sync::Arc;
use std::time::Duration;

use kora::backend::{Backend, BackendConfig, BackendContext, ContextData};
use kora::error::CompileResult;
use kora_backend_ref_cpu::CpuBackend;

struct DelayConfig {
    id: String,
    delay: Duration,
}

impl BackendConfig for DelayConfig {
    fn id(&self) -> &str {
        &self.id
    }

    fn sync(&self) {
        std::thread::sleep(self.delay);
    }

    fn supports_dynamic_tensor(&self) -> bool {
        true
    }
}

/// CPU backend whose device barrier takes a fixed amount of time.
///
/// Profiling-mode tests use it to check that measured per-operation times
/// include the barrier: with a 5 ms delay, every recorded duration must be
/// at least 5 ms.
pub struct DelaySyncBackend {
    config: Arc<DelayConfig>,
    inner: CpuBackend,
}

impl DelaySyncBackend {
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        let id = id.into();
        Self {
            config: Arc::new(DelayConfig {
                id: id.clone(),
                delay,
            }),
            inner: CpuBackend::named(id),
        }
    }
}

impl Backend for DelaySyncBackend {
    fn config(&self) -> Arc<dyn BackendConfig> {
        Arc::clone(&self.config) as Arc<dyn BackendConfig>
    }

    fn new_context(&self, data: ContextData) -> CompileResult<Box<dyn BackendContext>> {
        self.inner.new_context(data)
    }
}
