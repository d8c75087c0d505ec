use std::sync::{Arc, Mutex};

use kora::backend::BackendConfig;
use kora::exec::{DeallocFunction, Function, FunctionSequence};
use kora::ir::{DType, Layout, OperandInfo, Shape};
use kora::tensor::{HostTensor, Tensor};

#[derive(Clone, Default)]
struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, tag: &'static str) {
        self.0.lock().unwrap().push(tag);
    }

    fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }
}

struct LoggingConfig {
    log: CallLog,
}

impl BackendConfig for LoggingConfig {
    fn id(&self) -> &str {
        "logging"
    }

    fn sync(&self) {
        self.log.push("sync");
    }
}

struct LoggingFunction {
    log: CallLog,
}

impl Function for LoggingFunction {
    fn run(&mut self) -> kora::ExecResult<()> {
        self.log.push("kernel");
        Ok(())
    }
}

#[test]
fn sync_wrapper_runs_the_barrier_after_the_kernel() {
    let log = CallLog::default();
    let mut fn_seq = FunctionSequence::new();
    fn_seq.append(Box::new(LoggingFunction { log: log.clone() }));
    fn_seq.wrap_sync(Arc::new(LoggingConfig { log: log.clone() }));

    fn_seq.run().unwrap();
    assert_eq!(log.calls(), vec!["kernel", "sync"]);

    // The wrapper is re-runnable like any other function sequence.
    fn_seq.run().unwrap();
    assert_eq!(log.calls(), vec!["kernel", "sync", "kernel", "sync"]);
}

#[test]
fn dealloc_releases_only_dynamic_buffers() {
    let static_tensor = Arc::new(HostTensor::new(
        OperandInfo::new(DType::F32, Shape::new(vec![4])),
        Layout::Nhwc,
    ));
    let dynamic_tensor = Arc::new(HostTensor::new(
        OperandInfo::new(DType::F32, Shape::new(vec![4])).dynamic(),
        Layout::Nhwc,
    ));
    dynamic_tensor.buffer().ensure_allocated(16);
    assert!(dynamic_tensor.buffer().is_allocated());

    let mut dealloc = DeallocFunction::new(vec![
        Arc::clone(&static_tensor) as Arc<dyn Tensor>,
        Arc::clone(&dynamic_tensor) as Arc<dyn Tensor>,
    ]);
    dealloc.run().unwrap();

    assert!(static_tensor.buffer().is_allocated());
    assert!(!dynamic_tensor.buffer().is_allocated());
}
