use std::sync::Arc;

use crate::backend::BackendConfig;
use crate::error::ExecResult;
use crate::tensor::Tensor;

/// One callable unit of an operation's materialized code.
pub trait Function: Send {
    fn run(&mut self) -> ExecResult<()>;
}

/// Ordered list of callable units materializing one operation.
#[derive(Default)]
pub struct FunctionSequence {
    functions: Vec<Box<dyn Function>>,
}

impl FunctionSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_function(function: Box<dyn Function>) -> Self {
        Self {
            functions: vec![function],
        }
    }

    pub fn append(&mut self, function: Box<dyn Function>) {
        self.functions.push(function);
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn run(&mut self) -> ExecResult<()> {
        for function in &mut self.functions {
            function.run()?;
        }
        Ok(())
    }

    /// Replaces the sequence with a single `SyncFunction` wrapping it, so a
    /// backend barrier completes before control returns from the operation.
    pub fn wrap_sync(&mut self, config: Arc<dyn BackendConfig>) {
        let inner = std::mem::take(self);
        self.functions.push(Box::new(SyncFunction { inner, config }));
    }
}

/// Runs the wrapped sequence, then waits on the backend's device barrier.
/// Profiling timestamps taken after this bracket the device work.
pub struct SyncFunction {
    inner: FunctionSequence,
    config: Arc<dyn BackendConfig>,
}

impl Function for SyncFunction {
    fn run(&mut self) -> ExecResult<()> {
        self.inner.run()?;
        self.config.sync();
        Ok(())
    }
}

/// Releases dynamic tensor buffers after the final use of each listed
/// tensor. Static buffers live for the executor's lifetime and are skipped.
pub struct DeallocFunction {
    dealloc_list: Vec<Arc<dyn Tensor>>,
}

impl DeallocFunction {
    pub fn new(dealloc_list: Vec<Arc<dyn Tensor>>) -> Self {
        Self { dealloc_list }
    }
}

impl Function for DeallocFunction {
    fn run(&mut self) -> ExecResult<()> {
        for tensor in &self.dealloc_list {
            if !tensor.is_dynamic() {
                continue;
            }
            tensor.buffer().release();
        }
        Ok(())
    }
}
