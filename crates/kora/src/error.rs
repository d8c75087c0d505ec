use thiserror::Error;

use crate::backend::BackendId;
use crate::ir::OperationIndex;

/// Failure raised while turning a lowered graph into an executor.
///
/// Construction errors are fatal: no partial executor is ever returned.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("partition error: {0}")]
    Partition(String),

    #[error("tensor error: {0}")]
    Tensor(String),

    #[error("kernel generation error: {0}")]
    KernelGen(String),

    #[error("operation '{op}' is not supported by backend '{backend}'")]
    UnsupportedOp { op: &'static str, backend: BackendId },
}

impl CompileError {
    pub fn config(message: impl Into<String>) -> Self {
        CompileError::Config(message.into())
    }

    pub fn partition(message: impl Into<String>) -> Self {
        CompileError::Partition(message.into())
    }

    pub fn tensor(message: impl Into<String>) -> Self {
        CompileError::Tensor(message.into())
    }

    pub fn kernel_gen(message: impl Into<String>) -> Self {
        CompileError::KernelGen(message.into())
    }

    pub fn unsupported_op(op: &'static str, backend: BackendId) -> Self {
        CompileError::UnsupportedOp { op, backend }
    }
}

/// Convenience alias for results produced during executor construction.
pub type CompileResult<T> = Result<T, CompileError>;

/// Failure raised while an executor is running.
///
/// The executor that produced the error is left in an unusable state and must
/// be discarded; there is no retry or silent recovery.
#[derive(Debug, Clone, Error)]
pub enum ExecError {
    #[error("kernel failure at operation {op} on backend '{backend}': {message}")]
    Kernel {
        op: OperationIndex,
        backend: BackendId,
        message: String,
    },

    #[error("invalid executor i/o: {0}")]
    InvalidIo(String),

    #[error("executor state error: {0}")]
    State(String),
}

impl ExecError {
    pub fn kernel(op: OperationIndex, backend: BackendId, message: impl Into<String>) -> Self {
        ExecError::Kernel {
            op,
            backend,
            message: message.into(),
        }
    }

    pub fn invalid_io(message: impl Into<String>) -> Self {
        ExecError::InvalidIo(message.into())
    }

    pub fn state(message: impl Into<String>) -> Self {
        ExecError::State(message.into())
    }
}

/// Convenience alias for results produced at run time.
pub type ExecResult<T> = Result<T, ExecError>;
