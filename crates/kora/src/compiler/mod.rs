pub mod executor_factory;
pub mod linear;
pub mod liveness;
pub mod lowered_graph;
pub mod options;
pub mod partition;

pub use executor_factory::create_executor;
pub use lowered_graph::{DefFactor, LoweredGraph, OperandLowerInfo, OperationLowerInfo};
pub use options::{CompilerOptions, ExecutorKind, TracingCtx};
