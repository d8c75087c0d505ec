use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::CompileError;
use crate::ir::SubgraphIndex;

/// Which scheduling strategy the produced executor uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutorKind {
    #[default]
    Linear,
    Dataflow,
    Parallel,
}

impl FromStr for ExecutorKind {
    type Err = CompileError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "Linear" => Ok(ExecutorKind::Linear),
            "Dataflow" => Ok(ExecutorKind::Dataflow),
            "Parallel" => Ok(ExecutorKind::Parallel),
            other => Err(CompileError::config(format!(
                "unsupported executor '{other}'"
            ))),
        }
    }
}

/// Attribution carried into trace events: which session and subgraph an
/// executed operation belonged to.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCtx {
    pub session: u32,
    pub subgraph: SubgraphIndex,
}

/// Options the compiler collaborator hands in alongside the lowered graph.
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub executor: ExecutorKind,
    /// Wraps every function sequence in a device barrier so observer
    /// timestamps bracket device work.
    pub he_profiling_mode: bool,
    /// Chrome-trace output path; `None` disables tracing.
    pub trace_filepath: Option<PathBuf>,
    /// Worker count for the parallel executor; defaults to the hardware
    /// concurrency when unset.
    pub parallel_workers: Option<NonZeroUsize>,
    pub tracing_ctx: TracingCtx,
}
