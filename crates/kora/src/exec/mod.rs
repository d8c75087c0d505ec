pub mod base;
pub mod dataflow;
pub mod exec_time;
pub mod function;
pub mod linear;
pub mod observers;
pub mod parallel;

pub use function::{DeallocFunction, Function, FunctionSequence, SyncFunction};
pub use linear::LinearExecutor;
pub use observers::{ExecutionObserver, ProfileObserver, TracingObserver};

use std::collections::BTreeMap;
use std::sync::{Mutex, RwLock};

use crate::backend::BackendId;
use crate::error::{ExecError, ExecResult};
use crate::ir::{Graph, OperationIndex, SubgraphIndex};

/// Identity of one scheduled operation, shown to observers.
#[derive(Clone)]
pub struct JobMeta {
    pub op_index: OperationIndex,
    pub op_name: &'static str,
    pub backend: BackendId,
}

/// An operation's materialized code plus its identity.
pub struct CodeEntry {
    pub meta: JobMeta,
    pub fn_seq: FunctionSequence,
}

/// All generated code of one subgraph, keyed by operation index.
pub type CodeMap = BTreeMap<OperationIndex, CodeEntry>;

/// The runtime object driving function sequences under a scheduling policy.
pub trait Executor: Send {
    /// The graph this executor was built from, for observer attribution.
    fn graph(&self) -> &Graph;

    /// Blocks until every operation has run or a kernel fails. A failure
    /// leaves the executor unusable; it must be discarded.
    fn run(&mut self) -> ExecResult<()>;

    fn add_observer(&mut self, observer: Box<dyn observers::ExecutionObserver>);

    /// Copies `data` into the IO tensor of the given graph input.
    fn set_input(&mut self, io_index: usize, data: &[u8]) -> ExecResult<()>;

    /// Copies the IO tensor of the given graph output out.
    fn get_output(&self, io_index: usize) -> ExecResult<Vec<u8>>;
}

/// Shared mapping from subgraph to executor, used by control-flow kernels to
/// dispatch into nested subgraphs.
///
/// Entries are installed bottom-up before execution begins and never mutated
/// afterwards; kernels hold a non-owning view to avoid ownership cycles
/// through the builtin kernel generator.
pub struct ExecutorMap {
    entries: RwLock<BTreeMap<SubgraphIndex, Mutex<Box<dyn Executor>>>>,
}

impl ExecutorMap {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn insert(&self, index: SubgraphIndex, executor: Box<dyn Executor>) {
        self.entries
            .write()
            .expect("executor map poisoned")
            .insert(index, Mutex::new(executor));
    }

    pub fn contains(&self, index: SubgraphIndex) -> bool {
        self.entries
            .read()
            .expect("executor map poisoned")
            .contains_key(&index)
    }

    /// Runs `f` with exclusive access to the executor of `index`.
    pub fn with_executor<R>(
        &self,
        index: SubgraphIndex,
        f: impl FnOnce(&mut dyn Executor) -> ExecResult<R>,
    ) -> ExecResult<R> {
        let entries = self.entries.read().expect("executor map poisoned");
        let executor = entries
            .get(&index)
            .ok_or_else(|| ExecError::state(format!("no executor for subgraph {index}")))?;
        let mut executor = executor.lock().expect("executor map entry poisoned");
        f(&mut **executor)
    }
}

impl Default for ExecutorMap {
    fn default() -> Self {
        Self::new()
    }
}
