//! Backend-facing ABI: what a compute backend must provide for the compiler
//! to slice a lowered graph onto it and generate kernels from the slice.

pub mod builtin;
pub mod registry;
pub mod tensor_registry;

pub use tensor_registry::{TensorRegistries, TensorRegistry};

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{CompileError, CompileResult};
use crate::exec::FunctionSequence;
use crate::ir::{Graph, Layout, OperandIndex, OperationIndex};
use crate::tensor::Tensor;

/// Interned backend identity, cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BackendId(Arc<str>);

impl BackendId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::<str>::from(name.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackendId {
    fn from(name: &str) -> Self {
        BackendId::new(name)
    }
}

/// Static configuration of a backend.
pub trait BackendConfig: Send + Sync {
    fn id(&self) -> &str;

    /// Device barrier: returns once all work submitted so far has finished.
    /// Host-synchronous backends need no barrier.
    fn sync(&self) {}

    fn supports_permutation(&self) -> bool {
        false
    }

    fn supports_dynamic_tensor(&self) -> bool {
        false
    }
}

/// A pluggable execution target providing tensor allocation and kernel
/// generation for its slice of the graph.
pub trait Backend: Send + Sync {
    fn config(&self) -> Arc<dyn BackendConfig>;

    fn new_context(&self, data: ContextData) -> CompileResult<Box<dyn BackendContext>>;
}

/// Everything a backend receives about its slice of the lowered graph.
pub struct ContextData {
    /// This backend's partial graph: copies of its operations plus every
    /// operand they touch, under the whole graph's indices.
    pub graph: Graph,
    /// Operands referenced but not produced by this backend.
    pub external_operands: BTreeSet<OperandIndex>,
    /// Chosen layout per operand in the partial graph.
    pub operand_layouts: BTreeMap<OperandIndex, Layout>,
    /// Whole-graph topological order restricted to this backend's operations.
    pub op_order: Vec<OperationIndex>,
    pub is_linear_executor: bool,
    pub custom_kernel_builder: Option<Arc<dyn CustomKernelBuilder>>,
}

/// Per-backend compilation state, alive for the executor's lifetime.
pub trait BackendContext: Send + Sync {
    fn data(&self) -> &ContextData;

    fn tensor_registry(&self) -> &Arc<TensorRegistry>;

    /// Allocates native tensors for every operand this backend produces.
    fn gen_tensors(&mut self) -> CompileResult<()>;

    /// Materializes one function sequence per operation of the partial
    /// graph, in the partial graph's topological order.
    ///
    /// Must run after every backend's `gen_tensors` and after migrant wiring:
    /// generators may capture tensor objects by identity.
    fn gen_kernels(&mut self) -> CompileResult<Vec<(OperationIndex, FunctionSequence)>>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// All contexts of one compilation, keyed by backend identity.
pub type BackendContexts = BTreeMap<BackendId, Box<dyn BackendContext>>;

/// Inputs and outputs resolved for one custom-op kernel.
pub struct CustomKernelArgs {
    pub inputs: Vec<Arc<dyn Tensor>>,
    pub outputs: Vec<Arc<dyn Tensor>>,
}

/// Builds kernels for `custom` operations; supplied by the embedding
/// application through the graph.
pub trait CustomKernelBuilder: Send + Sync {
    fn build_kernel(
        &self,
        id: &str,
        args: CustomKernelArgs,
    ) -> CompileResult<Box<dyn crate::exec::Function>>;
}

/// The backends participating in one compilation, keyed by config id.
///
/// The builtin backend is always present: it owns graph-IO tensors and the
/// control-flow and permutation kernels.
pub struct BackendSet {
    backends: BTreeMap<BackendId, Arc<dyn Backend>>,
}

impl BackendSet {
    pub fn new() -> Self {
        let mut set = Self {
            backends: BTreeMap::new(),
        };
        set.register(Arc::new(builtin::BuiltinBackend::new()));
        set
    }

    /// Builds a set from globally registered backend names.
    pub fn from_registry(names: &[&str]) -> CompileResult<Self> {
        let mut set = Self::new();
        for name in names {
            let backend = registry::create_backend(name).ok_or_else(|| {
                CompileError::config(format!("backend '{name}' is not registered"))
            })?;
            set.register(backend);
        }
        Ok(set)
    }

    pub fn register(&mut self, backend: Arc<dyn Backend>) {
        let id = BackendId::new(backend.config().id());
        self.backends.insert(id, backend);
    }

    pub fn get(&self, id: &BackendId) -> Option<&Arc<dyn Backend>> {
        self.backends.get(id)
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.backends.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendId, &Arc<dyn Backend>)> {
        self.backends.iter()
    }

    pub fn ids(&self) -> Vec<BackendId> {
        self.backends.keys().cloned().collect()
    }
}

impl Default for BackendSet {
    fn default() -> Self {
        Self::new()
    }
}
