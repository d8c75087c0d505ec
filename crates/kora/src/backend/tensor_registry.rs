use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::backend::builtin::IoTensor;
use crate::backend::{BackendContexts, BackendId};
use crate::error::{CompileError, CompileResult};
use crate::ir::OperandIndex;
use crate::tensor::Tensor;

/// One backend's view of the runtime tensors, keyed by operand index.
///
/// Three disjoint groups: boundary IO tensors (builtin registry only),
/// native tensors owned by this backend, and read-only migrants aliasing
/// another backend's natives. An operand index resolves to at most one
/// tensor per registry.
pub struct TensorRegistry {
    io: RwLock<BTreeMap<OperandIndex, Arc<IoTensor>>>,
    native: RwLock<BTreeMap<OperandIndex, Arc<dyn Tensor>>>,
    migrant: RwLock<BTreeMap<OperandIndex, Arc<dyn Tensor>>>,
}

impl TensorRegistry {
    pub fn new() -> Self {
        Self {
            io: RwLock::new(BTreeMap::new()),
            native: RwLock::new(BTreeMap::new()),
            migrant: RwLock::new(BTreeMap::new()),
        }
    }

    /// Resolves an operand to whichever tensor this registry knows for it.
    pub fn get(&self, index: OperandIndex) -> Option<Arc<dyn Tensor>> {
        if let Some(tensor) = self.io.read().expect("registry lock poisoned").get(&index) {
            return Some(Arc::clone(tensor) as Arc<dyn Tensor>);
        }
        if let Some(tensor) = self
            .native
            .read()
            .expect("registry lock poisoned")
            .get(&index)
        {
            return Some(Arc::clone(tensor));
        }
        self.migrant
            .read()
            .expect("registry lock poisoned")
            .get(&index)
            .cloned()
    }

    /// Resolves an operand to a tensor this registry owns (IO or native).
    pub fn get_own(&self, index: OperandIndex) -> Option<Arc<dyn Tensor>> {
        if let Some(tensor) = self.io.read().expect("registry lock poisoned").get(&index) {
            return Some(Arc::clone(tensor) as Arc<dyn Tensor>);
        }
        self.native
            .read()
            .expect("registry lock poisoned")
            .get(&index)
            .cloned()
    }

    pub fn io_tensor(&self, index: OperandIndex) -> Option<Arc<IoTensor>> {
        self.io
            .read()
            .expect("registry lock poisoned")
            .get(&index)
            .cloned()
    }

    pub fn set_native_tensor(
        &self,
        index: OperandIndex,
        tensor: Arc<dyn Tensor>,
    ) -> CompileResult<()> {
        let mut native = self.native.write().expect("registry lock poisoned");
        if native.contains_key(&index) {
            return Err(CompileError::tensor(format!(
                "native tensor for operand {index} registered twice"
            )));
        }
        native.insert(index, tensor);
        Ok(())
    }

    /// Registers a read-only alias of another backend's native tensor.
    pub fn set_migrant_tensor(
        &self,
        index: OperandIndex,
        tensor: Arc<dyn Tensor>,
    ) -> CompileResult<()> {
        let mut migrant = self.migrant.write().expect("registry lock poisoned");
        if migrant.contains_key(&index) {
            return Err(CompileError::tensor(format!(
                "migrant tensor for operand {index} registered twice"
            )));
        }
        migrant.insert(index, tensor);
        Ok(())
    }

    /// Installs a graph-IO boundary tensor. Builtin registry only.
    pub fn set_native_io_tensor(
        &self,
        index: OperandIndex,
        tensor: Arc<IoTensor>,
    ) -> CompileResult<()> {
        let mut io = self.io.write().expect("registry lock poisoned");
        if io.contains_key(&index) {
            return Err(CompileError::tensor(format!(
                "io tensor for operand {index} registered twice"
            )));
        }
        io.insert(index, tensor);
        Ok(())
    }
}

impl Default for TensorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Union view over every backend's registry, used wherever a tensor must be
/// found regardless of which backend owns it.
#[derive(Clone)]
pub struct TensorRegistries {
    registries: BTreeMap<BackendId, Arc<TensorRegistry>>,
    builtin: Option<Arc<TensorRegistry>>,
}

impl TensorRegistries {
    pub fn new(contexts: &BackendContexts) -> Self {
        let mut registries = BTreeMap::new();
        let mut builtin = None;
        for (id, context) in contexts {
            let registry = Arc::clone(context.tensor_registry());
            if id.as_str() == crate::backend::builtin::CONFIG_ID {
                builtin = Some(Arc::clone(&registry));
            }
            registries.insert(id.clone(), registry);
        }
        Self {
            registries,
            builtin,
        }
    }

    /// The builtin backend's registry; required for graph-IO wiring.
    pub fn builtin(&self) -> CompileResult<&Arc<TensorRegistry>> {
        self.builtin
            .as_ref()
            .ok_or_else(|| CompileError::config("builtin backend registry is missing"))
    }

    pub fn registry(&self, id: &BackendId) -> Option<&Arc<TensorRegistry>> {
        self.registries.get(id)
    }

    /// Resolves an operand across the union of all registries, preferring
    /// owned tensors over migrant aliases.
    pub fn get(&self, index: OperandIndex) -> Option<Arc<dyn Tensor>> {
        for registry in self.registries.values() {
            if let Some(tensor) = registry.get_own(index) {
                return Some(tensor);
            }
        }
        for registry in self.registries.values() {
            if let Some(tensor) = registry.get(index) {
                return Some(tensor);
            }
        }
        None
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendId, &Arc<TensorRegistry>)> {
        self.registries.iter()
    }
}
