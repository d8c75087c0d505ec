//! Global backend registry for dynamic backend selection.
//!
//! Backends register a constructor under their config id; hosts then name
//! the backends they want per compilation without linking against concrete
//! backend types.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::backend::Backend;

/// Factory function that creates a new backend instance.
pub type BackendConstructor = Box<dyn Fn() -> Arc<dyn Backend> + Send + Sync>;

static GLOBAL_REGISTRY: Lazy<RwLock<HashMap<String, BackendConstructor>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a backend by name with a constructor function.
///
/// The constructor is called each time the backend is requested via
/// `create_backend`. External crates register their backends from an
/// initialization function.
pub fn register_backend<F>(name: impl Into<String>, constructor: F)
where
    F: Fn() -> Arc<dyn Backend> + Send + Sync + 'static,
{
    GLOBAL_REGISTRY
        .write()
        .expect("backend registry poisoned")
        .insert(name.into(), Box::new(constructor));
}

/// Create a backend instance by name; `None` if nothing is registered under
/// that name.
pub fn create_backend(name: &str) -> Option<Arc<dyn Backend>> {
    let registry = GLOBAL_REGISTRY.read().expect("backend registry poisoned");
    registry.get(name).map(|constructor| constructor())
}

/// List all registered backend names.
pub fn list_backends() -> Vec<String> {
    GLOBAL_REGISTRY
        .read()
        .expect("backend registry poisoned")
        .keys()
        .cloned()
        .collect()
}

/// Check if a backend with the given name is registered.
pub fn has_backend(name: &str) -> bool {
    GLOBAL_REGISTRY
        .read()
        .expect("backend registry poisoned")
        .contains_key(name)
}
