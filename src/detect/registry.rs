use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Registry of detector backends, keyed by backend name.
///
/// Backends are wrapped in `Mutex` because `DetectorBackend::detect` takes
/// `&mut self`; the frame loop holds one handle and locks it per frame.
pub struct BackendRegistry {
    backends: HashMap<String, Arc<Mutex<dyn DetectorBackend>>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Arc::new(Mutex::new(backend)));
    }

    /// Set the default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!(
                "backend '{}' not registered (available: {})",
                name,
                self.list().join(", ")
            ));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.backends.get(name).cloned()
    }

    pub fn default_backend(&self) -> Option<Arc<Mutex<dyn DetectorBackend>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// Registered backend names, sorted for stable reporting.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.backends.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::backends::{MotionBackend, SyntheticBackend};

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        registry.register(SyntheticBackend::new());
        registry.register(MotionBackend::new());

        let backend = registry.default_backend().expect("default backend");
        assert_eq!(backend.lock().unwrap().name(), "synthetic");
    }

    #[test]
    fn set_default_switches_and_rejects_unknown() {
        let mut registry = BackendRegistry::new();
        registry.register(SyntheticBackend::new());
        registry.register(MotionBackend::new());

        registry.set_default("motion").unwrap();
        let backend = registry.default_backend().expect("default backend");
        assert_eq!(backend.lock().unwrap().name(), "motion");

        assert!(registry.set_default("onnx").is_err());
    }

    #[test]
    fn list_is_sorted() {
        let mut registry = BackendRegistry::new();
        registry.register(SyntheticBackend::new());
        registry.register(MotionBackend::new());
        assert_eq!(registry.list(), vec!["motion", "synthetic"]);
    }
}
