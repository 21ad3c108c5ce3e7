use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::backend::DetectorBackend;

/// Registry of detector backends, keyed by `DetectorBackend::name`.
///
/// The playback loop owns exactly one backend; `select` moves it out.
pub struct BackendRegistry {
    backends: BTreeMap<String, Box<dyn DetectorBackend>>,
    default_name: Option<String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: BTreeMap::new(),
            default_name: None,
        }
    }

    /// Register a backend. The first registered backend becomes the default.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.backends.insert(name, Box::new(backend));
    }

    /// Set default backend by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.backends.contains_key(name) {
            return Err(anyhow!("backend '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    /// Take the named backend, or the default when `name` is `None`.
    pub fn select(mut self, name: Option<&str>) -> Result<Box<dyn DetectorBackend>> {
        let name = match name.or(self.default_name.as_deref()) {
            Some(name) => name.to_string(),
            None => return Err(anyhow!("no detector backends registered")),
        };
        let available = self.list().join(", ");
        self.backends
            .remove(&name)
            .ok_or_else(|| anyhow!("backend '{}' not registered (available: {})", name, available))
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
    use crate::detect::backends::{ScriptedBackend, StubBackend};

    #[test]
    fn first_registered_backend_is_default() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        registry.register(ScriptedBackend::new());
        assert_eq!(registry.list(), vec!["scripted", "stub"]);

        let backend = registry.select(None)?;
        assert_eq!(backend.name(), "stub");
        Ok(())
    }

    #[test]
    fn select_by_name_and_default_override() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        registry.register(ScriptedBackend::new());
        registry.set_default("scripted")?;
        assert!(registry.set_default("missing").is_err());
        assert_eq!(registry.select(None)?.name(), "scripted");
        Ok(())
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::new());
        let err = registry.select(Some("tract")).err().expect("missing backend");
        assert!(err.to_string().contains("available: stub"));
    }
}
