//! Name → constructor table for sequencer backends.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::backend::Backend;

/// Arguments handed to a backend constructor.
#[derive(Debug, Clone, Copy)]
pub struct BackendArgs<'a> {
    /// Provider the new instance will belong to.
    pub provider_id: u16,
    /// Parsed sequencer configuration; always a JSON object.
    pub config: &'a Value,
}

/// Constructor signature shared by `create` and `open`.
pub type BackendCtor =
    Arc<dyn Fn(&BackendArgs<'_>) -> anyhow::Result<Box<dyn Backend>> + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("Unknown sequencer type {0}")]
    UnknownType(String),
    #[error("Failed to construct sequencer of type {backend}: {source:#}")]
    Construction {
        backend: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Clone)]
struct Ctors {
    create: BackendCtor,
    open: BackendCtor,
}

/// Registry of backend types, filled once at startup.
///
/// After startup the factory is shared behind an `Arc` and never mutated again,
/// so lookups need no locking.
#[derive(Clone, Default)]
pub struct BackendFactory {
    types: HashMap<String, Ctors>,
}

impl fmt::Debug for BackendFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendFactory")
            .field("types", &self.backend_types())
            .finish()
    }
}

impl BackendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `create`/`open` constructors under `type_name`.
    ///
    /// Registering a name twice replaces the earlier pair.
    pub fn register<C, O>(&mut self, type_name: impl Into<String>, create: C, open: O)
    where
        C: Fn(&BackendArgs<'_>) -> anyhow::Result<Box<dyn Backend>> + Send + Sync + 'static,
        O: Fn(&BackendArgs<'_>) -> anyhow::Result<Box<dyn Backend>> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        let ctors = Ctors {
            create: Arc::new(create),
            open: Arc::new(open),
        };
        if self.types.insert(type_name.clone(), ctors).is_some() {
            tracing::warn!(sequencer_type = %type_name, "Backend type re-registered, replacing previous constructors");
        } else {
            tracing::debug!(sequencer_type = %type_name, "Registered backend type");
        }
    }

    pub fn create(
        &self,
        type_name: &str,
        args: &BackendArgs<'_>,
    ) -> Result<Box<dyn Backend>, FactoryError> {
        let ctors = self.lookup(type_name)?;
        Self::construct(type_name, &ctors.create, args)
    }

    pub fn open(
        &self,
        type_name: &str,
        args: &BackendArgs<'_>,
    ) -> Result<Box<dyn Backend>, FactoryError> {
        let ctors = self.lookup(type_name)?;
        Self::construct(type_name, &ctors.open, args)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn backend_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn lookup(&self, type_name: &str) -> Result<&Ctors, FactoryError> {
        self.types
            .get(type_name)
            .ok_or_else(|| FactoryError::UnknownType(type_name.to_string()))
    }

    fn construct(
        type_name: &str,
        ctor: &BackendCtor,
        args: &BackendArgs<'_>,
    ) -> Result<Box<dyn Backend>, FactoryError> {
        ctor(args).map_err(|source| FactoryError::Construction {
            backend: type_name.to_string(),
            source,
        })
    }
}
