//! Registry of the models a fixture may name.
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{LoaddataError, Result};
use crate::model::{FieldDescriptor, ModelDescriptor};

pub trait ModelRegistry {
    /// Resolves a record's model label to its descriptor.
    fn resolve(&self, label: &str) -> Option<Arc<ModelDescriptor>>;
    fn field_descriptors<'m>(&self, model: &'m ModelDescriptor) -> &'m [FieldDescriptor] {
        model.fields()
    }
}

/// Layout of a schema file: `{"models": [{"app_label": ..., "kind": ..., "fields": [...]}]}`.
#[derive(Deserialize)]
struct Schema {
    models: Vec<ModelDescriptor>,
}

#[derive(Debug, Default)]
pub struct Registry {
    // keyed by lowercased `app_label.Kind`
    labels: HashMap<String, Arc<ModelDescriptor>>,
    // keyed by lowercased kind; more than one entry means bare kinds are ambiguous
    kinds: HashMap<String, Vec<Arc<ModelDescriptor>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn from_schema<R: Read>(reader: R) -> Result<Self> {
        let schema: Schema = serde_json::from_reader(reader)?;
        let mut registry = Self::new();
        for descriptor in schema.models {
            registry.register(descriptor.validated()?)?;
        }
        Ok(registry)
    }
    pub fn register(&mut self, descriptor: ModelDescriptor) -> Result<Arc<ModelDescriptor>> {
        let label = descriptor.label().to_lowercase();
        if self.labels.contains_key(&label) {
            return Err(LoaddataError::Schema(format!(
                "model {} is registered twice",
                descriptor.label()
            )));
        }
        let descriptor = Arc::new(descriptor);
        debug!(model = %descriptor.label(), fields = descriptor.fields().len(), "registered model");
        self.kinds
            .entry(descriptor.kind().to_lowercase())
            .or_default()
            .push(Arc::clone(&descriptor));
        self.labels.insert(label, Arc::clone(&descriptor));
        Ok(descriptor)
    }
    /// The descriptor for stored entities of exactly this kind.
    ///
    /// Entities carry no app label, so a kind shared by two models cannot be
    /// mapped back and is reported as a schema error naming both labels.
    pub fn resolve_kind(&self, kind: &str) -> Result<Arc<ModelDescriptor>> {
        let candidates: Vec<&Arc<ModelDescriptor>> = self
            .kinds
            .get(&kind.to_lowercase())
            .map(|descriptors| descriptors.iter().filter(|d| d.kind() == kind).collect())
            .unwrap_or_default();
        match candidates.as_slice() {
            [] => Err(LoaddataError::UnknownModel(kind.to_string())),
            [descriptor] => Ok(Arc::clone(descriptor)),
            ambiguous => Err(LoaddataError::Schema(format!(
                "kind '{}' is ambiguous between {}",
                kind,
                ambiguous.iter().map(|d| d.label()).collect::<Vec<_>>().join(" and ")
            ))),
        }
    }
    pub fn len(&self) -> usize {
        self.labels.len()
    }
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl ModelRegistry for Registry {
    fn resolve(&self, label: &str) -> Option<Arc<ModelDescriptor>> {
        let lowered = label.to_lowercase();
        if let Some(descriptor) = self.labels.get(&lowered) {
            return Some(Arc::clone(descriptor));
        }
        if lowered.contains('.') {
            return None;
        }
        match self.kinds.get(&lowered).map(Vec::as_slice) {
            Some([descriptor]) => Some(Arc::clone(descriptor)),
            _ => None,
        }
    }
}
