use super::event_source::StoredEvent;
use super::persistor::Persistor;
use crate::error::Result;
use crate::types::TableSpec;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps events to writes against the view tables it manages
pub trait Projector: Send + Sync {
    fn name(&self) -> &str;

    /// The tables this projector populates
    fn managed_tables(&self) -> Vec<TableSpec>;

    /// Event types this projector handles
    fn message_mapping(&self) -> Vec<String>;

    /// Apply one event to the persistor
    fn apply(&self, event: &StoredEvent, persistor: &mut dyn Persistor) -> Result<()>;
}

/// Explicit projector registration table, built once at startup.
///
/// Event types resolve to handlers through a map populated at registration
/// time rather than by runtime lookup.
#[derive(Default)]
pub struct ProjectorRegistry {
    projectors: Vec<Arc<dyn Projector>>,
    by_event_type: HashMap<String, Vec<usize>>,
}

impl ProjectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_projectors(projectors: impl IntoIterator<Item = Arc<dyn Projector>>) -> Self {
        let mut registry = Self::new();
        for projector in projectors {
            registry.register(projector);
        }
        registry
    }

    pub fn register(&mut self, projector: Arc<dyn Projector>) {
        let idx = self.projectors.len();
        for event_type in projector.message_mapping() {
            self.by_event_type.entry(event_type).or_default().push(idx);
        }
        self.projectors.push(projector);
    }

    pub fn len(&self) -> usize {
        self.projectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectors.is_empty()
    }

    pub fn projectors(&self) -> &[Arc<dyn Projector>] {
        &self.projectors
    }

    pub fn names(&self) -> Vec<String> {
        self.projectors.iter().map(|p| p.name().to_string()).collect()
    }

    /// Sorted union of all registered `message_mapping`s
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.by_event_type.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn handlers_for<'a>(
        &'a self,
        event_type: &str,
    ) -> impl Iterator<Item = &'a Arc<dyn Projector>> + 'a {
        self.by_event_type
            .get(event_type)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&idx| &self.projectors[idx])
    }

    /// Union of managed tables across projectors, first declaration wins
    pub fn managed_tables(&self) -> Vec<TableSpec> {
        let mut seen = std::collections::HashSet::new();
        let mut tables = Vec::new();
        for projector in &self.projectors {
            for table in projector.managed_tables() {
                if seen.insert(table.name.clone()) {
                    tables.push(table);
                }
            }
        }
        tables
    }
}
