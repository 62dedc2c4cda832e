use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::aideon::roomsync::pipeline::AnalysisResult;

/// Repository for finished analyses, keyed by analysis id. The engine never
/// holds one itself; callers that need to look results up again inject an
/// implementation.
pub trait AnalysisStore: Send + Sync {
    fn save(&self, id: Uuid, result: AnalysisResult);
    fn load(&self, id: Uuid) -> Option<Arc<AnalysisResult>>;
    fn delete(&self, id: Uuid) -> bool;
}

/// Process-local store backed by a hash map.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<Uuid, Arc<AnalysisResult>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisStore for InMemoryStore {
    fn save(&self, id: Uuid, result: AnalysisResult) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(result));
    }

    fn load(&self, id: Uuid) -> Option<Arc<AnalysisResult>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn delete(&self, id: Uuid) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}
