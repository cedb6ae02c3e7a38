//! Registry of configured prediction backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use predict_common::BackendKind;
use tokio::sync::RwLock;

use super::Predictor;

/// Backends keyed by kind, one per kind.
///
/// Iteration follows backend tier order.
pub struct BackendRegistry {
    backends: RwLock<BTreeMap<BackendKind, Arc<dyn Predictor>>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a backend, replacing any previous one of the same kind.
    pub async fn register(&self, backend: Arc<dyn Predictor>) {
        let kind = backend.kind();
        if self.backends.write().await.insert(kind, backend).is_some() {
            tracing::warn!(backend = %kind, "Replaced previously registered backend");
        }
    }

    /// Remove a backend.
    pub async fn unregister(&self, kind: BackendKind) -> Option<Arc<dyn Predictor>> {
        self.backends.write().await.remove(&kind)
    }

    pub async fn get(&self, kind: BackendKind) -> Option<Arc<dyn Predictor>> {
        self.backends.read().await.get(&kind).cloned()
    }

    /// All registered backends in tier order.
    pub async fn all(&self) -> Vec<Arc<dyn Predictor>> {
        self.backends.read().await.values().cloned().collect()
    }

    pub async fn count(&self) -> usize {
        self.backends.read().await.len()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
