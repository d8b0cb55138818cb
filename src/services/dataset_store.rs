use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::Table;

/// A cleaned upload, kept so later requests can chart it without re-parsing.
#[derive(Debug)]
pub struct Dataset {
    pub file_name: String,
    pub sheet_names: Vec<String>,
    pub table: Table,
}

#[derive(Clone)]
pub struct DatasetStore {
    cache: Cache<u64, Arc<Dataset>>,
    next_id: Arc<AtomicU64>,
}

impl DatasetStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn insert(&self, dataset: Dataset) -> (u64, Arc<Dataset>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let dataset = Arc::new(dataset);
        self.cache.insert(id, dataset.clone());
        tracing::info!("Stored dataset {} ({})", id, dataset.file_name);
        (id, dataset)
    }

    pub fn get(&self, id: u64) -> Result<Arc<Dataset>, AppError> {
        self.cache
            .get(&id)
            .ok_or_else(|| AppError::DatasetNotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_lookups_work() {
        let store = DatasetStore::new(4);
        let dataset = |name: &str| Dataset {
            file_name: name.to_string(),
            sheet_names: Vec::new(),
            table: Table::default(),
        };
        let (a, _) = store.insert(dataset("a.csv"));
        let (b, _) = store.insert(dataset("b.csv"));
        assert_ne!(a, b);
        assert_eq!(store.get(b).unwrap().file_name, "b.csv");
        assert!(matches!(store.get(999), Err(AppError::DatasetNotFound(_))));
    }
}
