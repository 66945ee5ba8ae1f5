//! Ingestion dedup check.
//!
//! The check-then-insert is not atomic; the `UNIQUE(url, scope_query)`
//! constraint turns a lost race into a silent skip at insert time.

use anyhow::Result;
use std::sync::Arc;

use signal_harvest_core::store::Store;

pub struct Deduplicator {
    store: Arc<dyn Store>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Whether `url` is already stored. With a non-empty `scope_query` the
    /// match is narrowed to posts ingested under that query.
    pub async fn exists(&self, url: &str, scope_query: Option<&str>) -> Result<bool> {
        let scope_query = scope_query.filter(|q| !q.trim().is_empty());
        self.store.post_exists(url, scope_query).await
    }
}
