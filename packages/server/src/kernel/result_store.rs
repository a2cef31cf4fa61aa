//! In-memory result store.
//!
//! Keyed per workflow id so concurrent workflows never contend on the same
//! record. Useful as the default store and for tests; durable backends
//! implement [`BaseResultStore`] behind the same contract.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use ratchet::WorkflowId;
use uuid::Uuid;

use super::BaseResultStore;
use crate::domains::analysis::models::SiteAnalysis;

/// In-memory store of analysis records.
pub struct InMemoryResultStore {
    records: RwLock<HashMap<Uuid, SiteAnalysis>>,
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryResultStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    pub fn record_count(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// Clear all stored records.
    pub fn clear(&self) {
        self.records.write().unwrap().clear();
    }
}

#[async_trait]
impl BaseResultStore for InMemoryResultStore {
    async fn create_placeholder(
        &self,
        site_url: &str,
        workflow_id: WorkflowId,
    ) -> Result<SiteAnalysis> {
        let record = SiteAnalysis::placeholder(site_url, workflow_id);
        self.records
            .write()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_by_workflow_id(&self, workflow_id: WorkflowId) -> Result<Option<SiteAnalysis>> {
        Ok(self
            .records
            .read()
            .unwrap()
            .values()
            .find(|r| r.workflow_id == workflow_id)
            .cloned())
    }

    async fn update_analysis(&self, id: Uuid, analysis: &str) -> Result<SiteAnalysis> {
        let mut records = self.records.write().unwrap();
        let Some(record) = records.get_mut(&id) else {
            bail!("analysis record not found: {}", id);
        };
        record.analysis = analysis.to_string();
        Ok(record.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<SiteAnalysis>> {
        Ok(self.records.read().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<SiteAnalysis>> {
        let mut records: Vec<SiteAnalysis> =
            self.records.read().unwrap().values().cloned().collect();
        // Creation order ascending; record id breaks timestamp ties
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.records.write().unwrap().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_roundtrip() {
        let store = InMemoryResultStore::new();
        let workflow_id = WorkflowId::new();

        let created = store
            .create_placeholder("https://example.com", workflow_id)
            .await
            .unwrap();
        assert!(!created.has_analysis());

        let found = store.find_by_workflow_id(workflow_id).await.unwrap();
        assert_eq!(found.unwrap().id, created.id);
        assert_eq!(store.record_count(), 1);
    }

    #[tokio::test]
    async fn test_find_by_unknown_workflow_is_none() {
        let store = InMemoryResultStore::new();
        assert!(store
            .find_by_workflow_id(WorkflowId::new())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_analysis() {
        let store = InMemoryResultStore::new();
        let record = store
            .create_placeholder("https://example.com", WorkflowId::new())
            .await
            .unwrap();

        let updated = store
            .update_analysis(record.id, r#"[{"type":"text","text":"Summary."}]"#)
            .await
            .unwrap();
        assert!(updated.has_analysis());

        let fetched = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(fetched.analysis, updated.analysis);
    }

    #[tokio::test]
    async fn test_update_unknown_record_fails() {
        let store = InMemoryResultStore::new();
        assert!(store.update_analysis(Uuid::new_v4(), "x").await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_creation_order_ascending() {
        let store = InMemoryResultStore::new();
        let first = store
            .create_placeholder("https://a.example.com", WorkflowId::new())
            .await
            .unwrap();
        let second = store
            .create_placeholder("https://b.example.com", WorkflowId::new())
            .await
            .unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].id, second.id);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryResultStore::new();
        let record = store
            .create_placeholder("https://example.com", WorkflowId::new())
            .await
            .unwrap();

        assert!(store.delete(record.id).await.unwrap());
        assert!(!store.delete(record.id).await.unwrap());
        assert!(store.get(record.id).await.unwrap().is_none());
    }
}
