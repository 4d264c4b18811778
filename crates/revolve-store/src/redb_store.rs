use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use revolve_domain::{
    Checkpoint, Resource, ResourceDependency, ResourceEvent, ResourceId, Transition,
    TransitionEvent, TransitionId,
};

use crate::error::StoreError;
use crate::store::Store;

const RESOURCES: TableDefinition<&str, &[u8]> = TableDefinition::new("resources");
const DEPENDENCIES: TableDefinition<&str, &[u8]> = TableDefinition::new("dependencies");
const RESOURCE_EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("resource_events");
const TRANSITIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transitions");
const TRANSITION_EVENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("transition_events");
const CHECKPOINTS: TableDefinition<&str, &[u8]> = TableDefinition::new("checkpoints");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const DEPENDENCIES_KEY: &str = "all";

fn checkpoint_key(transition_id: &TransitionId, step_name: &str) -> String {
    format!("{}|{}", transition_id, step_name)
}

/// Persistent [`Store`] backed by a redb database file.
///
/// State survives process restarts — the backend a `revolve-cli serve`
/// invocation uses outside of tests.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a redb database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        let db = Database::create(path).map_err(|e| StoreError::Internal(e.to_string()))?;

        {
            let wtxn = db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(RESOURCES).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(DEPENDENCIES).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(RESOURCE_EVENTS).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(TRANSITIONS).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(TRANSITION_EVENTS).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(CHECKPOINTS).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.open_table(META).map_err(|e| StoreError::Internal(e.to_string()))?;
            wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    fn next_seq(&self, meta_key: &str) -> Result<u64, StoreError> {
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        let seq = {
            let mut meta = wtxn.open_table(META).map_err(|e| StoreError::Internal(e.to_string()))?;
            let current = meta
                .get(meta_key)
                .map_err(|e| StoreError::Internal(e.to_string()))?
                .map(|g| g.value())
                .unwrap_or(0);
            let next = current + 1;
            meta.insert(meta_key, next).map_err(|e| StoreError::Internal(e.to_string()))?;
            next
        };
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(seq)
    }
}

#[async_trait]
impl Store for RedbStore {
    async fn get_resource(&self, id: &ResourceId) -> Result<Option<Resource>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(RESOURCES).map_err(|e| StoreError::Internal(e.to_string()))?;
        match table.get(id.as_str()).map_err(|e| StoreError::Internal(e.to_string()))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn list_resources(&self) -> Result<Vec<Resource>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(RESOURCES).map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            results.push(serde_json::from_slice(v.value())?);
        }
        Ok(results)
    }

    async fn upsert_resource(&self, resource: &Resource) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(resource)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(RESOURCES).map_err(|e| StoreError::Internal(e.to_string()))?;
            table
                .insert(resource.id.as_str(), bytes.as_slice())
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn delete_resource(&self, id: &ResourceId) -> Result<(), StoreError> {
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(RESOURCES).map_err(|e| StoreError::Internal(e.to_string()))?;
            table.remove(id.as_str()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn list_dependencies(&self) -> Result<Vec<ResourceDependency>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(DEPENDENCIES).map_err(|e| StoreError::Internal(e.to_string()))?;
        match table.get(DEPENDENCIES_KEY).map_err(|e| StoreError::Internal(e.to_string()))? {
            Some(guard) => Ok(serde_json::from_slice(guard.value())?),
            None => Ok(Vec::new()),
        }
    }

    async fn add_dependency(&self, dependency: &ResourceDependency) -> Result<(), StoreError> {
        let mut all = self.list_dependencies().await?;
        all.push(dependency.clone());
        let bytes = serde_json::to_vec(&all)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(DEPENDENCIES).map_err(|e| StoreError::Internal(e.to_string()))?;
            table
                .insert(DEPENDENCIES_KEY, bytes.as_slice())
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn append_resource_event(&self, event: &ResourceEvent) -> Result<(), StoreError> {
        let seq = self.next_seq("resource_event_seq")?;
        let bytes = serde_json::to_vec(event)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn
                .open_table(RESOURCE_EVENTS)
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            table.insert(seq, bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn list_resource_events(
        &self,
        resource_id: Option<&ResourceId>,
        limit: u32,
    ) -> Result<Vec<ResourceEvent>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn
            .open_table(RESOURCE_EVENTS)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut all: Vec<ResourceEvent> = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            let event: ResourceEvent = serde_json::from_slice(v.value())?;
            if resource_id.map_or(true, |id| &event.resource_id == id) {
                all.push(event);
            }
        }
        let start = all.len().saturating_sub(limit as usize);
        Ok(all[start..].to_vec())
    }

    async fn get_transition(&self, id: &TransitionId) -> Result<Option<Transition>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(TRANSITIONS).map_err(|e| StoreError::Internal(e.to_string()))?;
        match table
            .get(id.to_string().as_str())
            .map_err(|e| StoreError::Internal(e.to_string()))?
        {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn list_transitions(
        &self,
        resource_id: Option<&ResourceId>,
    ) -> Result<Vec<Transition>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(TRANSITIONS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            let t: Transition = serde_json::from_slice(v.value())?;
            if resource_id.map_or(true, |id| &t.resource_id == id) {
                results.push(t);
            }
        }
        Ok(results)
    }

    async fn upsert_transition(&self, transition: &Transition) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(transition)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(TRANSITIONS).map_err(|e| StoreError::Internal(e.to_string()))?;
            table
                .insert(transition.id.to_string().as_str(), bytes.as_slice())
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn append_transition_event(&self, event: &TransitionEvent) -> Result<(), StoreError> {
        let seq = self.next_seq("transition_event_seq")?;
        let bytes = serde_json::to_vec(event)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn
                .open_table(TRANSITION_EVENTS)
                .map_err(|e| StoreError::Internal(e.to_string()))?;
            table.insert(seq, bytes.as_slice()).map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }

    async fn list_transition_events(
        &self,
        transition_id: &TransitionId,
    ) -> Result<Vec<TransitionEvent>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn
            .open_table(TRANSITION_EVENTS)
            .map_err(|e| StoreError::Internal(e.to_string()))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::Internal(e.to_string()))? {
            let (_k, v) = entry.map_err(|e| StoreError::Internal(e.to_string()))?;
            let event: TransitionEvent = serde_json::from_slice(v.value())?;
            if &event.transition_id == transition_id {
                results.push(event);
            }
        }
        Ok(results)
    }

    async fn get_checkpoint(
        &self,
        transition_id: &TransitionId,
        step_name: &str,
    ) -> Result<Option<Checkpoint>, StoreError> {
        let rtxn = self.db.begin_read().map_err(|e| StoreError::Internal(e.to_string()))?;
        let table = rtxn.open_table(CHECKPOINTS).map_err(|e| StoreError::Internal(e.to_string()))?;
        let key = checkpoint_key(transition_id, step_name);
        match table.get(key.as_str()).map_err(|e| StoreError::Internal(e.to_string()))? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    async fn put_checkpoint(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        let key = checkpoint_key(&checkpoint.transition_id, &checkpoint.step_name);
        let bytes = serde_json::to_vec(checkpoint)?;
        let wtxn = self.db.begin_write().map_err(|e| StoreError::Internal(e.to_string()))?;
        {
            let mut table = wtxn.open_table(CHECKPOINTS).map_err(|e| StoreError::Internal(e.to_string()))?;
            table
                .insert(key.as_str(), bytes.as_slice())
                .map_err(|e| StoreError::Internal(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| StoreError::Internal(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revolve_domain::{Phase, ProjectId};
    use tempfile::TempDir;

    fn dummy_resource(id: &str) -> Resource {
        let mut r = Resource::new(ProjectId::new("proj"), "vpc_network", id, serde_json::json!({}));
        r.id = ResourceId::new(id);
        r
    }

    fn open_store(dir: &TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("state.redb")).unwrap()
    }

    #[tokio::test]
    async fn upsert_and_get_resource() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.upsert_resource(&dummy_resource("a")).await.unwrap();
        let got = store.get_resource(&ResourceId::new("a")).await.unwrap();
        assert_eq!(got.unwrap().id.as_str(), "a");
    }

    #[tokio::test]
    async fn persistence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.upsert_resource(&dummy_resource("persistent")).await.unwrap();
        }
        {
            let store = RedbStore::open(&path).unwrap();
            let got = store.get_resource(&ResourceId::new("persistent")).await.unwrap();
            assert!(got.is_some(), "resource should survive store reopen");
        }
    }

    #[tokio::test]
    async fn dependencies_accumulate() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .add_dependency(&ResourceDependency {
                resource_id: ResourceId::new("subnet"),
                depends_on: ResourceId::new("vpc"),
            })
            .await
            .unwrap();
        store
            .add_dependency(&ResourceDependency {
                resource_id: ResourceId::new("instance"),
                depends_on: ResourceId::new("subnet"),
            })
            .await
            .unwrap();
        assert_eq!(store.list_dependencies().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn transition_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let t = Transition::new(ResourceId::new("a"), Phase::EnsureExists);
        store.upsert_transition(&t).await.unwrap();
        let got = store.get_transition(&t.id).await.unwrap().unwrap();
        assert_eq!(got.phase, Phase::EnsureExists);
    }

    #[tokio::test]
    async fn checkpoint_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let t = Transition::new(ResourceId::new("a"), Phase::EnsureExists);
        let cp = Checkpoint {
            transition_id: t.id,
            step_name: "request_creation".to_string(),
            result: serde_json::json!({"ok": true}),
            created_at: chrono::Utc::now(),
        };
        store.put_checkpoint(&cp).await.unwrap();
        let got = store.get_checkpoint(&t.id, "request_creation").await.unwrap();
        assert!(got.is_some());
    }
}
