use std::future::Future;

use revolve_domain::{Checkpoint, TransitionId};
use revolve_store::{Store, StoreError};
use serde_json::Value;

/// Memoizes an idempotent, side-effectful step keyed by `(transition_id,
/// step_name)`, the Rust stand-in for the `_Memorize` redis decorator in
/// `transitions/celery_utils/__init__.py`. Backed by whichever `Store` the
/// engine is already wired to rather than a separate redis connection — the
/// teacher's `redb`/in-memory store split already gives callers a
/// swap-able backend for tests.
pub struct CheckpointCache {
    ttl_secs: i64,
}

impl Default for CheckpointCache {
    fn default() -> Self {
        CheckpointCache { ttl_secs: 180 }
    }
}

impl CheckpointCache {
    pub fn new(ttl_secs: i64) -> Self {
        CheckpointCache { ttl_secs }
    }

    fn is_fresh(&self, checkpoint: &Checkpoint) -> bool {
        let age = chrono::Utc::now().signed_duration_since(checkpoint.created_at);
        age.num_seconds() < self.ttl_secs
    }

    /// Runs `step` unless a fresh, successful checkpoint already exists for
    /// `(transition_id, step_name)`. Mirrors `_Memorize.__call__`: the first
    /// attempt (`retry_index == 0`) always executes fresh, exactly as the
    /// original skips the cache read when `retry_index` is `None` or `0`
    /// (its "first call" case — for us that's the zeroth attempt, not a
    /// `None` sentinel, since every Rust attempt has a concrete index). Only
    /// a `(true, _)` result is cached, matching "only successful results
    /// (first element truthy) are cached".
    pub async fn get_or_execute<F, Fut>(
        &self,
        store: &dyn Store,
        transition_id: &TransitionId,
        step_name: &str,
        retry_index: u32,
        step: F,
    ) -> Result<(bool, Value), StoreError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(bool, Value), StoreError>>,
    {
        if retry_index > 0 {
            if let Some(checkpoint) = store.get_checkpoint(transition_id, step_name).await? {
                if self.is_fresh(&checkpoint) {
                    let success = checkpoint
                        .result
                        .get("success")
                        .and_then(Value::as_bool)
                        .unwrap_or(false);
                    let payload = checkpoint
                        .result
                        .get("payload")
                        .cloned()
                        .unwrap_or(Value::Null);
                    return Ok((success, payload));
                }
            }
        }

        let (success, payload) = step().await?;
        if success {
            store
                .put_checkpoint(&Checkpoint {
                    transition_id: transition_id.clone(),
                    step_name: step_name.to_string(),
                    result: serde_json::json!({ "success": true, "payload": payload }),
                    created_at: chrono::Utc::now(),
                })
                .await?;
        }
        Ok((success, payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revolve_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn transition_id() -> TransitionId {
        TransitionId::generate()
    }

    #[tokio::test]
    async fn first_attempt_always_executes() {
        let store = InMemoryStore::new();
        let cache = CheckpointCache::default();
        let tid = transition_id();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let (ok, _) = cache
            .get_or_execute(&store, &tid, "create_resource", 0, || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok((true, serde_json::json!({"id": "abc"})))
            })
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retry_reuses_cached_success() {
        let store = InMemoryStore::new();
        let cache = CheckpointCache::default();
        let tid = transition_id();
        let calls = Arc::new(AtomicUsize::new(0));

        for attempt in 0..3u32 {
            let c = calls.clone();
            let (ok, payload) = cache
                .get_or_execute(&store, &tid, "create_resource", attempt, || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok((true, serde_json::json!({"id": "abc"})))
                })
                .await
                .unwrap();
            assert!(ok);
            assert_eq!(payload["id"], "abc");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_result_is_never_cached() {
        let store = InMemoryStore::new();
        let cache = CheckpointCache::default();
        let tid = transition_id();
        let calls = Arc::new(AtomicUsize::new(0));

        for attempt in 0..2u32 {
            let c = calls.clone();
            let (ok, _) = cache
                .get_or_execute(&store, &tid, "create_resource", attempt, || async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok((false, serde_json::Value::Null))
                })
                .await
                .unwrap();
            assert!(!ok);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
