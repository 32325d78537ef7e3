//! Channel → NLU session id registry

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

/// Maps a Slack channel to the session id sent to the NLU service, so
/// follow-up messages in a channel share NLU context.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Existing session id for `channel_id`, or a freshly created one
    async fn get_or_create(&self, channel_id: &str) -> String;

    /// Forget the session for `channel_id`, returning the old id if any
    async fn evict(&self, channel_id: &str) -> Option<String>;
}

/// Process-lifetime session map
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, channel_id: &str) -> String {
        // entry() holds the shard lock, so concurrent first lookups agree on one id
        self.sessions
            .entry(channel_id.to_string())
            .or_insert_with(|| {
                let id = Uuid::now_v7().to_string();
                debug!("New NLU session {} for channel {}", id, channel_id);
                id
            })
            .value()
            .clone()
    }

    async fn evict(&self, channel_id: &str) -> Option<String> {
        self.sessions.remove(channel_id).map(|(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let store = InMemorySessionStore::new();
        let first = store.get_or_create("C1").await;
        let second = store.get_or_create("C1").await;
        assert_eq!(first, second);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_channels_get_distinct_sessions() {
        let store = InMemorySessionStore::new();
        let a = store.get_or_create("C1").await;
        let b = store.get_or_create("C2").await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_evict_starts_new_session() {
        let store = InMemorySessionStore::new();
        let first = store.get_or_create("C1").await;
        assert_eq!(store.evict("C1").await, Some(first.clone()));
        assert_eq!(store.evict("C1").await, None);

        let second = store.get_or_create("C1").await;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_first_lookup_has_single_winner() {
        let store = Arc::new(InMemorySessionStore::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.get_or_create("C1").await }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1);
    }
}
