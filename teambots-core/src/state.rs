// ABOUTME: Conversation and user state persisted between turns
// ABOUTME: StateStore trait with an in-memory implementation and storage key helpers

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::activity::Activity;

/// A JSON object bag stored under one key
pub type StateBag = Map<String, Value>;

/// Async key/value store for bot state.
///
/// Keys are scoped per conversation or per user; implementations only need
/// per-key consistency.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<StateBag>>;
    async fn save(&self, key: &str, state: StateBag) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local store; state does not survive restarts.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, StateBag>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStorage {
    async fn load(&self, key: &str) -> Result<Option<StateBag>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, state: StateBag) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), state);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Storage key for the conversation an activity belongs to
pub fn conversation_key(activity: &Activity) -> String {
    format!(
        "{}/conversations/{}",
        activity.channel_id, activity.conversation.id
    )
}

/// Storage key for the user who sent an activity
pub fn user_key(activity: &Activity) -> String {
    format!("{}/users/{}", activity.channel_id, activity.from.id)
}

/// State a single turn reads and writes.
///
/// Loaded before the bot runs; the adapter writes it back when the turn
/// succeeds, and the error policy deletes the conversation half on failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnState {
    pub conversation: StateBag,
    pub user: StateBag,
    dirty: bool,
}

impl TurnState {
    pub async fn load(store: &dyn StateStore, activity: &Activity) -> Result<Self> {
        let conversation = store
            .load(&conversation_key(activity))
            .await?
            .unwrap_or_default();
        let user = if activity.from.id.is_empty() {
            StateBag::new()
        } else {
            store.load(&user_key(activity)).await?.unwrap_or_default()
        };
        Ok(Self {
            conversation,
            user,
            dirty: false,
        })
    }

    /// Write both halves back if anything changed during the turn
    pub async fn save(&mut self, store: &dyn StateStore, activity: &Activity) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        store
            .save(&conversation_key(activity), self.conversation.clone())
            .await?;
        if !activity.from.id.is_empty() {
            store.save(&user_key(activity), self.user.clone()).await?;
        }
        self.dirty = false;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn conversation_value(&self, key: &str) -> Option<&Value> {
        self.conversation.get(key)
    }

    pub fn set_conversation_value(&mut self, key: impl Into<String>, value: Value) {
        self.conversation.insert(key.into(), value);
        self.dirty = true;
    }

    pub fn user_value(&self, key: &str) -> Option<&Value> {
        self.user.get(key)
    }

    pub fn set_user_value(&mut self, key: impl Into<String>, value: Value) {
        self.user.insert(key.into(), value);
        self.dirty = true;
    }

    /// Drop the in-memory conversation state so nothing is written back
    pub fn clear_conversation(&mut self) {
        self.conversation.clear();
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ChannelAccount, ConversationAccount};

    fn activity() -> Activity {
        Activity {
            activity_type: "message".to_string(),
            channel_id: "emulator".to_string(),
            from: ChannelAccount::new("user-1"),
            conversation: ConversationAccount {
                id: "conv-1".to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_keys_scoped_by_channel() {
        let a = activity();
        assert_eq!(conversation_key(&a), "emulator/conversations/conv-1");
        assert_eq!(user_key(&a), "emulator/users/user-1");
    }

    #[tokio::test]
    async fn test_memory_storage_roundtrip_and_delete() {
        let store = MemoryStorage::new();
        let mut bag = StateBag::new();
        bag.insert("count".into(), Value::from(3));

        store.save("k", bag.clone()).await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), Some(bag));

        store.delete("k").await.unwrap();
        assert_eq!(store.load("k").await.unwrap(), None);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_unchanged_state_is_not_written() {
        let store = MemoryStorage::new();
        let a = activity();
        let mut state = TurnState::load(&store, &a).await.unwrap();
        state.save(&store, &a).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_state_persists_across_turns() {
        let store = MemoryStorage::new();
        let a = activity();

        let mut first = TurnState::load(&store, &a).await.unwrap();
        first.set_conversation_value("turns", Value::from(1));
        first.set_user_value("name", Value::from("Ada"));
        first.save(&store, &a).await.unwrap();

        let second = TurnState::load(&store, &a).await.unwrap();
        assert_eq!(second.conversation_value("turns"), Some(&Value::from(1)));
        assert_eq!(second.user_value("name"), Some(&Value::from("Ada")));
        assert!(!second.is_dirty());
    }
}
