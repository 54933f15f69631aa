//! Conversation threads kept between turns
//!
//! In-memory only; a thread's history is lost on restart.

use crate::models::Message;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Trait for thread history storage
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    /// The most recent `window` messages of a thread, oldest first
    async fn load(&self, thread_id: Uuid, window: usize) -> Result<Vec<Message>>;
    async fn append(&self, thread_id: Uuid, messages: Vec<Message>) -> Result<()>;
    /// Full history, `None` for an unknown thread
    async fn get(&self, thread_id: Uuid) -> Result<Option<Vec<Message>>>;
    /// Returns whether the thread existed
    async fn delete(&self, thread_id: Uuid) -> Result<bool>;
}

pub struct InMemorySessionStore {
    threads: Arc<RwLock<HashMap<Uuid, Vec<Message>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, thread_id: Uuid, window: usize) -> Result<Vec<Message>> {
        let threads = self.threads.read().await;

        Ok(threads
            .get(&thread_id)
            .map(|messages| {
                let skip = messages.len().saturating_sub(window);
                messages[skip..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn append(&self, thread_id: Uuid, messages: Vec<Message>) -> Result<()> {
        let mut threads = self.threads.write().await;
        threads.entry(thread_id).or_default().extend(messages);
        Ok(())
    }

    async fn get(&self, thread_id: Uuid) -> Result<Option<Vec<Message>>> {
        let threads = self.threads.read().await;
        Ok(threads.get(&thread_id).cloned())
    }

    async fn delete(&self, thread_id: Uuid) -> Result<bool> {
        let mut threads = self.threads.write().await;
        Ok(threads.remove(&thread_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_window() {
        let store = InMemorySessionStore::new();
        let thread = Uuid::new_v4();

        store
            .append(
                thread,
                vec![
                    Message::user("one"),
                    Message::assistant("two"),
                    Message::user("three"),
                ],
            )
            .await
            .unwrap();

        let recent = store.load(thread, 2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["two", "three"]);

        assert_eq!(store.load(thread, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_thread() {
        let store = InMemorySessionStore::new();
        let thread = Uuid::new_v4();

        assert!(store.load(thread, 5).await.unwrap().is_empty());
        assert!(store.get(thread).await.unwrap().is_none());
        assert!(!store.delete(thread).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_thread() {
        let store = InMemorySessionStore::new();
        let thread = Uuid::new_v4();
        store.append(thread, vec![Message::user("hi")]).await.unwrap();

        assert!(store.delete(thread).await.unwrap());
        assert!(store.get(thread).await.unwrap().is_none());
    }
}
