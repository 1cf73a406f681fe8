//! In-memory query response cache.
//!
//! Keys are the literal (question, chat history, form) triple. Identical
//! concurrent queries may both miss and both compute; the last write wins.
//! Nothing is persisted.

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub question: String,
    pub history: String,
    pub form: Option<String>,
}

impl CacheKey {
    pub fn new(question: &str, history: &str, form: Option<&str>) -> Self {
        Self {
            question: question.to_string(),
            history: history.to_string(),
            form: form.map(String::from),
        }
    }
}

#[derive(Default)]
struct Entries {
    answers: HashMap<CacheKey, String>,
    /// Insertion order, oldest first, for eviction
    order: VecDeque<CacheKey>,
}

pub struct ResponseCache {
    entries: RwLock<Entries>,
    capacity: usize,
}

impl ResponseCache {
    /// A cache holding at most `capacity` answers. Zero disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            capacity,
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        self.entries.read().await.answers.get(key).cloned()
    }

    pub async fn insert(&self, key: CacheKey, answer: String) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.write().await;
        if entries.answers.insert(key.clone(), answer).is_none() {
            entries.order.push_back(key);
        }
        while entries.answers.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.answers.remove(&oldest);
            debug!("Evicted cached response");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.answers.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.answers.clear();
        entries.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn last_write_wins() {
        let cache = ResponseCache::new(8);
        let key = CacheKey::new("q", "", None);
        cache.insert(key.clone(), "first".into()).await;
        cache.insert(key.clone(), "second".into()).await;
        assert_eq!(cache.get(&key).await.as_deref(), Some("second"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn keys_are_literal() {
        let cache = ResponseCache::new(8);
        cache.insert(CacheKey::new("q", "h", None), "a".into()).await;
        assert!(cache.get(&CacheKey::new("q ", "h", None)).await.is_none());
        assert!(cache.get(&CacheKey::new("q", "h", Some("form.txt"))).await.is_none());
    }

    #[tokio::test]
    async fn oldest_entry_is_evicted() {
        let cache = ResponseCache::new(2);
        for q in ["a", "b", "c"] {
            cache.insert(CacheKey::new(q, "", None), q.into()).await;
        }
        assert_eq!(cache.len().await, 2);
        assert!(cache.get(&CacheKey::new("a", "", None)).await.is_none());
        assert!(cache.get(&CacheKey::new("c", "", None)).await.is_some());
    }

    #[tokio::test]
    async fn zero_capacity_disables_caching() {
        let cache = ResponseCache::new(0);
        cache.insert(CacheKey::new("q", "", None), "a".into()).await;
        assert!(cache.is_empty().await);
    }
}
