//! In-process document store
//!
//! Same contract as the HTTP store, kept in memory. Serves as the remote
//! double in tests and for in-process use through `RemoteStore::memory`;
//! with no server configured the remote is disabled instead. `set_offline`
//! makes every call fail as a transport error.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use uuid::Uuid;

use crate::criteria::{Match, SearchCriteria, Term};
use crate::storage::{StoreError, StoreResult};

type Collection = Vec<(Uuid, Value)>;

#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, Collection>>,
    offline: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate losing the connection to the server
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn collections(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Collection>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("server unreachable".to_string()));
        }
        Ok(self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of documents in a collection
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(collection)
            .map_or(0, Vec::len)
    }

    pub async fn put(&self, collection: &str, id: Uuid, document: &Value) -> StoreResult<()> {
        let mut collections = self.collections()?;
        let docs = collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|(key, _)| *key == id) {
            Some((_, existing)) => *existing = document.clone(),
            None => docs.push((id, document.clone())),
        }
        Ok(())
    }

    pub async fn get(&self, collection: &str, id: Uuid) -> StoreResult<Option<Value>> {
        let collections = self.collections()?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(key, _)| *key == id))
            .map(|(_, doc)| doc.clone()))
    }

    pub async fn delete(&self, collection: &str, id: Uuid) -> StoreResult<bool> {
        let mut collections = self.collections()?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(false);
        };
        let before = docs.len();
        docs.retain(|(key, _)| *key != id);
        Ok(docs.len() != before)
    }

    pub async fn search(
        &self,
        collection: &str,
        criteria: &SearchCriteria,
    ) -> StoreResult<Vec<Value>> {
        let collections = self.collections()?;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, doc)| criteria.terms().iter().all(|term| matches_term(doc, term)))
                    .map(|(_, doc)| doc.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

/// Keywords match case-insensitively, like the server's analyzed fields
fn matches_term(document: &Value, term: &Term) -> bool {
    let Some(value) = document.get(term.field).and_then(field_text) else {
        return false;
    };
    match term.matching {
        Match::Exact => value == term.value,
        Match::Keyword => value
            .to_lowercase()
            .contains(&term.value.to_lowercase()),
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChapterQuery, Criteria, StoryQuery};
    use serde_json::json;

    #[tokio::test]
    async fn test_put_replaces_by_id() {
        let store = MemoryDocumentStore::new();
        let id = Uuid::new_v4();

        store.put("stories", id, &json!({"title": "a"})).await.unwrap();
        store.put("stories", id, &json!({"title": "b"})).await.unwrap();

        assert_eq!(store.len("stories"), 1);
        assert_eq!(
            store.get("stories", id).await.unwrap(),
            Some(json!({"title": "b"}))
        );
    }

    #[tokio::test]
    async fn test_search_keywords_anded() {
        let store = MemoryDocumentStore::new();
        store
            .put("stories", Uuid::new_v4(), &json!({"title": "A Love Story"}))
            .await
            .unwrap();
        store
            .put("stories", Uuid::new_v4(), &json!({"title": "love poem"}))
            .await
            .unwrap();

        let hits = store
            .search("stories", &StoryQuery::titled("love story").search_criteria())
            .await
            .unwrap();
        assert_eq!(hits, vec![json!({"title": "A Love Story"})]);

        let all = store.search("stories", &SearchCriteria::new()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_bool_fields_match_as_text() {
        let store = MemoryDocumentStore::new();
        store
            .put("chapters", Uuid::new_v4(), &json!({"random_choice": true}))
            .await
            .unwrap();

        let query = ChapterQuery {
            random_choice: Some(true),
            ..ChapterQuery::default()
        };
        let hits = store.search("chapters", &query.search_criteria()).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_reports_missing() {
        let store = MemoryDocumentStore::new();
        let id = Uuid::new_v4();
        assert!(!store.delete("media", id).await.unwrap());

        store.put("media", id, &json!({})).await.unwrap();
        assert!(store.delete("media", id).await.unwrap());
        assert!(store.get("media", id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_fails_everything() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);

        let err = store.put("stories", Uuid::new_v4(), &json!({})).await.unwrap_err();
        assert!(err.is_transport());
        assert!(store.search("stories", &SearchCriteria::new()).await.is_err());

        store.set_offline(false);
        assert!(store.search("stories", &SearchCriteria::new()).await.is_ok());
    }
}
