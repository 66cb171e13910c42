//! In-memory entity store answering enrichment retrievals.

use crate::error::EnrichmentError;
use crate::ports::EnrichmentFacade;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use shared_types::{AuthorizationContext, EntityId, FieldSelector, Signal, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};

/// Entities with an optional read allow-list of subjects.
#[derive(Debug, Default)]
pub struct InMemoryThingStore {
    things: DashMap<EntityId, StoredThing>,
    retrievals: AtomicU64,
}

#[derive(Debug, Clone)]
struct StoredThing {
    value: Value,
    readers: Vec<String>,
}

impl InMemoryThingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `entity_id`, readable by everyone.
    pub fn put(&self, entity_id: EntityId, value: Value) {
        self.put_restricted(entity_id, value, Vec::new());
    }

    /// Store `value` readable only by `readers`.
    pub fn put_restricted(&self, entity_id: EntityId, value: Value, readers: Vec<String>) {
        self.things.insert(entity_id, StoredThing { value, readers });
    }

    pub fn retrievals(&self) -> u64 {
        self.retrievals.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EnrichmentFacade for InMemoryThingStore {
    async fn retrieve(
        &self,
        entity_id: &EntityId,
        _selector: &FieldSelector,
        auth_context: &AuthorizationContext,
    ) -> Result<Signal, EnrichmentError> {
        self.retrievals.fetch_add(1, Ordering::Relaxed);
        let readable = self.things.get(entity_id).and_then(|thing| {
            let allowed: Vec<&str> = thing.readers.iter().map(String::as_str).collect();
            (allowed.is_empty() || auth_context.is_authorized_by(&allowed))
                .then(|| thing.value.clone())
        });
        // unreadable and missing look the same to the caller
        Ok(match readable {
            Some(value) => Signal::response("retrieveThing", entity_id.clone(), StatusCode::OK)
                .with_payload(value),
            None => Signal::response("retrieveThing", entity_id.clone(), StatusCode::NOT_FOUND),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_restricted_things_look_missing() {
        let store = InMemoryThingStore::new();
        let id = EntityId::parse("ns:secret").unwrap();
        store.put_restricted(id.clone(), json!({"a": 1}), vec!["admin".into()]);

        let selector = FieldSelector::parse("a");
        let anonymous = store
            .retrieve(&id, &selector, &AuthorizationContext::default())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), Some(StatusCode::NOT_FOUND));

        let admin = store
            .retrieve(&id, &selector, &AuthorizationContext::new(["admin"]))
            .await
            .unwrap();
        assert_eq!(admin.payload(), Some(&json!({"a": 1})));
        assert_eq!(store.retrievals(), 2);
    }
}
