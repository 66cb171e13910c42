//! # Enrichment Cache
//!
//! Fetches extra fields for outbound signals. Concurrent requests for the
//! same entity, field selector and revision share one round-trip; a new
//! revision is a new cache key, so stale entries are never served. The
//! requesting subjects are part of the key: results fetched for one
//! authorization context are never handed to another.
//!
//! Signals without a revision are fetched every time.

use crate::domain::EnrichmentConfig;
use crate::error::EnrichmentError;
use crate::metrics::DispatchMetrics;
use crate::ports::EnrichmentFacade;
use cg_01_mapping::domain::lookup_path;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use shared_types::{AuthorizationContext, EntityId, FieldSelector, Signal, StatusCode};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

type CacheKey = (EntityId, FieldSelector, u64, Vec<String>);
type SharedResult = Arc<OnceCell<Result<Value, EnrichmentError>>>;

pub struct EnrichmentCache {
    facade: Arc<dyn EnrichmentFacade>,
    cells: Mutex<LruCache<CacheKey, SharedResult>>,
    retrieve_timeout: Duration,
    metrics: Arc<DispatchMetrics>,
}

impl EnrichmentCache {
    pub fn new(
        facade: Arc<dyn EnrichmentFacade>,
        config: &EnrichmentConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            facade,
            cells: Mutex::new(LruCache::new(capacity)),
            retrieve_timeout: config.retrieve_timeout,
            metrics,
        }
    }

    /// `signal` with the `selector` fields merged into its extra fields.
    pub async fn enrich(
        &self,
        signal: &Signal,
        selector: &FieldSelector,
        auth_context: &AuthorizationContext,
    ) -> Result<Signal, EnrichmentError> {
        let fetched = self.extra_fields(signal, selector, auth_context).await?;
        let merged = match (signal.extra().cloned(), fetched) {
            (Some(Value::Object(mut existing)), Value::Object(fetched)) => {
                existing.extend(fetched);
                Value::Object(existing)
            }
            (_, fetched) => fetched,
        };
        Ok(signal.clone().with_extra(merged))
    }

    /// The `selector` fields of the signal's entity.
    pub async fn extra_fields(
        &self,
        signal: &Signal,
        selector: &FieldSelector,
        auth_context: &AuthorizationContext,
    ) -> Result<Value, EnrichmentError> {
        let Some(revision) = signal.revision() else {
            DispatchMetrics::incr(&self.metrics.enrichment_misses);
            return self.fetch(signal.entity_id(), selector, auth_context).await;
        };

        let key = (
            signal.entity_id().clone(),
            selector.clone(),
            revision,
            auth_context.subjects().to_vec(),
        );
        let cell = {
            let mut cells = self.cells.lock();
            match cells.get(&key) {
                Some(cell) => {
                    DispatchMetrics::incr(&self.metrics.enrichment_hits);
                    Arc::clone(cell)
                }
                None => {
                    DispatchMetrics::incr(&self.metrics.enrichment_misses);
                    let cell: SharedResult = Arc::new(OnceCell::new());
                    cells.put(key.clone(), Arc::clone(&cell));
                    cell
                }
            }
        };

        let result = cell
            .get_or_init(|| self.fetch(signal.entity_id(), selector, auth_context))
            .await
            .clone();

        if result.is_err() {
            // failures are not cached
            let mut cells = self.cells.lock();
            if cells.peek(&key).is_some_and(|c| Arc::ptr_eq(c, &cell)) {
                cells.pop(&key);
            }
        }
        result
    }

    async fn fetch(
        &self,
        entity_id: &EntityId,
        selector: &FieldSelector,
        auth_context: &AuthorizationContext,
    ) -> Result<Value, EnrichmentError> {
        debug!(entity_id = %entity_id, fields = %selector, "Retrieving extra fields");
        let result = match tokio::time::timeout(
            self.retrieve_timeout,
            self.facade.retrieve(entity_id, selector, auth_context),
        )
        .await
        {
            Ok(Ok(response)) => check_response(entity_id, &response).map(|payload| select_fields(payload, selector)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EnrichmentError::Timeout(self.retrieve_timeout)),
        };

        if let Err(e) = &result {
            DispatchMetrics::incr(&self.metrics.enrichment_failures);
            warn!(entity_id = %entity_id, fields = %selector, error = %e, "Enrichment failed");
        }
        result
    }

    pub fn cached_entries(&self) -> usize {
        self.cells.lock().len()
    }
}

fn check_response<'s>(entity_id: &EntityId, response: &'s Signal) -> Result<Option<&'s Value>, EnrichmentError> {
    match response.status() {
        Some(StatusCode::NOT_FOUND) => Err(EnrichmentError::NotFound(entity_id.clone())),
        Some(status) if !status.is_success() => Err(EnrichmentError::Failed { status }),
        _ => Ok(response.payload()),
    }
}

/// Copy the selected paths of `payload` into a fresh object.
fn select_fields(payload: Option<&Value>, selector: &FieldSelector) -> Value {
    let mut selected = Value::Object(Map::new());
    let Some(payload) = payload else {
        return selected;
    };
    for path in selector.paths() {
        if let Some(value) = lookup_path(payload, path) {
            set_path(&mut selected, path, value.clone());
        }
    }
    selected
}

fn set_path(root: &mut Value, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };
    let mut current = root;
    for segment in parents {
        let Value::Object(map) = current else {
            return;
        };
        current = map
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if let Value::Object(map) = current {
        map.insert(last.to_string(), value);
    }
}
