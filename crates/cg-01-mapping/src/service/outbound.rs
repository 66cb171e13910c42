//! # Outbound Mapping Stage
//!
//! Maps one signal with a target's mapper list. Each mapper maps the signal
//! independently; their results are concatenated in list order.
//!
//! Targets sharing the same mapper list and enrichment selector form a group
//! so the signal is mapped once per group, not once per target.

use crate::domain::{MappingConfig, MappingOutcome, PlaceholderContext};
use crate::error::MappingError;
use crate::metrics::MappingMetrics;
use crate::service::panic_message;
use crate::service::registry::MapperRegistry;
use shared_types::{ExternalMessage, FieldSelector, Signal};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of outbound mapping: the external messages one mapper produced.
pub type OutboundOutcome = MappingOutcome<Vec<ExternalMessage>>;

/// Targets that share a mapper list and enrichment selector.
#[derive(Debug, Clone)]
pub struct TargetGroup<T> {
    pub mapping: Vec<String>,
    pub enrichment: Option<FieldSelector>,
    pub members: Vec<T>,
}

/// Group members by effective mapper list and enrichment selector, keeping
/// first-appearance order of groups and members.
pub fn group_targets<T>(
    members: impl IntoIterator<Item = T>,
    key: impl Fn(&T) -> (Vec<String>, Option<FieldSelector>),
) -> Vec<TargetGroup<T>> {
    let mut groups: Vec<TargetGroup<T>> = Vec::new();
    for member in members {
        let (mapping, enrichment) = key(&member);
        let mapping = MapperRegistry::effective_names(&mapping);
        match groups
            .iter_mut()
            .find(|g| g.mapping == mapping && g.enrichment == enrichment)
        {
            Some(group) => group.members.push(member),
            None => groups.push(TargetGroup {
                mapping,
                enrichment,
                members: vec![member],
            }),
        }
    }
    groups
}

pub struct OutboundMappingStage {
    registry: Arc<MapperRegistry>,
    max_mapped: usize,
    metrics: Arc<MappingMetrics>,
}

impl OutboundMappingStage {
    pub fn new(registry: Arc<MapperRegistry>, config: &MappingConfig, metrics: Arc<MappingMetrics>) -> Self {
        Self {
            registry,
            max_mapped: config.max_mapped_outbound_messages,
            metrics,
        }
    }

    /// Map `signal` with every mapper of `mapping`, in list order.
    pub fn process(&self, signal: &Signal, mapping: &[String]) -> Vec<OutboundOutcome> {
        let names = MapperRegistry::effective_names(mapping);
        let ctx = PlaceholderContext::new()
            .with_signal(signal)
            .with_connection(self.registry.connection_id());

        let mut outcomes = Vec::with_capacity(names.len());
        for name in &names {
            let outcome = match self.apply(name, signal, &ctx) {
                Some(outcome) => outcome,
                None => {
                    self.metrics.record_skipped();
                    continue;
                }
            };
            self.metrics.record_outbound(&outcome);
            outcomes.push(outcome);
        }
        outcomes
    }

    fn apply(&self, name: &str, signal: &Signal, ctx: &PlaceholderContext<'_>) -> Option<OutboundOutcome> {
        let mut mapper = match self.registry.instantiate(name) {
            Ok(mapper) => mapper,
            Err(e) => return Some(error_outcome(name, e.into(), signal)),
        };
        if mapper.is_blocked(signal.headers().content_type()) {
            return None;
        }
        match mapper.outgoing_conditions_hold(ctx) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => return Some(error_outcome(name, e, signal)),
        }

        let result = catch_unwind(AssertUnwindSafe(|| mapper.mapper_mut().map_outbound(signal)));
        Some(match result {
            Err(panic) => error_outcome(
                name,
                MappingError::Panicked {
                    mapper: name.to_string(),
                    message: panic_message(panic.as_ref()),
                },
                signal,
            ),
            Ok(Err(e)) => error_outcome(name, e, signal),
            Ok(Ok(messages)) if messages.is_empty() => {
                debug!(
                    mapper = %name,
                    correlation_id = ?signal.correlation_id(),
                    signal = %signal.name(),
                    "Mapper dropped outbound signal"
                );
                MappingOutcome::Dropped {
                    mapper_id: name.to_string(),
                    message: None,
                }
            }
            Ok(Ok(messages)) if messages.len() > self.max_mapped => error_outcome(
                name,
                MappingError::TooManyMessages {
                    mapper: name.to_string(),
                    produced: messages.len(),
                    max: self.max_mapped,
                },
                signal,
            ),
            Ok(Ok(messages)) => MappingOutcome::Mapped {
                mapper_id: name.to_string(),
                mapped: messages,
            },
        })
    }
}

fn error_outcome(mapper_id: &str, error: MappingError, signal: &Signal) -> OutboundOutcome {
    warn!(
        mapper = %mapper_id,
        correlation_id = ?signal.correlation_id(),
        error = %error,
        "Outbound mapping failed"
    );
    MappingOutcome::Error {
        mapper_id: mapper_id.to_string(),
        topic: Some(signal.topic_path().to_string()),
        error,
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{ConnectionId, EntityId, MappingDefinition};
    use std::collections::BTreeMap;

    fn stage() -> OutboundMappingStage {
        let mut definitions = BTreeMap::new();
        definitions.insert(
            "implicit".to_string(),
            MappingDefinition {
                engine: "ImplicitThingCreation".into(),
                options: serde_json::json!({"thing": {"thingId": "a:b"}})
                    .as_object()
                    .cloned()
                    .unwrap_or_default(),
                ..MappingDefinition::default()
            },
        );
        let mut filtered = MappingDefinition {
            engine: "Ditto".into(),
            ..MappingDefinition::default()
        };
        filtered
            .outgoing_conditions
            .insert("live-only".into(), r#"eq(topic:channel,"live")"#.into());
        definitions.insert("live-ditto".to_string(), filtered);

        let registry =
            MapperRegistry::with_builtins(ConnectionId::parse("conn").unwrap(), &definitions).unwrap();
        OutboundMappingStage::new(Arc::new(registry), &MappingConfig::default(), Arc::new(MappingMetrics::new()))
    }

    fn event() -> Signal {
        Signal::event("thingModified", EntityId::parse("ns:t").unwrap())
    }

    #[test]
    fn test_results_concatenate_in_order() {
        let outcomes = stage().process(&event(), &["Ditto".into(), "implicit".into()]);
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_mapped());
        assert!(outcomes[1].is_dropped());
    }

    #[test]
    fn test_condition_skips_mapper() {
        let outcomes = stage().process(&event(), &["live-ditto".into()]);
        assert!(outcomes.is_empty());
    }

    #[test]
    fn test_grouping_by_mapping_and_selector() {
        let members = vec![
            ("t1", vec!["A".to_string()], None),
            ("t2", vec!["A".to_string()], None),
            ("t3", vec!["A".to_string(), "B".to_string()], None),
            ("t4", vec!["A".to_string()], Some(FieldSelector::parse("attributes"))),
            ("t5", vec![], None),
            ("t6", vec!["Ditto".to_string()], None),
        ];
        let groups = group_targets(members, |(_, mapping, selector)| (mapping.clone(), selector.clone()));
        let names: Vec<Vec<&str>> = groups
            .iter()
            .map(|g| g.members.iter().map(|(n, _, _)| *n).collect())
            .collect();
        assert_eq!(names, vec![vec!["t1", "t2"], vec!["t3"], vec!["t4"], vec!["t5", "t6"]]);
    }
}
