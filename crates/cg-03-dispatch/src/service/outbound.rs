//! # Outbound Dispatch
//!
//! Publishes one signal to every eligible target of the connection and
//! answers each requested label a target issues with exactly one
//! acknowledgement: success, failure or weak.
//!
//! ## Flow
//!
//! 1. Candidates: targets subscribed to the signal's topic and allowed to
//!    read it.
//! 2. Filters of unenriched subscriptions are evaluated up front; excluded
//!    targets get a weak acknowledgement.
//! 3. The rest is grouped by mapper list and enrichment selector. Each group
//!    is mapped once and the messages are replicated to its members.
//! 4. Unenriched groups publish first. Enriched groups wait for the
//!    enrichment round-trip, then evaluate their filters on the enriched
//!    signal.
//!
//! | Situation                              | Acknowledgement     |
//! |----------------------------------------|---------------------|
//! | all messages published                 | 200                 |
//! | filter excluded the target             | weak                |
//! | mappers produced nothing               | weak                |
//! | address or header mapping unresolvable | weak                |
//! | mapper error, nothing mapped           | failed, error status|
//! | enrichment failed                      | failed, its status  |
//! | publish failed or timed out            | failed, its status  |

use crate::domain::{address_messages, filter_admits};
use crate::error::PublishError;
use crate::metrics::DispatchMetrics;
use crate::ports::{Destination, Publisher};
use crate::service::enrichment::EnrichmentCache;
use cg_01_mapping::{group_targets, MappingOutcome, OutboundMappingStage, PlaceholderContext};
use cg_02_acknowledgements::{weak_acknowledgements, AcknowledgementAggregator, AcknowledgementsConfig};
use futures::future::join_all;
use shared_types::{
    AckLabel, Acknowledgement, Acknowledgements, AuthorizationContext, Connection, ExternalMessage,
    FieldSelector, FilteredTopic, Signal, StatusCode, Target,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A target the signal may reach.
#[derive(Debug, Clone)]
struct Candidate {
    index: usize,
    target: Arc<Target>,
    subscription: FilteredTopic,
}

impl Candidate {
    fn label(&self) -> Option<&AckLabel> {
        self.target.issued_ack_label.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Published,
    Weak(&'static str),
    Failed(StatusCode),
}

pub struct OutboundDispatcher {
    connection: Arc<Connection>,
    mapping: Arc<OutboundMappingStage>,
    publisher: Arc<dyn Publisher>,
    enrichment: Arc<EnrichmentCache>,
    acknowledgements: AcknowledgementsConfig,
    metrics: Arc<DispatchMetrics>,
}

impl OutboundDispatcher {
    pub fn new(
        connection: Arc<Connection>,
        mapping: Arc<OutboundMappingStage>,
        publisher: Arc<dyn Publisher>,
        enrichment: Arc<EnrichmentCache>,
        acknowledgements: AcknowledgementsConfig,
        metrics: Arc<DispatchMetrics>,
    ) -> Self {
        Self {
            connection,
            mapping,
            publisher,
            enrichment,
            acknowledgements,
            metrics,
        }
    }

    /// Publish `signal` and collect the acknowledgements of its targets.
    ///
    /// The result holds one entry per requested label issued by a
    /// candidate target. `live-response` is never part of it.
    pub async fn dispatch(&self, signal: &Signal) -> Acknowledgements {
        let candidates = self.candidates(signal);
        let requested = signal.requested_acks().unwrap_or_else(|e| {
            warn!(
                correlation_id = ?signal.correlation_id(),
                error = %e,
                "Ignoring invalid requested acknowledgements"
            );
            Vec::new()
        });
        let expected: Vec<AckLabel> = candidates
            .iter()
            .filter_map(Candidate::label)
            .filter(|label| !label.is_live_response() && requested.contains(label))
            .cloned()
            .collect();
        let mut aggregator = AcknowledgementAggregator::new(
            signal.entity_id().clone(),
            expected,
            signal.headers().clone(),
        );

        let ctx = PlaceholderContext::new()
            .with_signal(signal)
            .with_connection(self.connection.id());
        let mut admitted = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if candidate.subscription.enrichment().is_none()
                && !filter_admits(&candidate.subscription, &ctx)
            {
                self.record(&mut aggregator, signal, &candidate, Delivery::Weak("excluded by filter"));
            } else {
                admitted.push(candidate);
            }
        }

        let mut groups = group_targets(admitted, |c| {
            (
                c.target.payload_mapping.clone(),
                c.subscription.enrichment().cloned(),
            )
        });
        // stable: unenriched groups keep their order and go first
        groups.sort_by_key(|g| g.enrichment.is_some());

        for group in groups {
            let deliveries = match &group.enrichment {
                None => self.deliver_group(signal, &group.mapping, group.members).await,
                Some(selector) => {
                    self.deliver_enriched(signal, selector, &group.mapping, group.members)
                        .await
                }
            };
            for (candidate, delivery) in &deliveries {
                self.record(&mut aggregator, signal, candidate, *delivery);
            }
        }

        let acknowledgements = aggregator.build();
        debug!(
            correlation_id = ?signal.correlation_id(),
            signal = %signal.name(),
            acknowledgements = acknowledgements.len(),
            "Outbound signal dispatched"
        );
        acknowledgements
    }

    fn candidates(&self, signal: &Signal) -> Vec<Candidate> {
        self.connection
            .targets()
            .iter()
            .enumerate()
            .filter_map(|(index, target)| {
                let subscription = target.subscription_for(signal)?;
                if !target.is_authorized_for(signal) {
                    debug!(
                        correlation_id = ?signal.correlation_id(),
                        target = %target.address,
                        "Target not authorized to read signal"
                    );
                    return None;
                }
                Some(Candidate {
                    index,
                    target: Arc::clone(target),
                    subscription: subscription.clone(),
                })
            })
            .collect()
    }

    /// Enrich once per distinct authorization context of the group, then
    /// filter and publish on the enriched signal.
    async fn deliver_enriched(
        &self,
        signal: &Signal,
        selector: &FieldSelector,
        mapping: &[String],
        members: Vec<Candidate>,
    ) -> Vec<(Candidate, Delivery)> {
        let mut by_auth: Vec<(AuthorizationContext, Vec<Candidate>)> = Vec::new();
        for member in members {
            match by_auth
                .iter_mut()
                .find(|(auth, _)| auth == &member.target.auth_context)
            {
                Some((_, same)) => same.push(member),
                None => by_auth.push((member.target.auth_context.clone(), vec![member])),
            }
        }

        let mut deliveries = Vec::new();
        for (auth_context, members) in by_auth {
            let enriched = match self.enrichment.enrich(signal, selector, &auth_context).await {
                Ok(enriched) => enriched,
                Err(e) => {
                    let status = e.status();
                    deliveries.extend(members.into_iter().map(|m| (m, Delivery::Failed(status))));
                    continue;
                }
            };

            let ctx = PlaceholderContext::new()
                .with_signal(&enriched)
                .with_connection(self.connection.id());
            let (admitted, excluded): (Vec<_>, Vec<_>) = members
                .into_iter()
                .partition(|m| filter_admits(&m.subscription, &ctx));
            deliveries.extend(
                excluded
                    .into_iter()
                    .map(|m| (m, Delivery::Weak("excluded by filter"))),
            );
            deliveries.extend(self.deliver_group(&enriched, mapping, admitted).await);
        }
        deliveries
    }

    /// Map `signal` once and publish the result to every member.
    async fn deliver_group(
        &self,
        signal: &Signal,
        mapping: &[String],
        members: Vec<Candidate>,
    ) -> Vec<(Candidate, Delivery)> {
        if members.is_empty() {
            return Vec::new();
        }

        let mut messages: Vec<ExternalMessage> = Vec::new();
        let mut failure = None;
        for outcome in self.mapping.process(signal, mapping) {
            match outcome {
                MappingOutcome::Mapped { mapped, .. } => messages.extend(mapped),
                MappingOutcome::Dropped { .. } => {}
                MappingOutcome::Error { error, .. } => {
                    failure.get_or_insert(error.status());
                }
            }
        }
        if messages.is_empty() {
            let delivery = match failure {
                Some(status) => Delivery::Failed(status),
                None => Delivery::Weak("dropped by payload mapping"),
            };
            return members.into_iter().map(|m| (m, delivery)).collect();
        }

        let ctx = PlaceholderContext::new()
            .with_signal(signal)
            .with_connection(self.connection.id());
        let timeout = self
            .acknowledgements
            .effective_timeout(signal.headers().timeout().ok().flatten());
        let messages = &messages;
        join_all(members.into_iter().map(|member| async move {
            let delivery = self.publish_to(&member, messages, ctx, timeout).await;
            (member, delivery)
        }))
        .await
    }

    async fn publish_to(
        &self,
        member: &Candidate,
        messages: &[ExternalMessage],
        ctx: PlaceholderContext<'_>,
        timeout: Duration,
    ) -> Delivery {
        let addressed = match address_messages(
            &member.target.address,
            &member.target.header_mapping,
            messages,
            &ctx,
        ) {
            Ok(addressed) => addressed,
            Err(e) => {
                debug!(
                    target = %member.target.address,
                    error = %e,
                    "Target address or header mapping unresolved"
                );
                return Delivery::Weak("target address unresolved");
            }
        };

        for item in addressed {
            let destination = Destination::Target {
                index: member.index,
                address: item.address,
            };
            let result = tokio::time::timeout(timeout, self.publisher.publish(item.message, &destination))
                .await
                .unwrap_or_else(|_| {
                    Err(PublishError::Timeout {
                        address: destination.address().to_string(),
                    })
                });
            match result {
                Ok(()) => DispatchMetrics::incr(&self.metrics.outbound_published),
                Err(e) => {
                    DispatchMetrics::incr(&self.metrics.outbound_publish_failures);
                    warn!(
                        target = %destination.address(),
                        error = %e,
                        "Publishing to target failed"
                    );
                    return Delivery::Failed(e.status());
                }
            }
        }
        Delivery::Published
    }

    fn record(
        &self,
        aggregator: &mut AcknowledgementAggregator,
        signal: &Signal,
        candidate: &Candidate,
        delivery: Delivery,
    ) {
        let Some(label) = candidate.label() else {
            return;
        };
        let entity_id = signal.entity_id().clone();
        match delivery {
            Delivery::Published => {
                aggregator.add(Acknowledgement::new(
                    label.clone(),
                    entity_id,
                    StatusCode::OK,
                    signal.headers().clone(),
                ));
            }
            Delivery::Weak(reason) => {
                for ack in weak_acknowledgements(signal, std::iter::once(label), reason) {
                    if aggregator.add(ack) {
                        DispatchMetrics::incr(&self.metrics.weak_acks);
                    }
                }
            }
            Delivery::Failed(status) => {
                aggregator.add(Acknowledgement::new(
                    label.clone(),
                    entity_id,
                    status,
                    signal.headers().clone(),
                ));
            }
        }
    }
}
