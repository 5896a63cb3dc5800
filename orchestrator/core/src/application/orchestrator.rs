// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Handle Disruption Use Case
//!
//! Application service driving one disruption through the full protocol.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** payload → Phase 1 → collate → Phase 2 → collate →
//!   arbitrate → persist
//! - **Collaborators:**
//!   - Domain: DisruptionPayload, Collation, DecisionOutcome
//!   - Application: PhaseRunner, Collator, Arbitrator
//!   - Infrastructure: AgentInvoker, DecisionStore, EventBus

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::application::arbitrator::Arbitrator;
use crate::application::collator::Collator;
use crate::application::phase::PhaseRunner;
use crate::domain::agent::AgentName;
use crate::domain::arbitration::DecisionOutcome;
use crate::domain::collation::{Collation, Phase};
use crate::domain::config::OrchestrationConfig;
use crate::domain::disruption::{DisruptionPayload, FlightInfo, PayloadError};
use crate::domain::events::OrchestrationEvent;
use crate::domain::invocation::{AgentInvocationRequest, AgentInvoker, PeerContext};
use crate::domain::policy::ArbitrationPolicy;
use crate::domain::repository::{DecisionRecord, DecisionStore};
use crate::infrastructure::event_bus::EventBus;

/// Outcome of writing the decision record. A failed write never invalidates
/// the decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Stored { location: String },
    Failed { warning: String },
}

/// Everything returned to the caller of one orchestration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReport {
    pub request_id: String,
    pub record_id: Uuid,
    pub collation: Collation,
    pub outcome: DecisionOutcome,
    pub persistence: PersistenceStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error("Invalid disruption payload: {0}")]
    InvalidPayload(#[from] PayloadError),

    /// Carries whatever was collated before cancellation.
    #[error("Orchestration cancelled during the {phase} phase")]
    Cancelled { phase: Phase, collation: Box<Collation> },
}

/// Handle Disruption Use Case
#[async_trait]
pub trait HandleDisruptionUseCase: Send + Sync {
    /// Run the full protocol for one disruption.
    ///
    /// # Errors
    ///
    /// - InvalidPayload: payload failed validation, no agent was invoked
    /// - Cancelled: the token fired; the partial collation is returned
    async fn handle(
        &self,
        payload: DisruptionPayload,
        request_id: String,
        cancel: &CancellationToken,
    ) -> Result<DecisionReport, OrchestrationError>;
}

pub struct DisruptionOrchestrator {
    phase_runner: PhaseRunner,
    collator: Collator,
    arbitrator: Arbitrator,
    decision_store: Arc<dyn DecisionStore>,
    event_bus: Arc<EventBus>,
    retry_unavailable_in_revision: bool,
}

impl DisruptionOrchestrator {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        decision_store: Arc<dyn DecisionStore>,
        event_bus: Arc<EventBus>,
        orchestration: &OrchestrationConfig,
        policy: ArbitrationPolicy,
    ) -> Self {
        Self {
            phase_runner: PhaseRunner::new(invoker, event_bus.clone(), orchestration.agent_timeout),
            collator: Collator::new(),
            arbitrator: Arbitrator::new(policy),
            decision_store,
            event_bus,
            retry_unavailable_in_revision: orchestration.retry_unavailable_in_revision,
        }
    }

    fn requests(
        payload: &DisruptionPayload,
        flight: &FlightInfo,
        phase: Phase,
        agents: &[AgentName],
        peer_source: Option<&Collation>,
    ) -> Vec<AgentInvocationRequest> {
        agents
            .iter()
            .map(|&agent| AgentInvocationRequest {
                agent,
                phase,
                disruption: payload.clone(),
                flight: flight.clone(),
                tools: agent.tools().to_vec(),
                peer_context: peer_source
                    .map(|collation| PeerContext::for_agent(collation, Phase::Initial, agent)),
            })
            .collect()
    }

    /// Agents re-invoked in the revision round.
    fn revision_agents(&self, collation: &Collation) -> Vec<AgentName> {
        let responded = collation.responded_in(Phase::Initial);
        AgentName::ALL
            .into_iter()
            .filter(|agent| responded.contains(agent) || self.retry_unavailable_in_revision)
            .filter(|agent| collation.get(*agent, Phase::Initial).is_some())
            .collect()
    }

    async fn run_phase(
        &self,
        payload: &DisruptionPayload,
        flight: &FlightInfo,
        phase: Phase,
        agents: &[AgentName],
        collation: &mut Collation,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestrationError> {
        let peer_source = match phase {
            Phase::Initial => None,
            Phase::Revision => Some(collation.clone()),
        };
        let requests = Self::requests(payload, flight, phase, agents, peer_source.as_ref());
        let first_index = collation.next_invocation_index();

        let result = self
            .phase_runner
            .run(collation.disruption_id, phase, requests, first_index, cancel)
            .await;
        self.collator.merge(collation, result.outcomes);

        if result.cancelled {
            warn!(disruption_id = %collation.disruption_id, %phase, "Orchestration cancelled");
            self.event_bus.publish(OrchestrationEvent::OrchestrationCancelled {
                disruption_id: collation.disruption_id,
                phase,
                cancelled_at: Utc::now(),
            });
            return Err(OrchestrationError::Cancelled {
                phase,
                collation: Box::new(collation.clone()),
            });
        }
        Ok(())
    }

    async fn persist(&self, record: &DecisionRecord) -> PersistenceStatus {
        let disruption_id = record.disruption_id;
        match self.decision_store.put(record).await {
            Ok(location) => {
                info!(%disruption_id, record_id = %record.record_id, %location, "Decision record stored");
                self.event_bus.publish(OrchestrationEvent::DecisionPersisted {
                    disruption_id,
                    record_id: record.record_id.to_string(),
                    location: location.clone(),
                    persisted_at: Utc::now(),
                });
                PersistenceStatus::Stored { location }
            }
            Err(e) => {
                warn!(%disruption_id, record_id = %record.record_id, error = %e, "Failed to store decision record");
                self.event_bus.publish(OrchestrationEvent::PersistenceFailed {
                    disruption_id,
                    record_id: record.record_id.to_string(),
                    error: e.to_string(),
                    failed_at: Utc::now(),
                });
                PersistenceStatus::Failed {
                    warning: format!("decision was not persisted: {}", e),
                }
            }
        }
    }
}

#[async_trait]
impl HandleDisruptionUseCase for DisruptionOrchestrator {
    async fn handle(
        &self,
        payload: DisruptionPayload,
        request_id: String,
        cancel: &CancellationToken,
    ) -> Result<DecisionReport, OrchestrationError> {
        payload.validate()?;

        let disruption_id = payload.disruption_id;
        let flight = payload.flight_info();
        let span = info_span!("disruption", %disruption_id, flight = %flight.flight_number, %request_id);

        async move {
            let started = Instant::now();
            info!(disruption_type = ?payload.disruption_type, "Disruption received");
            self.event_bus.publish(OrchestrationEvent::DisruptionReceived {
                disruption_id,
                request_id: request_id.clone(),
                flight_number: flight.flight_number.clone(),
                received_at: Utc::now(),
            });

            let mut collation = Collation::new(disruption_id);

            // Phase 1: independent recommendations
            self.run_phase(&payload, &flight, Phase::Initial, &AgentName::ALL, &mut collation, cancel)
                .await?;

            // Phase 2: revision with the Phase-1 collation as peer context
            let revision_agents = self.revision_agents(&collation);
            if revision_agents.is_empty() {
                info!("No agent eligible for revision; skipping revision round");
            } else {
                self.run_phase(&payload, &flight, Phase::Revision, &revision_agents, &mut collation, cancel)
                    .await?;
            }

            let outcome = DecisionOutcome::from(self.arbitrator.arbitrate(&collation, &flight));
            match &outcome {
                DecisionOutcome::Decided { output } => {
                    self.event_bus.publish(OrchestrationEvent::ArbitrationCompleted {
                        disruption_id,
                        solution_count: output.solutions.len(),
                        conflict_count: output.conflicts.len(),
                        override_count: output.safety_overrides.len(),
                        decided_at: output.decided_at,
                    });
                }
                DecisionOutcome::Failed { failure } => {
                    self.event_bus.publish(OrchestrationEvent::ArbitrationFailed {
                        disruption_id,
                        reason: failure.reason.clone(),
                        failed_at: failure.failed_at,
                    });
                }
            }

            let record = DecisionRecord::new(request_id.clone(), outcome, collation);
            let persistence = self.persist(&record).await;

            metrics::histogram!("skymarshal_orchestration_seconds")
                .record(started.elapsed().as_secs_f64());
            info!(
                decided = record.outcome.is_decided(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Disruption handled"
            );

            Ok::<_, OrchestrationError>(DecisionReport {
                request_id,
                record_id: record.record_id,
                collation: record.collation,
                outcome: record.outcome,
                persistence,
            })
        }
        .instrument(span)
        .await
    }
}
