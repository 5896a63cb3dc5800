// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Phase Runner
//!
//! Concurrent fan-out / fan-in of agent invocations for one phase.
//!
//! - Every request runs in its own tokio task with an independent copy of
//!   its context, so the phase takes as long as the slowest agent.
//! - Each invocation carries its own timeout; a timeout is recorded like
//!   any other invocation failure.
//! - One agent's failure never aborts its siblings.
//! - Outcomes are returned in invocation-start order, whatever the
//!   completion order was.
//! - On cancellation, in-flight tasks are aborted and the outcomes received
//!   so far are returned.

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::agent::AgentName;
use crate::domain::collation::Phase;
use crate::domain::disruption::DisruptionId;
use crate::domain::events::OrchestrationEvent;
use crate::domain::invocation::{AgentError, AgentInvocationRequest, AgentInvoker};
use crate::domain::recommendation::{AgentAnalysis, AgentResponse};
use crate::infrastructure::event_bus::EventBus;

/// Raw result of one invocation, before collation.
#[derive(Debug, Clone)]
pub struct InvocationOutcome {
    pub agent: AgentName,
    pub phase: Phase,
    pub invocation_index: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub result: Result<AgentResponse, AgentError>,
}

#[derive(Debug)]
pub struct PhaseResult {
    pub phase: Phase,
    /// In invocation-start order.
    pub outcomes: Vec<InvocationOutcome>,
    pub cancelled: bool,
}

pub struct PhaseRunner {
    invoker: Arc<dyn AgentInvoker>,
    event_bus: Arc<EventBus>,
    agent_timeout: Duration,
}

impl PhaseRunner {
    pub fn new(invoker: Arc<dyn AgentInvoker>, event_bus: Arc<EventBus>, agent_timeout: Duration) -> Self {
        Self {
            invoker,
            event_bus,
            agent_timeout,
        }
    }

    /// Invoke every request concurrently. `first_index` is the invocation
    /// index assigned to the first request; the rest follow in order.
    pub async fn run(
        &self,
        disruption_id: DisruptionId,
        phase: Phase,
        requests: Vec<AgentInvocationRequest>,
        first_index: u32,
        cancel: &CancellationToken,
    ) -> PhaseResult {
        let agents: Vec<AgentName> = requests.iter().map(|r| r.agent).collect();
        info!(%disruption_id, %phase, agents = agents.len(), "Phase started");
        self.event_bus.publish(OrchestrationEvent::PhaseStarted {
            disruption_id,
            phase,
            agents: agents.clone(),
            started_at: Utc::now(),
        });

        let mut in_flight = FuturesUnordered::new();
        let mut abort_handles = Vec::with_capacity(requests.len());

        for (offset, request) in requests.into_iter().enumerate() {
            let agent = request.agent;
            let invocation_index = first_index + offset as u32;
            let started_at = Utc::now();

            self.event_bus.publish(OrchestrationEvent::AgentInvocationStarted {
                disruption_id,
                phase,
                agent,
                invocation_index,
                started_at,
            });

            let invoker = self.invoker.clone();
            let timeout = self.agent_timeout;
            let handle = tokio::spawn(async move {
                let result = invoke_with_timeout(invoker.as_ref(), request, timeout).await;
                (result, Utc::now())
            });
            abort_handles.push(handle.abort_handle());

            in_flight.push(async move { (agent, invocation_index, started_at, handle.await) });
        }

        let mut outcomes = Vec::with_capacity(abort_handles.len());
        let mut cancelled = false;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(%disruption_id, %phase, pending = in_flight.len(), "Phase cancelled, aborting in-flight agents");
                    for handle in &abort_handles {
                        handle.abort();
                    }
                    cancelled = true;
                    break;
                }
                next = in_flight.next() => {
                    let Some((agent, invocation_index, started_at, joined)) = next else {
                        break;
                    };
                    let (result, completed_at) = match joined {
                        Ok((result, completed_at)) => (result, completed_at),
                        Err(e) => (
                            Err(AgentError::Invocation(format!("agent task failed: {}", e))),
                            Utc::now(),
                        ),
                    };
                    let outcome = self.accept(
                        disruption_id,
                        phase,
                        agent,
                        invocation_index,
                        started_at,
                        completed_at,
                        result,
                    );
                    outcomes.push(outcome);
                }
            }
        }

        outcomes.sort_by_key(|o| o.invocation_index);

        let responded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        let unavailable = outcomes.len() - responded;
        info!(%disruption_id, %phase, responded, unavailable, cancelled, "Phase completed");
        if !cancelled {
            self.event_bus.publish(OrchestrationEvent::PhaseCompleted {
                disruption_id,
                phase,
                responded,
                unavailable,
                completed_at: Utc::now(),
            });
        }

        PhaseResult {
            phase,
            outcomes,
            cancelled,
        }
    }

    /// Validate and stamp one result, emitting progress events and metrics.
    #[allow(clippy::too_many_arguments)]
    fn accept(
        &self,
        disruption_id: DisruptionId,
        phase: Phase,
        agent: AgentName,
        invocation_index: u32,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        result: Result<AgentAnalysis, AgentError>,
    ) -> InvocationOutcome {
        let result = result.and_then(|analysis| {
            analysis
                .validate(agent)
                .map_err(|e| AgentError::OutputValidation(e.to_string()))?;
            Ok(AgentResponse {
                agent,
                revision: phase.revision(),
                analysis,
                started_at,
                completed_at,
            })
        });

        let elapsed = (completed_at - started_at).to_std().unwrap_or_default();
        metrics::histogram!("skymarshal_agent_invocation_seconds", "agent" => agent.as_str())
            .record(elapsed.as_secs_f64());

        match &result {
            Ok(response) => {
                debug!(%disruption_id, %agent, %phase, "Agent responded");
                metrics::counter!(
                    "skymarshal_agent_invocations_total",
                    "agent" => agent.as_str(),
                    "phase" => phase.to_string(),
                    "outcome" => "responded"
                )
                .increment(1);
                self.event_bus.publish(OrchestrationEvent::AgentResponded {
                    disruption_id,
                    phase,
                    agent,
                    confidence: response.analysis.confidence,
                    candidate_count: response.analysis.candidates.len(),
                    constraint_count: response.analysis.binding_constraints.len(),
                    completed_at,
                });
            }
            Err(e) => {
                warn!(%disruption_id, %agent, %phase, error = %e, "Agent unavailable");
                metrics::counter!(
                    "skymarshal_agent_invocations_total",
                    "agent" => agent.as_str(),
                    "phase" => phase.to_string(),
                    "outcome" => e.kind().to_string()
                )
                .increment(1);
                self.event_bus.publish(OrchestrationEvent::AgentUnavailable {
                    disruption_id,
                    phase,
                    agent,
                    error_kind: e.kind(),
                    message: e.to_string(),
                    failed_at: completed_at,
                });
            }
        }

        InvocationOutcome {
            agent,
            phase,
            invocation_index,
            started_at,
            completed_at,
            result,
        }
    }
}

async fn invoke_with_timeout(
    invoker: &dyn AgentInvoker,
    request: AgentInvocationRequest,
    timeout: Duration,
) -> Result<AgentAnalysis, AgentError> {
    match tokio::time::timeout(timeout, invoker.invoke(request)).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::disruption::{DisruptionPayload, DisruptionType, FlightIdentity};
    use crate::domain::recommendation::{DomainOutput, NetworkOutput};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct SlowInvoker;

    #[async_trait]
    impl AgentInvoker for SlowInvoker {
        async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentAnalysis, AgentError> {
            // Earlier agents finish later, to exercise fan-in reordering.
            let delay = match request.agent {
                AgentName::Network => 40,
                AgentName::Cargo => 1,
                _ => 10,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            match request.agent {
                AgentName::Network => Ok(AgentAnalysis {
                    recommendation: "hold".to_string(),
                    confidence: 0.5,
                    reasoning: String::new(),
                    binding_constraints: vec![],
                    candidates: vec![],
                    output: DomainOutput::Network(NetworkOutput::default()),
                }),
                AgentName::Finance => Err(AgentError::Invocation("tool error".to_string())),
                // Wrong domain variant
                _ => Ok(AgentAnalysis {
                    recommendation: "x".to_string(),
                    confidence: 0.5,
                    reasoning: String::new(),
                    binding_constraints: vec![],
                    candidates: vec![],
                    output: DomainOutput::Network(NetworkOutput::default()),
                }),
            }
        }
    }

    fn request(agent: AgentName) -> AgentInvocationRequest {
        let payload = DisruptionPayload {
            disruption_id: DisruptionId::new(),
            flight: FlightIdentity {
                flight_number: "BA117".to_string(),
                flight_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
                origin: "LHR".to_string(),
                destination: "JFK".to_string(),
                scheduled_departure: Utc::now(),
                tail_number: None,
                assigned_crew: vec![],
            },
            disruption_type: DisruptionType::Delay,
            description: "late inbound".to_string(),
            reported_at: Utc::now(),
            context: serde_json::Value::Null,
        };
        AgentInvocationRequest {
            agent,
            phase: Phase::Initial,
            flight: payload.flight_info(),
            disruption: payload,
            tools: agent.tools().to_vec(),
            peer_context: None,
        }
    }

    #[tokio::test]
    async fn test_outcomes_in_invocation_order_with_failures_classified() {
        let runner = PhaseRunner::new(
            Arc::new(SlowInvoker),
            Arc::new(EventBus::new(64)),
            Duration::from_secs(5),
        );
        let requests = vec![
            request(AgentName::Network),
            request(AgentName::Cargo),
            request(AgentName::Finance),
        ];
        let result = runner
            .run(DisruptionId::new(), Phase::Initial, requests, 0, &CancellationToken::new())
            .await;

        assert!(!result.cancelled);
        let agents: Vec<_> = result.outcomes.iter().map(|o| o.agent).collect();
        assert_eq!(agents, vec![AgentName::Network, AgentName::Cargo, AgentName::Finance]);
        assert_eq!(result.outcomes[0].result.as_ref().unwrap().revision, 1);
        assert!(matches!(result.outcomes[1].result, Err(AgentError::OutputValidation(_))));
        assert!(matches!(result.outcomes[2].result, Err(AgentError::Invocation(_))));
    }

    #[tokio::test]
    async fn test_timeout_recorded_per_agent() {
        let runner = PhaseRunner::new(
            Arc::new(SlowInvoker),
            Arc::new(EventBus::new(64)),
            Duration::from_millis(20),
        );
        let result = runner
            .run(
                DisruptionId::new(),
                Phase::Initial,
                vec![request(AgentName::Network), request(AgentName::Finance)],
                3,
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(result.outcomes[0].result, Err(AgentError::Timeout(_))));
        assert_eq!(result.outcomes[0].invocation_index, 3);
        assert!(matches!(result.outcomes[1].result, Err(AgentError::Invocation(_))));
    }

    #[tokio::test]
    async fn test_cancellation_keeps_received_outcomes() {
        let runner = PhaseRunner::new(
            Arc::new(SlowInvoker),
            Arc::new(EventBus::new(64)),
            Duration::from_secs(5),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = runner
            .run(
                DisruptionId::new(),
                Phase::Initial,
                vec![request(AgentName::Network), request(AgentName::Cargo)],
                0,
                &cancel,
            )
            .await;

        assert!(result.cancelled);
        let agents: Vec<_> = result.outcomes.iter().map(|o| o.agent).collect();
        assert_eq!(agents, vec![AgentName::Cargo]);
    }
}
