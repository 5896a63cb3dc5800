// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::domain::agent::AgentName;
use crate::domain::collation::Phase;
use crate::domain::disruption::DisruptionId;
use crate::domain::invocation::AgentErrorKind;

/// Phase-progress events for one disruption, streamed on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    DisruptionReceived {
        disruption_id: DisruptionId,
        request_id: String,
        flight_number: String,
        received_at: DateTime<Utc>,
    },
    PhaseStarted {
        disruption_id: DisruptionId,
        phase: Phase,
        agents: Vec<AgentName>,
        started_at: DateTime<Utc>,
    },
    AgentInvocationStarted {
        disruption_id: DisruptionId,
        phase: Phase,
        agent: AgentName,
        invocation_index: u32,
        started_at: DateTime<Utc>,
    },
    AgentResponded {
        disruption_id: DisruptionId,
        phase: Phase,
        agent: AgentName,
        confidence: f64,
        candidate_count: usize,
        constraint_count: usize,
        completed_at: DateTime<Utc>,
    },
    AgentUnavailable {
        disruption_id: DisruptionId,
        phase: Phase,
        agent: AgentName,
        error_kind: AgentErrorKind,
        message: String,
        failed_at: DateTime<Utc>,
    },
    PhaseCompleted {
        disruption_id: DisruptionId,
        phase: Phase,
        responded: usize,
        unavailable: usize,
        completed_at: DateTime<Utc>,
    },
    ArbitrationCompleted {
        disruption_id: DisruptionId,
        solution_count: usize,
        conflict_count: usize,
        override_count: usize,
        decided_at: DateTime<Utc>,
    },
    ArbitrationFailed {
        disruption_id: DisruptionId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    DecisionPersisted {
        disruption_id: DisruptionId,
        record_id: String,
        location: String,
        persisted_at: DateTime<Utc>,
    },
    PersistenceFailed {
        disruption_id: DisruptionId,
        record_id: String,
        error: String,
        failed_at: DateTime<Utc>,
    },
    OrchestrationCancelled {
        disruption_id: DisruptionId,
        phase: Phase,
        cancelled_at: DateTime<Utc>,
    },
}

impl OrchestrationEvent {
    pub fn disruption_id(&self) -> DisruptionId {
        match self {
            OrchestrationEvent::DisruptionReceived { disruption_id, .. }
            | OrchestrationEvent::PhaseStarted { disruption_id, .. }
            | OrchestrationEvent::AgentInvocationStarted { disruption_id, .. }
            | OrchestrationEvent::AgentResponded { disruption_id, .. }
            | OrchestrationEvent::AgentUnavailable { disruption_id, .. }
            | OrchestrationEvent::PhaseCompleted { disruption_id, .. }
            | OrchestrationEvent::ArbitrationCompleted { disruption_id, .. }
            | OrchestrationEvent::ArbitrationFailed { disruption_id, .. }
            | OrchestrationEvent::DecisionPersisted { disruption_id, .. }
            | OrchestrationEvent::PersistenceFailed { disruption_id, .. }
            | OrchestrationEvent::OrchestrationCancelled { disruption_id, .. } => *disruption_id,
        }
    }
}
