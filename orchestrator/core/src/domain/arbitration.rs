// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Arbitration Records
//!
//! Value objects produced by the arbitrator. An [`ArbitratorOutput`] is
//! created once per arbitration run and never mutated; a failed run produces
//! an [`ArbitrationFailure`] instead and no output at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::agent::AgentName;
use crate::domain::disruption::DisruptionId;
use crate::domain::policy::CriteriaWeights;
use crate::domain::recommendation::{BindingConstraint, RecoveryAction};

/// Binding constraint extracted from a safety-class response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyOverride {
    pub source_agent: AgentName,
    pub revision: u8,
    pub constraint: BindingConstraint,
}

/// Reference to one candidate solution of one agent's latest response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateRef {
    pub agent: AgentName,
    pub candidate_id: String,
}

impl fmt::Display for CandidateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.agent, self.candidate_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub candidate: CandidateRef,
    pub violated: Vec<SafetyOverride>,
}

/// Per-criterion normalized scores in [0, 1] and the weighted aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub safety: f64,
    pub cost: f64,
    pub passenger: f64,
    pub network: f64,
    pub reputation: f64,
    pub aggregate: f64,
    /// Raw cost, used by the tie-break.
    pub cost_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictReason {
    /// Same source tail swapped to different aircraft.
    AircraftAssignment { tail_number: String },
    /// Same replacement aircraft claimed for different source tails.
    ReplacementAircraft { tail_number: String },
    /// Same crew member replaced by different people.
    CrewAssignment { crew_id: String },
    /// One candidate cancels, the other operates.
    CancelVersusOperate,
    /// Different total delays.
    Timeline { left_delay_minutes: u64, right_delay_minutes: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseIncompatibility {
    pub left: CandidateRef,
    pub right: CandidateRef,
    pub reasons: Vec<ConflictReason>,
}

/// Group of mutually incompatible candidates from different agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDetail {
    pub conflict_id: String,
    /// Members in invocation order.
    pub candidates: Vec<CandidateRef>,
    pub incompatibilities: Vec<PairwiseIncompatibility>,
}

/// The comparison step that separated the winner from the runner-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecidingRule {
    WeightedScore,
    SafetyScore,
    LowerCost,
    InvocationOrder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub candidate: CandidateRef,
    pub score: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDetail {
    pub conflict_id: String,
    pub winner: CandidateRef,
    pub deciding_rule: DecidingRule,
    pub rationale: String,
    /// Every competing candidate, best first.
    pub scores: Vec<CandidateScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepKind {
    Execute { action: RecoveryAction },
    VerifyConstraint { constraint: BindingConstraint },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryStep {
    pub sequence: u32,
    pub owner: AgentName,
    pub description: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    pub steps: Vec<RecoveryStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySolution {
    pub rank: u32,
    pub candidate: CandidateRef,
    pub title: String,
    pub score: ScoreBreakdown,
    pub plan: RecoveryPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

impl AuditEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            message: message.into(),
        }
    }
}

/// Final decision for one disruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitratorOutput {
    pub disruption_id: DisruptionId,
    pub solutions: Vec<RecoverySolution>,
    pub conflicts: Vec<ConflictDetail>,
    pub resolutions: Vec<ResolutionDetail>,
    pub safety_overrides: Vec<SafetyOverride>,
    pub rejected: Vec<RejectedCandidate>,
    pub unavailable_agents: Vec<AgentName>,
    pub weights: CriteriaWeights,
    pub audit_trail: Vec<AuditEntry>,
    pub decided_at: DateTime<Utc>,
}

impl ArbitratorOutput {
    pub fn top(&self) -> Option<&RecoverySolution> {
        self.solutions.first()
    }
}

/// Terminal record of an arbitration that could not produce a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitrationFailure {
    pub disruption_id: DisruptionId,
    pub reason: String,
    pub safety_overrides: Vec<SafetyOverride>,
    pub rejected: Vec<RejectedCandidate>,
    pub unavailable_agents: Vec<AgentName>,
    pub audit_trail: Vec<AuditEntry>,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ArbitrationError {
    #[error("no safety-compliant solution: {}", .0.reason)]
    NoSafetyCompliantSolution(Box<ArbitrationFailure>),
}

impl ArbitrationError {
    pub fn failure(&self) -> &ArbitrationFailure {
        match self {
            ArbitrationError::NoSafetyCompliantSolution(f) => f,
        }
    }

    pub fn into_failure(self) -> ArbitrationFailure {
        match self {
            ArbitrationError::NoSafetyCompliantSolution(f) => *f,
        }
    }
}

/// Terminal state of one arbitration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DecisionOutcome {
    Decided { output: ArbitratorOutput },
    Failed { failure: ArbitrationFailure },
}

impl DecisionOutcome {
    pub fn output(&self) -> Option<&ArbitratorOutput> {
        match self {
            DecisionOutcome::Decided { output } => Some(output),
            DecisionOutcome::Failed { .. } => None,
        }
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, DecisionOutcome::Decided { .. })
    }
}

impl From<Result<ArbitratorOutput, ArbitrationError>> for DecisionOutcome {
    fn from(result: Result<ArbitratorOutput, ArbitrationError>) -> Self {
        match result {
            Ok(output) => DecisionOutcome::Decided { output },
            Err(e) => DecisionOutcome::Failed { failure: e.into_failure() },
        }
    }
}
