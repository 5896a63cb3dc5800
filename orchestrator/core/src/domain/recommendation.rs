// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Recommendations
//!
//! What a domain agent produces for one disruption in one phase.
//!
//! - [`AgentAnalysis`] is the raw structured output returned by the invocation
//!   adapter. It is validated before it is accepted.
//! - [`AgentResponse`] is an accepted analysis stamped with agent identity,
//!   revision and timestamps. Responses are never mutated; a later revision
//!   supersedes an earlier one.
//! - [`DomainOutput`] is the per-domain payload, one variant per agent.
//! - Safety-class agents attach [`BindingConstraint`]s; business-class agents
//!   propose [`CandidateSolution`]s with an [`ImpactEstimate`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::agent::AgentName;

/// Longest total delay a candidate may propose.
pub const MAX_DELAY_MINUTES: u64 = 24 * 60;

// ── Domain outputs ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrewComplianceOutput {
    pub duty_limit_exceeded: bool,
    #[serde(default)]
    pub affected_crew: Vec<String>,
    #[serde(default)]
    pub remaining_duty_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MaintenanceOutput {
    pub airworthy: bool,
    #[serde(default)]
    pub defects: Vec<String>,
    #[serde(default)]
    pub estimated_repair_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegulatoryOutput {
    #[serde(default)]
    pub curfew_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub slot_restrictions: Vec<String>,
    #[serde(default)]
    pub notams: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NetworkOutput {
    #[serde(default)]
    pub downstream_flights: Vec<String>,
    #[serde(default)]
    pub spare_aircraft: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GuestExperienceOutput {
    pub passengers_affected: u32,
    #[serde(default)]
    pub connections_at_risk: u32,
    #[serde(default)]
    pub premium_passengers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CargoOutput {
    #[serde(default)]
    pub shipments_at_risk: Vec<String>,
    #[serde(default)]
    pub perishable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FinanceOutput {
    pub estimated_cost_usd: f64,
    #[serde(default)]
    pub compensation_exposure_usd: f64,
}

/// Per-domain output. The variant must match the agent that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum DomainOutput {
    CrewCompliance(CrewComplianceOutput),
    Maintenance(MaintenanceOutput),
    Regulatory(RegulatoryOutput),
    Network(NetworkOutput),
    GuestExperience(GuestExperienceOutput),
    Cargo(CargoOutput),
    Finance(FinanceOutput),
}

impl DomainOutput {
    pub fn agent(&self) -> AgentName {
        match self {
            DomainOutput::CrewCompliance(_) => AgentName::CrewCompliance,
            DomainOutput::Maintenance(_) => AgentName::Maintenance,
            DomainOutput::Regulatory(_) => AgentName::Regulatory,
            DomainOutput::Network(_) => AgentName::Network,
            DomainOutput::GuestExperience(_) => AgentName::GuestExperience,
            DomainOutput::Cargo(_) => AgentName::Cargo,
            DomainOutput::Finance(_) => AgentName::Finance,
        }
    }
}

// ── Constraints ───────────────────────────────────────────────────────────────

/// Hard requirement a candidate solution must satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ConstraintRule {
    /// The named crew member may not operate the flight.
    CrewMustBeReplaced { crew_id: String },
    /// The named aircraft may not operate the flight.
    AircraftGrounded { tail_number: String },
    /// The original aircraft needs at least this long before departure.
    MinimumDelay { minutes: u32 },
    /// Departure must not be later than this instant.
    LatestDeparture { at: DateTime<Utc> },
    /// No reroute through this airport.
    ProhibitedAirport { iata: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConstraint {
    #[serde(flatten)]
    pub rule: ConstraintRule,
    pub reason: String,
}

// ── Candidate solutions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RecoveryAction {
    AircraftSwap { from_tail: String, to_tail: String },
    CrewReassignment { crew_id: String, replacement_crew_id: String },
    Delay { minutes: u32 },
    Cancel,
    Reroute { via: String },
    RebookPassengers { passengers: u32 },
    OffloadCargo { shipment_ids: Vec<String> },
}

/// The originating agent's own estimate of a candidate's impact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactEstimate {
    /// 0.0 (unsafe margin) – 1.0 (full margin).
    pub safety_margin: f64,
    pub cost_usd: f64,
    #[serde(default)]
    pub passengers_affected: u32,
    #[serde(default)]
    pub downstream_flights_affected: u32,
    /// 0.0 (no risk) – 1.0 (severe).
    #[serde(default)]
    pub reputation_risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSolution {
    pub candidate_id: String,
    pub title: String,
    pub actions: Vec<RecoveryAction>,
    pub impact: ImpactEstimate,
}

impl CandidateSolution {
    pub fn is_cancellation(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, RecoveryAction::Cancel))
    }

    /// Sum of all delay actions. Widened so no sequence of delays can overflow.
    pub fn total_delay_minutes(&self) -> u64 {
        self.actions
            .iter()
            .map(|a| match a {
                RecoveryAction::Delay { minutes } => u64::from(*minutes),
                _ => 0,
            })
            .sum()
    }

    /// `(from_tail, to_tail)` for every swap.
    pub fn swaps(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().filter_map(|a| match a {
            RecoveryAction::AircraftSwap { from_tail, to_tail } => {
                Some((from_tail.as_str(), to_tail.as_str()))
            }
            _ => None,
        })
    }

    /// `(crew_id, replacement_crew_id)` for every reassignment.
    pub fn crew_reassignments(&self) -> impl Iterator<Item = (&str, &str)> {
        self.actions.iter().filter_map(|a| match a {
            RecoveryAction::CrewReassignment { crew_id, replacement_crew_id } => {
                Some((crew_id.as_str(), replacement_crew_id.as_str()))
            }
            _ => None,
        })
    }

    pub fn reroutes(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(|a| match a {
            RecoveryAction::Reroute { via } => Some(via.as_str()),
            _ => None,
        })
    }

    /// Aircraft that would operate the flight, or `None` when cancelled or
    /// the original tail is unknown.
    pub fn operating_tail(&self, scheduled_tail: Option<&str>) -> Option<String> {
        if self.is_cancellation() {
            return None;
        }
        let mut tail = scheduled_tail.map(str::to_string);
        for (from, to) in self.swaps() {
            if tail.as_deref().map_or(true, |t| t.eq_ignore_ascii_case(from)) {
                tail = Some(to.to_string());
            }
        }
        tail
    }
}

// ── Analysis and response ─────────────────────────────────────────────────────

/// Structured output of one agent invocation, before acceptance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAnalysis {
    pub recommendation: String,
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub binding_constraints: Vec<BindingConstraint>,
    #[serde(default)]
    pub candidates: Vec<CandidateSolution>,
    pub output: DomainOutput,
}

#[derive(Debug, Error, PartialEq)]
pub enum AnalysisValidationError {
    #[error("{agent} returned a {found} domain output")]
    DomainMismatch { agent: AgentName, found: AgentName },
    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
    #[error("candidate '{candidate}' has invalid {field}: {value}")]
    InvalidImpact { candidate: String, field: &'static str, value: f64 },
    #[error("business-class agent {0} declared binding constraints")]
    UnauthorizedConstraint(AgentName),
    #[error("duplicate candidate id '{0}'")]
    DuplicateCandidate(String),
    #[error("candidate '{0}' has no actions")]
    EmptyCandidate(String),
    #[error("candidate '{candidate}' delays the flight {minutes} min, more than {max}", max = MAX_DELAY_MINUTES)]
    DelayOutOfRange { candidate: String, minutes: u64 },
}

impl AgentAnalysis {
    /// Schema checks applied to every adapter result before it enters a
    /// collation.
    pub fn validate(&self, agent: AgentName) -> Result<(), AnalysisValidationError> {
        let found = self.output.agent();
        if found != agent {
            return Err(AnalysisValidationError::DomainMismatch { agent, found });
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(AnalysisValidationError::ConfidenceOutOfRange(self.confidence));
        }
        if !agent.is_safety() && !self.binding_constraints.is_empty() {
            return Err(AnalysisValidationError::UnauthorizedConstraint(agent));
        }

        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if !seen.insert(candidate.candidate_id.as_str()) {
                return Err(AnalysisValidationError::DuplicateCandidate(
                    candidate.candidate_id.clone(),
                ));
            }
            if candidate.actions.is_empty() {
                return Err(AnalysisValidationError::EmptyCandidate(candidate.candidate_id.clone()));
            }
            let minutes = candidate.total_delay_minutes();
            if minutes > MAX_DELAY_MINUTES {
                return Err(AnalysisValidationError::DelayOutOfRange {
                    candidate: candidate.candidate_id.clone(),
                    minutes,
                });
            }
            let impact = &candidate.impact;
            let checks = [
                ("safety_margin", impact.safety_margin, (0.0..=1.0).contains(&impact.safety_margin)),
                ("reputation_risk", impact.reputation_risk, (0.0..=1.0).contains(&impact.reputation_risk)),
                ("cost_usd", impact.cost_usd, impact.cost_usd.is_finite() && impact.cost_usd >= 0.0),
            ];
            if let Some((field, value, _)) = checks.into_iter().find(|(_, _, ok)| !ok) {
                return Err(AnalysisValidationError::InvalidImpact {
                    candidate: candidate.candidate_id.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Accepted analysis of one agent for one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub agent: AgentName,
    /// 1 for the initial recommendation, 2 for the revision round.
    pub revision: u8,
    pub analysis: AgentAnalysis,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AgentResponse {
    pub fn binding_constraints(&self) -> &[BindingConstraint] {
        &self.analysis.binding_constraints
    }

    pub fn candidates(&self) -> &[CandidateSolution] {
        &self.analysis.candidates
    }
}
