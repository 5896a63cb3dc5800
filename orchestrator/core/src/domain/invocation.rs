// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Invocation Contract (Anti-Corruption Layer)
//!
//! The orchestration core depends only on [`AgentInvoker`]: given a
//! structured request and a tool capability set it returns an
//! [`AgentAnalysis`] or a classified [`AgentError`]. Provider-specific
//! adapters live in `crate::infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::domain::agent::{AgentName, ToolCapability};
use crate::domain::collation::{Collation, EntryOutcome, Phase};
use crate::domain::disruption::{DisruptionPayload, FlightInfo};
use crate::domain::recommendation::AgentAnalysis;

/// Classification of a per-agent failure, recorded in the collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    Invocation,
    Timeout,
    OutputValidation,
}

impl fmt::Display for AgentErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentErrorKind::Invocation => f.write_str("invocation"),
            AgentErrorKind::Timeout => f.write_str("timeout"),
            AgentErrorKind::OutputValidation => f.write_str("output_validation"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AgentError {
    /// Transport or tool failure.
    #[error("agent invocation failed: {0}")]
    Invocation(String),

    #[error("agent did not respond within {0:?}")]
    Timeout(Duration),

    /// Response failed schema validation.
    #[error("agent output failed validation: {0}")]
    OutputValidation(String),
}

impl AgentError {
    pub fn kind(&self) -> AgentErrorKind {
        match self {
            AgentError::Invocation(_) => AgentErrorKind::Invocation,
            AgentError::Timeout(_) => AgentErrorKind::Timeout,
            AgentError::OutputValidation(_) => AgentErrorKind::OutputValidation,
        }
    }
}

/// One entry of the peer context handed to an agent in the revision round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub agent: AgentName,
    /// True when this entry is the receiving agent's own prior output.
    pub is_self: bool,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

/// Phase-1 outputs of all agents, labeled for one receiving agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerContext {
    pub entries: Vec<PeerEntry>,
}

impl PeerContext {
    pub fn for_agent(collation: &Collation, phase: Phase, receiver: AgentName) -> Self {
        let entries = collation
            .phase_entries(phase)
            .map(|e| PeerEntry {
                agent: e.agent,
                is_self: e.agent == receiver,
                outcome: e.outcome.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn own(&self) -> Option<&PeerEntry> {
        self.entries.iter().find(|e| e.is_self)
    }

    pub fn peers(&self) -> impl Iterator<Item = &PeerEntry> {
        self.entries.iter().filter(|e| !e.is_self)
    }
}

/// Everything one agent receives for one invocation. Each request is an
/// independent copy; agents share no mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInvocationRequest {
    pub agent: AgentName,
    pub phase: Phase,
    pub disruption: DisruptionPayload,
    pub flight: FlightInfo,
    pub tools: Vec<ToolCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_context: Option<PeerContext>,
}

#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run one agent's analysis. Implementations must not block other
    /// agents; timeouts are enforced by the caller.
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentAnalysis, AgentError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collation::CollationEntry;
    use crate::domain::disruption::DisruptionId;
    use chrono::Utc;

    #[test]
    fn test_error_kinds() {
        assert_eq!(AgentError::Invocation("x".into()).kind(), AgentErrorKind::Invocation);
        assert_eq!(
            AgentError::Timeout(Duration::from_secs(5)).kind(),
            AgentErrorKind::Timeout
        );
        assert_eq!(
            AgentError::OutputValidation("bad".into()).kind(),
            AgentErrorKind::OutputValidation
        );
        assert!(AgentError::Timeout(Duration::from_secs(5)).to_string().contains("5s"));
    }

    #[test]
    fn test_peer_context_labels_self() {
        let mut collation = Collation::new(DisruptionId::new());
        for (idx, agent) in [AgentName::Network, AgentName::Cargo].into_iter().enumerate() {
            collation
                .insert(CollationEntry {
                    agent,
                    class: agent.class(),
                    phase: Phase::Initial,
                    invocation_index: idx as u32,
                    started_at: Utc::now(),
                    completed_at: Utc::now(),
                    outcome: EntryOutcome::Unavailable {
                        error_kind: AgentErrorKind::Invocation,
                        message: "down".to_string(),
                    },
                })
                .unwrap();
        }

        let ctx = PeerContext::for_agent(&collation, Phase::Initial, AgentName::Cargo);
        assert_eq!(ctx.entries.len(), 2);
        assert_eq!(ctx.own().map(|e| e.agent), Some(AgentName::Cargo));
        assert_eq!(ctx.peers().map(|e| e.agent).collect::<Vec<_>>(), vec![AgentName::Network]);

        let json = serde_json::to_value(&ctx).unwrap();
        assert_eq!(json["entries"][1]["is_self"], true);
        assert_eq!(json["entries"][0]["status"], "unavailable");
    }
}
