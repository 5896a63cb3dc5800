// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Collation
//!
//! The merged, phase-tagged set of all agent outcomes for one disruption.
//!
//! # Invariants
//!
//! - At most one entry per `(agent, phase)`.
//! - Entries are kept in invocation-start order, never priority order.
//! - Earlier revisions are never removed; [`Collation::latest_responses`]
//!   selects the superseding revision for arbitration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::agent::{AgentClass, AgentName};
use crate::domain::disruption::DisruptionId;
use crate::domain::invocation::AgentErrorKind;
use crate::domain::recommendation::AgentResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Phase 1: independent initial recommendations.
    Initial,
    /// Phase 2: revision with peer context.
    Revision,
}

impl Phase {
    pub fn revision(&self) -> u8 {
        match self {
            Phase::Initial => 1,
            Phase::Revision => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Initial => f.write_str("initial"),
            Phase::Revision => f.write_str("revision"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryOutcome {
    Responded { response: AgentResponse },
    /// Placeholder for an agent that failed in this phase.
    Unavailable { error_kind: AgentErrorKind, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollationEntry {
    pub agent: AgentName,
    pub class: AgentClass,
    pub phase: Phase,
    /// Position in the global invocation order of this disruption.
    pub invocation_index: u32,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: EntryOutcome,
}

impl CollationEntry {
    pub fn response(&self) -> Option<&AgentResponse> {
        match &self.outcome {
            EntryOutcome::Responded { response } => Some(response),
            EntryOutcome::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self.outcome, EntryOutcome::Unavailable { .. })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CollationError {
    #[error("collation already holds an entry for {agent} in the {phase} phase")]
    DuplicateEntry { agent: AgentName, phase: Phase },
}

/// Latest accepted response of an agent together with its ordering key.
#[derive(Debug, Clone, Copy)]
pub struct LatestResponse<'a> {
    pub response: &'a AgentResponse,
    /// Index of the invocation that produced `response`.
    pub invocation_index: u32,
    /// Index of the agent's first invocation. Stable across revisions, so
    /// a failed revision never moves an agent ahead of its peers.
    pub invocation_position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collation {
    pub disruption_id: DisruptionId,
    entries: Vec<CollationEntry>,
}

impl Collation {
    pub fn new(disruption_id: DisruptionId) -> Self {
        Self {
            disruption_id,
            entries: Vec::new(),
        }
    }

    /// Append an entry, keeping invocation order. Rejects a second entry for
    /// the same `(agent, phase)`.
    pub fn insert(&mut self, entry: CollationEntry) -> Result<(), CollationError> {
        if self.get(entry.agent, entry.phase).is_some() {
            return Err(CollationError::DuplicateEntry {
                agent: entry.agent,
                phase: entry.phase,
            });
        }
        let pos = self
            .entries
            .partition_point(|e| e.invocation_index <= entry.invocation_index);
        self.entries.insert(pos, entry);
        Ok(())
    }

    pub fn entries(&self) -> &[CollationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, agent: AgentName, phase: Phase) -> Option<&CollationEntry> {
        self.entries.iter().find(|e| e.agent == agent && e.phase == phase)
    }

    pub fn phase_entries(&self, phase: Phase) -> impl Iterator<Item = &CollationEntry> {
        self.entries.iter().filter(move |e| e.phase == phase)
    }

    /// Next free invocation index.
    pub fn next_invocation_index(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.invocation_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Latest revision holding a response, for an agent.
    pub fn latest(&self, agent: AgentName) -> Option<LatestResponse<'_>> {
        let invocation_position = self
            .entries
            .iter()
            .filter(|e| e.agent == agent)
            .map(|e| e.invocation_index)
            .min()?;
        self.entries
            .iter()
            .filter(|e| e.agent == agent)
            .filter_map(|e| {
                e.response().map(|response| LatestResponse {
                    response,
                    invocation_index: e.invocation_index,
                    invocation_position,
                })
            })
            .max_by_key(|l| l.response.revision)
    }

    /// Latest response per agent, in the agents' first-invocation order.
    pub fn latest_responses(&self) -> Vec<LatestResponse<'_>> {
        let mut latest: Vec<_> = AgentName::ALL
            .iter()
            .filter_map(|agent| self.latest(*agent))
            .collect();
        latest.sort_by_key(|l| l.invocation_position);
        latest
    }

    pub fn latest_by_class(&self, class: AgentClass) -> Vec<LatestResponse<'_>> {
        self.latest_responses()
            .into_iter()
            .filter(|l| l.response.agent.class() == class)
            .collect()
    }

    /// Agents with no accepted response in any phase.
    pub fn unavailable_agents(&self) -> Vec<AgentName> {
        let mut agents: Vec<AgentName> = Vec::new();
        for entry in &self.entries {
            if self.latest(entry.agent).is_none() && !agents.contains(&entry.agent) {
                agents.push(entry.agent);
            }
        }
        agents
    }

    /// Failures recorded in any phase, including revisions that fell back to
    /// an earlier response.
    pub fn failures(&self) -> impl Iterator<Item = &CollationEntry> {
        self.entries.iter().filter(|e| e.is_unavailable())
    }

    /// Agents holding a response in the given phase.
    pub fn responded_in(&self, phase: Phase) -> Vec<AgentName> {
        self.phase_entries(phase)
            .filter(|e| e.response().is_some())
            .map(|e| e.agent)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::recommendation::{AgentAnalysis, DomainOutput, NetworkOutput, FinanceOutput};

    fn response(agent: AgentName, revision: u8, text: &str) -> AgentResponse {
        let output = match agent {
            AgentName::Finance => DomainOutput::Finance(FinanceOutput::default()),
            _ => DomainOutput::Network(NetworkOutput::default()),
        };
        AgentResponse {
            agent,
            revision,
            analysis: AgentAnalysis {
                recommendation: text.to_string(),
                confidence: 0.7,
                reasoning: String::new(),
                binding_constraints: vec![],
                candidates: vec![],
                output,
            },
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    fn entry(agent: AgentName, phase: Phase, idx: u32, outcome: EntryOutcome) -> CollationEntry {
        CollationEntry {
            agent,
            class: agent.class(),
            phase,
            invocation_index: idx,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            outcome,
        }
    }

    fn responded(agent: AgentName, phase: Phase, idx: u32, text: &str) -> CollationEntry {
        entry(
            agent,
            phase,
            idx,
            EntryOutcome::Responded { response: response(agent, phase.revision(), text) },
        )
    }

    fn unavailable(agent: AgentName, phase: Phase, idx: u32) -> CollationEntry {
        entry(
            agent,
            phase,
            idx,
            EntryOutcome::Unavailable {
                error_kind: AgentErrorKind::Timeout,
                message: "timed out".to_string(),
            },
        )
    }

    #[test]
    fn test_duplicate_entry_rejected() {
        let mut c = Collation::new(DisruptionId::new());
        c.insert(responded(AgentName::Network, Phase::Initial, 0, "a")).unwrap();
        let err = c.insert(responded(AgentName::Network, Phase::Initial, 1, "b")).unwrap_err();
        assert_eq!(
            err,
            CollationError::DuplicateEntry { agent: AgentName::Network, phase: Phase::Initial }
        );
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn test_entries_sorted_by_invocation_index() {
        let mut c = Collation::new(DisruptionId::new());
        c.insert(responded(AgentName::Finance, Phase::Initial, 6, "f")).unwrap();
        c.insert(responded(AgentName::Network, Phase::Initial, 3, "n")).unwrap();
        let order: Vec<_> = c.entries().iter().map(|e| e.agent).collect();
        assert_eq!(order, vec![AgentName::Network, AgentName::Finance]);
        assert_eq!(c.next_invocation_index(), 7);
    }

    #[test]
    fn test_later_revision_supersedes_but_earlier_kept() {
        let mut c = Collation::new(DisruptionId::new());
        c.insert(responded(AgentName::Network, Phase::Initial, 0, "first")).unwrap();
        c.insert(responded(AgentName::Network, Phase::Revision, 7, "second")).unwrap();

        let latest = c.latest(AgentName::Network).unwrap();
        assert_eq!(latest.response.analysis.recommendation, "second");
        assert_eq!(latest.invocation_index, 7);
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn test_failed_revision_falls_back_to_initial() {
        let mut c = Collation::new(DisruptionId::new());
        c.insert(responded(AgentName::Network, Phase::Initial, 0, "first")).unwrap();
        c.insert(unavailable(AgentName::Network, Phase::Revision, 7)).unwrap();

        let latest = c.latest(AgentName::Network).unwrap();
        assert_eq!(latest.response.revision, 1);
        assert!(c.unavailable_agents().is_empty());
        assert_eq!(c.failures().count(), 1);
    }

    #[test]
    fn test_latest_responses_keep_first_invocation_order() {
        let mut c = Collation::new(DisruptionId::new());
        c.insert(responded(AgentName::Network, Phase::Initial, 3, "n1")).unwrap();
        c.insert(responded(AgentName::Finance, Phase::Initial, 6, "f1")).unwrap();
        c.insert(responded(AgentName::Network, Phase::Revision, 10, "n2")).unwrap();
        c.insert(unavailable(AgentName::Finance, Phase::Revision, 13)).unwrap();

        let latest = c.latest_responses();
        let agents: Vec<_> = latest.iter().map(|l| l.response.agent).collect();
        assert_eq!(agents, vec![AgentName::Network, AgentName::Finance]);
        assert_eq!(latest[0].invocation_index, 10);
        assert_eq!(latest[0].invocation_position, 3);
        assert_eq!(latest[1].invocation_index, 6);
        assert_eq!(latest[1].invocation_position, 6);
    }

    #[test]
    fn test_unavailable_agents_listed_once() {
        let mut c = Collation::new(DisruptionId::new());
        c.insert(unavailable(AgentName::Cargo, Phase::Initial, 5)).unwrap();
        c.insert(unavailable(AgentName::Cargo, Phase::Revision, 12)).unwrap();
        c.insert(responded(AgentName::Finance, Phase::Initial, 6, "f")).unwrap();
        assert_eq!(c.unavailable_agents(), vec![AgentName::Cargo]);
        assert_eq!(c.responded_in(Phase::Initial), vec![AgentName::Finance]);
    }
}
