// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use tracing::{debug, warn};

use crate::application::phase::InvocationOutcome;
use crate::domain::collation::{Collation, CollationEntry, CollationError, EntryOutcome};

/// Counts from one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub accepted: usize,
    pub responded: usize,
    pub unavailable: usize,
    pub duplicates: usize,
}

/// Merges phase outcomes into a collation.
///
/// Failures become `Unavailable` placeholders, never dropped. A second result
/// for the same `(agent, phase)` is rejected and the first one stays.
#[derive(Debug, Default, Clone, Copy)]
pub struct Collator;

impl Collator {
    pub fn new() -> Self {
        Self
    }

    pub fn merge(&self, collation: &mut Collation, outcomes: Vec<InvocationOutcome>) -> MergeSummary {
        let mut summary = MergeSummary::default();

        for outcome in outcomes {
            let entry = Self::entry_from(outcome);
            let responded = !entry.is_unavailable();

            match collation.insert(entry) {
                Ok(()) => {
                    summary.accepted += 1;
                    if responded {
                        summary.responded += 1;
                    } else {
                        summary.unavailable += 1;
                    }
                }
                Err(CollationError::DuplicateEntry { agent, phase }) => {
                    warn!(
                        disruption_id = %collation.disruption_id,
                        %agent,
                        %phase,
                        "Dropping duplicate agent result"
                    );
                    metrics::counter!("skymarshal_collation_duplicates_total").increment(1);
                    summary.duplicates += 1;
                }
            }
        }

        debug!(
            disruption_id = %collation.disruption_id,
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            "Merged phase outcomes"
        );
        summary
    }

    fn entry_from(outcome: InvocationOutcome) -> CollationEntry {
        let outcome_record = match outcome.result {
            Ok(response) => EntryOutcome::Responded { response },
            Err(e) => EntryOutcome::Unavailable {
                error_kind: e.kind(),
                message: e.to_string(),
            },
        };
        CollationEntry {
            agent: outcome.agent,
            class: outcome.agent.class(),
            phase: outcome.phase,
            invocation_index: outcome.invocation_index,
            started_at: outcome.started_at,
            completed_at: outcome.completed_at,
            outcome: outcome_record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::{AgentClass, AgentName};
    use crate::domain::collation::Phase;
    use crate::domain::disruption::DisruptionId;
    use crate::domain::invocation::{AgentError, AgentErrorKind};
    use crate::domain::recommendation::{
        AgentAnalysis, AgentResponse, DomainOutput, MaintenanceOutput,
    };
    use chrono::Utc;
    use std::time::Duration;

    fn outcome(
        agent: AgentName,
        idx: u32,
        result: Result<AgentResponse, AgentError>,
    ) -> InvocationOutcome {
        InvocationOutcome {
            agent,
            phase: Phase::Initial,
            invocation_index: idx,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            result,
        }
    }

    fn maintenance_response() -> AgentResponse {
        AgentResponse {
            agent: AgentName::Maintenance,
            revision: 1,
            analysis: AgentAnalysis {
                recommendation: "ground G-XWBA".to_string(),
                confidence: 0.95,
                reasoning: String::new(),
                binding_constraints: vec![],
                candidates: vec![],
                output: DomainOutput::Maintenance(MaintenanceOutput::default()),
            },
            started_at: Utc::now(),
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_failures_become_placeholders() {
        let mut collation = Collation::new(DisruptionId::new());
        let summary = Collator::new().merge(
            &mut collation,
            vec![
                outcome(AgentName::Maintenance, 1, Ok(maintenance_response())),
                outcome(
                    AgentName::Cargo,
                    5,
                    Err(AgentError::Timeout(Duration::from_secs(60))),
                ),
            ],
        );

        assert_eq!(summary.responded, 1);
        assert_eq!(summary.unavailable, 1);
        let cargo = collation.get(AgentName::Cargo, Phase::Initial).unwrap();
        assert_eq!(cargo.class, AgentClass::Business);
        match &cargo.outcome {
            EntryOutcome::Unavailable { error_kind, .. } => {
                assert_eq!(*error_kind, AgentErrorKind::Timeout)
            }
            other => panic!("expected placeholder, got {:?}", other),
        }
        assert_eq!(
            collation.get(AgentName::Maintenance, Phase::Initial).unwrap().class,
            AgentClass::Safety
        );
    }

    #[test]
    fn test_duplicate_dropped_first_kept() {
        let mut collation = Collation::new(DisruptionId::new());
        let summary = Collator::new().merge(
            &mut collation,
            vec![
                outcome(AgentName::Maintenance, 1, Ok(maintenance_response())),
                outcome(
                    AgentName::Maintenance,
                    2,
                    Err(AgentError::Invocation("late duplicate".to_string())),
                ),
            ],
        );

        assert_eq!(summary.duplicates, 1);
        assert_eq!(collation.len(), 1);
        assert!(collation
            .get(AgentName::Maintenance, Phase::Initial)
            .unwrap()
            .response()
            .is_some());
    }
}
