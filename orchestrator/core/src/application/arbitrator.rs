// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Arbitrator
//!
//! Turns a final collation into one ranked decision.
//!
//! ```text
//! collation ──► 1. extract binding constraints (safety class)
//!           ──► 2. filter business candidates ──► none left? ──► Failed
//!           ──► 3. detect conflicts (connected groups across agents)
//!           ──► 4. resolve each conflict by weighted score
//!           ──► 5. rank winners + unconflicted candidates ──► Decided
//! ```
//!
//! Binding constraints are filters and are never scored. Every comparison
//! goes through one deterministic comparator, so identical inputs always
//! yield identical resolutions and rankings.

use chrono::{Duration as ChronoDuration, Utc};
use std::cmp::Ordering;
use tracing::{info, warn};

use crate::domain::agent::{AgentClass, AgentName};
use crate::domain::arbitration::{
    ArbitrationError, ArbitrationFailure, ArbitratorOutput, AuditEntry, CandidateRef,
    CandidateScore, ConflictDetail, ConflictReason, DecidingRule, PairwiseIncompatibility,
    RecoveryPlan, RecoverySolution, RecoveryStep, RejectedCandidate, ResolutionDetail,
    SafetyOverride, ScoreBreakdown, StepKind,
};
use crate::domain::collation::{Collation, Phase};
use crate::domain::disruption::FlightInfo;
use crate::domain::policy::ArbitrationPolicy;
use crate::domain::recommendation::{CandidateSolution, ConstraintRule, RecoveryAction};

/// Scores closer than this are treated as tied.
const SCORE_RESOLUTION: f64 = 1e9;

/// A safety-compliant candidate with everything the comparator needs.
#[derive(Debug, Clone)]
struct Scored<'a> {
    reference: CandidateRef,
    candidate: &'a CandidateSolution,
    /// Agent's first-invocation index; stable across revisions.
    invocation_position: u32,
    position: usize,
    score: ScoreBreakdown,
}

pub struct Arbitrator {
    policy: ArbitrationPolicy,
}

impl Arbitrator {
    pub fn new(policy: ArbitrationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ArbitrationPolicy {
        &self.policy
    }

    /// Arbitrate over the latest response of every agent in the collation.
    pub fn arbitrate(
        &self,
        collation: &Collation,
        flight: &FlightInfo,
    ) -> Result<ArbitratorOutput, ArbitrationError> {
        let disruption_id = collation.disruption_id;
        let mut audit = Vec::new();

        let unavailable_agents = collation.unavailable_agents();
        for entry in collation.failures() {
            if let Some(used) = decisive_phase(collation, entry.agent) {
                audit.push(AuditEntry::now(format!(
                    "{} failed in the {} phase; its {} response is used",
                    entry.agent, entry.phase, used
                )));
            }
        }
        for agent in &unavailable_agents {
            audit.push(AuditEntry::now(format!(
                "{} ({} class) unavailable in every phase; excluded from arbitration",
                agent,
                agent.class()
            )));
        }

        // 1. Binding constraints
        let safety_overrides = extract_overrides(collation);
        audit.push(AuditEntry::now(format!(
            "Extracted {} binding constraint(s) from safety-class agents",
            safety_overrides.len()
        )));

        for latest in collation.latest_by_class(AgentClass::Safety) {
            if !latest.response.candidates().is_empty() {
                audit.push(AuditEntry::now(format!(
                    "Ignored {} candidate(s) from safety-class agent {}",
                    latest.response.candidates().len(),
                    latest.response.agent
                )));
            }
        }

        // 2. Safety filter
        let mut survivors = Vec::new();
        let mut rejected = Vec::new();
        let mut proposed = 0usize;
        for latest in collation.latest_by_class(AgentClass::Business) {
            let agent = latest.response.agent;
            for (position, candidate) in latest.response.candidates().iter().enumerate() {
                proposed += 1;
                let reference = CandidateRef {
                    agent,
                    candidate_id: candidate.candidate_id.clone(),
                };
                let violated: Vec<SafetyOverride> = safety_overrides
                    .iter()
                    .filter(|o| violates(&o.constraint.rule, candidate, flight))
                    .cloned()
                    .collect();

                if violated.is_empty() {
                    survivors.push(Scored {
                        reference,
                        candidate,
                        invocation_position: latest.invocation_position,
                        position,
                        score: self.policy.score(&candidate.impact),
                    });
                } else {
                    audit.push(AuditEntry::now(format!(
                        "Rejected {}: violates {}",
                        reference,
                        violated
                            .iter()
                            .map(|o| format!("{} constraint ({})", o.source_agent, o.constraint.reason))
                            .collect::<Vec<_>>()
                            .join(", ")
                    )));
                    rejected.push(RejectedCandidate {
                        candidate: reference,
                        violated,
                    });
                }
            }
        }

        if survivors.is_empty() {
            let reason = if proposed == 0 {
                "no business-class agent proposed a candidate solution".to_string()
            } else {
                format!(
                    "all {} candidate solution(s) violate binding safety constraints",
                    proposed
                )
            };
            warn!(%disruption_id, %reason, "Arbitration failed");
            metrics::counter!("skymarshal_arbitrations_total", "outcome" => "failed").increment(1);
            audit.push(AuditEntry::now(format!("Arbitration failed: {}", reason)));
            return Err(ArbitrationError::NoSafetyCompliantSolution(Box::new(
                ArbitrationFailure {
                    disruption_id,
                    reason,
                    safety_overrides,
                    rejected,
                    unavailable_agents,
                    audit_trail: audit,
                    failed_at: Utc::now(),
                },
            )));
        }
        audit.push(AuditEntry::now(format!(
            "{} of {} candidate(s) are safety-compliant",
            survivors.len(),
            proposed
        )));

        // 3. Conflicts
        let conflicts = detect_conflicts(&survivors);

        // 4. Resolution
        let mut resolutions = Vec::with_capacity(conflicts.len());
        let mut losers = vec![false; survivors.len()];
        for (detail, members) in &conflicts {
            let mut ranked: Vec<&Scored> = members.iter().map(|&i| &survivors[i]).collect();
            ranked.sort_by(|a, b| compare(a, b).0);

            let winner = ranked[0];
            let (_, deciding_rule) = compare(winner, ranked[1]);
            let rationale = rationale(winner, ranked[1], deciding_rule);

            for &i in members {
                if survivors[i].reference != winner.reference {
                    losers[i] = true;
                }
            }
            audit.push(AuditEntry::now(format!(
                "{} between {} candidate(s) resolved for {}: {}",
                detail.conflict_id,
                members.len(),
                winner.reference,
                rationale
            )));
            resolutions.push(ResolutionDetail {
                conflict_id: detail.conflict_id.clone(),
                winner: winner.reference.clone(),
                deciding_rule,
                rationale,
                scores: ranked
                    .iter()
                    .map(|s| CandidateScore {
                        candidate: s.reference.clone(),
                        score: s.score.clone(),
                    })
                    .collect(),
            });
        }

        // 5. Ranking
        let mut ranked: Vec<&Scored> = survivors
            .iter()
            .zip(&losers)
            .filter(|(_, lost)| !**lost)
            .map(|(s, _)| s)
            .collect();
        ranked.sort_by(|a, b| compare(a, b).0);

        let solutions: Vec<RecoverySolution> = ranked
            .iter()
            .enumerate()
            .map(|(i, s)| RecoverySolution {
                rank: i as u32 + 1,
                candidate: s.reference.clone(),
                title: s.candidate.title.clone(),
                score: s.score.clone(),
                plan: build_plan(s.candidate, &safety_overrides),
            })
            .collect();

        if let Some(top) = solutions.first() {
            audit.push(AuditEntry::now(format!(
                "Ranked {} solution(s); recommended {} (aggregate {:.4})",
                solutions.len(),
                top.candidate,
                top.score.aggregate
            )));
        }

        info!(
            %disruption_id,
            solutions = solutions.len(),
            conflicts = conflicts.len(),
            overrides = safety_overrides.len(),
            "Arbitration decided"
        );
        metrics::counter!("skymarshal_arbitrations_total", "outcome" => "decided").increment(1);

        Ok(ArbitratorOutput {
            disruption_id,
            solutions,
            conflicts: conflicts.into_iter().map(|(detail, _)| detail).collect(),
            resolutions,
            safety_overrides,
            rejected,
            unavailable_agents,
            weights: self.policy.weights.clone(),
            audit_trail: audit,
            decided_at: Utc::now(),
        })
    }
}

fn extract_overrides(collation: &Collation) -> Vec<SafetyOverride> {
    collation
        .latest_by_class(AgentClass::Safety)
        .into_iter()
        .flat_map(|latest| {
            latest
                .response
                .binding_constraints()
                .iter()
                .map(move |constraint| SafetyOverride {
                    source_agent: latest.response.agent,
                    revision: latest.response.revision,
                    constraint: constraint.clone(),
                })
        })
        .collect()
}

/// Whether executing `candidate` would break `rule` for this flight.
fn violates(rule: &ConstraintRule, candidate: &CandidateSolution, flight: &FlightInfo) -> bool {
    let cancelled = candidate.is_cancellation();
    let scheduled_tail = flight.tail_number.as_deref();

    match rule {
        ConstraintRule::CrewMustBeReplaced { crew_id } => {
            if candidate
                .crew_reassignments()
                .any(|(_, replacement)| replacement.eq_ignore_ascii_case(crew_id))
            {
                return true;
            }
            !cancelled
                && !candidate
                    .crew_reassignments()
                    .any(|(crew, _)| crew.eq_ignore_ascii_case(crew_id))
        }
        ConstraintRule::AircraftGrounded { tail_number } => {
            let swaps_onto = candidate
                .swaps()
                .any(|(_, to)| to.eq_ignore_ascii_case(tail_number));
            let operates_on = candidate
                .operating_tail(scheduled_tail)
                .is_some_and(|t| t.eq_ignore_ascii_case(tail_number));
            swaps_onto || operates_on
        }
        ConstraintRule::MinimumDelay { minutes } => {
            if cancelled {
                return false;
            }
            let on_original = match (candidate.operating_tail(scheduled_tail), scheduled_tail) {
                (Some(operating), Some(scheduled)) => operating.eq_ignore_ascii_case(scheduled),
                (None, None) => true,
                _ => false,
            };
            on_original && candidate.total_delay_minutes() < u64::from(*minutes)
        }
        ConstraintRule::LatestDeparture { at } => {
            if cancelled {
                return false;
            }
            let departure = i64::try_from(candidate.total_delay_minutes())
                .ok()
                .and_then(ChronoDuration::try_minutes)
                .and_then(|delay| flight.scheduled_departure.checked_add_signed(delay));
            // A departure past the representable range is past every deadline
            departure.is_none_or(|departure| departure > *at)
        }
        ConstraintRule::ProhibitedAirport { iata } => {
            candidate.reroutes().any(|via| via.eq_ignore_ascii_case(iata))
        }
    }
}

/// Reasons two candidates from different agents cannot both be executed.
fn incompatibilities(left: &CandidateSolution, right: &CandidateSolution) -> Vec<ConflictReason> {
    let mut reasons = Vec::new();
    let mut push = |reason: ConflictReason| {
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    };

    for (left_from, left_to) in left.swaps() {
        for (right_from, right_to) in right.swaps() {
            if left_from.eq_ignore_ascii_case(right_from) && !left_to.eq_ignore_ascii_case(right_to) {
                push(ConflictReason::AircraftAssignment {
                    tail_number: left_from.to_ascii_uppercase(),
                });
            }
            if left_to.eq_ignore_ascii_case(right_to) && !left_from.eq_ignore_ascii_case(right_from) {
                push(ConflictReason::ReplacementAircraft {
                    tail_number: left_to.to_ascii_uppercase(),
                });
            }
        }
    }

    for (left_crew, left_replacement) in left.crew_reassignments() {
        for (right_crew, right_replacement) in right.crew_reassignments() {
            if left_crew.eq_ignore_ascii_case(right_crew)
                && !left_replacement.eq_ignore_ascii_case(right_replacement)
            {
                push(ConflictReason::CrewAssignment {
                    crew_id: left_crew.to_string(),
                });
            }
        }
    }

    match (left.is_cancellation(), right.is_cancellation()) {
        (true, false) | (false, true) => push(ConflictReason::CancelVersusOperate),
        (false, false) => {
            let (l, r) = (left.total_delay_minutes(), right.total_delay_minutes());
            if l != r {
                push(ConflictReason::Timeline {
                    left_delay_minutes: l,
                    right_delay_minutes: r,
                });
            }
        }
        (true, true) => {}
    }

    reasons
}

/// Group incompatible candidates into connected components. Survivors are
/// already in invocation order, so members and groups come out that way.
fn detect_conflicts(survivors: &[Scored<'_>]) -> Vec<(ConflictDetail, Vec<usize>)> {
    let n = survivors.len();
    let mut parent: Vec<usize> = (0..n).collect();
    let mut pairs: Vec<(usize, usize, Vec<ConflictReason>)> = Vec::new();

    fn find(parent: &mut [usize], mut i: usize) -> usize {
        while parent[i] != i {
            parent[i] = parent[parent[i]];
            i = parent[i];
        }
        i
    }

    for i in 0..n {
        for j in (i + 1)..n {
            if survivors[i].reference.agent == survivors[j].reference.agent {
                continue;
            }
            let reasons = incompatibilities(survivors[i].candidate, survivors[j].candidate);
            if reasons.is_empty() {
                continue;
            }
            let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
            if ri != rj {
                // Keep the earliest member as root
                parent[ri.max(rj)] = ri.min(rj);
            }
            pairs.push((i, j, reasons));
        }
    }

    let mut groups: Vec<(usize, Vec<usize>)> = Vec::new();
    for i in 0..n {
        let root = find(&mut parent, i);
        match groups.iter_mut().find(|(r, _)| *r == root) {
            Some((_, members)) => members.push(i),
            None => groups.push((root, vec![i])),
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .enumerate()
        .map(|(k, (_, members))| {
            let incompatibilities = pairs
                .iter()
                .filter(|(i, _, _)| members.contains(i))
                .map(|(i, j, reasons)| PairwiseIncompatibility {
                    left: survivors[*i].reference.clone(),
                    right: survivors[*j].reference.clone(),
                    reasons: reasons.clone(),
                })
                .collect();
            let detail = ConflictDetail {
                conflict_id: format!("conflict-{}", k + 1),
                candidates: members.iter().map(|&i| survivors[i].reference.clone()).collect(),
                incompatibilities,
            };
            (detail, members)
        })
        .collect()
}

fn quantize(score: f64) -> i64 {
    (score * SCORE_RESOLUTION).round() as i64
}

/// Total order used for resolution and ranking. `Less` means `a` ranks
/// ahead of `b`; the rule is the first criterion that differed.
fn compare(a: &Scored<'_>, b: &Scored<'_>) -> (Ordering, DecidingRule) {
    let by_aggregate = quantize(b.score.aggregate).cmp(&quantize(a.score.aggregate));
    if by_aggregate != Ordering::Equal {
        return (by_aggregate, DecidingRule::WeightedScore);
    }
    let by_safety = quantize(b.score.safety).cmp(&quantize(a.score.safety));
    if by_safety != Ordering::Equal {
        return (by_safety, DecidingRule::SafetyScore);
    }
    let by_cost = a.score.cost_usd.total_cmp(&b.score.cost_usd);
    if by_cost != Ordering::Equal {
        return (by_cost, DecidingRule::LowerCost);
    }
    (
        (a.invocation_position, a.position).cmp(&(b.invocation_position, b.position)),
        DecidingRule::InvocationOrder,
    )
}

fn rationale(winner: &Scored<'_>, runner_up: &Scored<'_>, rule: DecidingRule) -> String {
    let (w, r) = (&winner.score, &runner_up.score);
    match rule {
        DecidingRule::WeightedScore => format!(
            "{} scored {:.4} against {:.4} for {}",
            winner.reference, w.aggregate, r.aggregate, runner_up.reference
        ),
        DecidingRule::SafetyScore => format!(
            "aggregate tied at {:.4}; {} has the higher safety score ({:.3} vs {:.3})",
            w.aggregate, winner.reference, w.safety, r.safety
        ),
        DecidingRule::LowerCost => format!(
            "aggregate and safety tied; {} costs less (${:.0} vs ${:.0})",
            winner.reference, w.cost_usd, r.cost_usd
        ),
        DecidingRule::InvocationOrder => format!(
            "all criteria tied with {}; {} was proposed first",
            runner_up.reference, winner.reference
        ),
    }
}

fn step_group(action: &RecoveryAction) -> u8 {
    match action {
        RecoveryAction::CrewReassignment { .. } | RecoveryAction::AircraftSwap { .. } => 0,
        RecoveryAction::Delay { .. } | RecoveryAction::Cancel | RecoveryAction::Reroute { .. } => 1,
        RecoveryAction::RebookPassengers { .. } | RecoveryAction::OffloadCargo { .. } => 2,
    }
}

fn describe(action: &RecoveryAction) -> (AgentName, String) {
    match action {
        RecoveryAction::CrewReassignment { crew_id, replacement_crew_id } => (
            AgentName::CrewCompliance,
            format!("Replace crew member {} with {}", crew_id, replacement_crew_id),
        ),
        RecoveryAction::AircraftSwap { from_tail, to_tail } => (
            AgentName::Network,
            format!("Swap aircraft {} for {}", from_tail, to_tail),
        ),
        RecoveryAction::Delay { minutes } => {
            (AgentName::Network, format!("Delay departure by {} minutes", minutes))
        }
        RecoveryAction::Cancel => (AgentName::Network, "Cancel the flight".to_string()),
        RecoveryAction::Reroute { via } => (AgentName::Network, format!("Reroute via {}", via)),
        RecoveryAction::RebookPassengers { passengers } => (
            AgentName::GuestExperience,
            format!("Rebook {} passengers", passengers),
        ),
        RecoveryAction::OffloadCargo { shipment_ids } => (
            AgentName::Cargo,
            format!("Offload {} shipment(s): {}", shipment_ids.len(), shipment_ids.join(", ")),
        ),
    }
}

/// Crew and aircraft first, then schedule, then passengers and cargo, then
/// one verification per applied constraint.
fn build_plan(candidate: &CandidateSolution, overrides: &[SafetyOverride]) -> RecoveryPlan {
    let mut actions: Vec<&RecoveryAction> = candidate.actions.iter().collect();
    actions.sort_by_key(|a| step_group(a));

    let mut steps: Vec<RecoveryStep> = actions
        .into_iter()
        .map(|action| {
            let (owner, description) = describe(action);
            RecoveryStep {
                sequence: 0,
                owner,
                description,
                kind: StepKind::Execute {
                    action: action.clone(),
                },
            }
        })
        .collect();

    steps.extend(overrides.iter().map(|o| RecoveryStep {
        sequence: 0,
        owner: o.source_agent,
        description: format!("Verify: {}", o.constraint.reason),
        kind: StepKind::VerifyConstraint {
            constraint: o.constraint.clone(),
        },
    }));

    for (i, step) in steps.iter_mut().enumerate() {
        step.sequence = i as u32 + 1;
    }
    RecoveryPlan { steps }
}

/// Phase of an agent's superseding response, for reporting.
pub fn decisive_phase(collation: &Collation, agent: AgentName) -> Option<Phase> {
    collation.latest(agent).map(|l| match l.response.revision {
        1 => Phase::Initial,
        _ => Phase::Revision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::collation::{CollationEntry, EntryOutcome};
    use crate::domain::disruption::DisruptionId;
    use crate::domain::invocation::AgentErrorKind;
    use crate::domain::recommendation::{
        AgentAnalysis, AgentResponse, BindingConstraint, CrewComplianceOutput, DomainOutput,
        FinanceOutput, ImpactEstimate, MaintenanceOutput, NetworkOutput,
    };
    use chrono::{NaiveDate, TimeZone};

    fn flight() -> FlightInfo {
        FlightInfo {
            flight_number: "BA117".to_string(),
            flight_date: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
            origin: "LHR".to_string(),
            destination: "JFK".to_string(),
            scheduled_departure: Utc.with_ymd_and_hms(2026, 10, 18, 9, 30, 0).unwrap(),
            tail_number: Some("G-XWBA".to_string()),
            assigned_crew: vec!["C100".to_string(), "C101".to_string()],
        }
    }

    fn impact(safety: f64, cost: f64) -> ImpactEstimate {
        ImpactEstimate {
            safety_margin: safety,
            cost_usd: cost,
            passengers_affected: 40,
            downstream_flights_affected: 1,
            reputation_risk: 0.1,
        }
    }

    fn candidate(id: &str, actions: Vec<RecoveryAction>, impact: ImpactEstimate) -> CandidateSolution {
        CandidateSolution {
            candidate_id: id.to_string(),
            title: id.to_string(),
            actions,
            impact,
        }
    }

    fn swap(to: &str) -> RecoveryAction {
        RecoveryAction::AircraftSwap {
            from_tail: "G-XWBA".to_string(),
            to_tail: to.to_string(),
        }
    }

    fn reassign(crew: &str, replacement: &str) -> RecoveryAction {
        RecoveryAction::CrewReassignment {
            crew_id: crew.to_string(),
            replacement_crew_id: replacement.to_string(),
        }
    }

    fn output_for(agent: AgentName) -> DomainOutput {
        match agent {
            AgentName::CrewCompliance => DomainOutput::CrewCompliance(CrewComplianceOutput::default()),
            AgentName::Maintenance => DomainOutput::Maintenance(MaintenanceOutput::default()),
            AgentName::Finance => DomainOutput::Finance(FinanceOutput::default()),
            _ => DomainOutput::Network(NetworkOutput::default()),
        }
    }

    struct Builder {
        collation: Collation,
        next: u32,
    }

    impl Builder {
        fn new() -> Self {
            Self {
                collation: Collation::new(DisruptionId::new()),
                next: 0,
            }
        }

        fn respond(
            mut self,
            agent: AgentName,
            phase: Phase,
            constraints: Vec<BindingConstraint>,
            candidates: Vec<CandidateSolution>,
        ) -> Self {
            let response = AgentResponse {
                agent,
                revision: phase.revision(),
                analysis: AgentAnalysis {
                    recommendation: format!("{} view", agent),
                    confidence: 0.8,
                    reasoning: String::new(),
                    binding_constraints: constraints,
                    candidates,
                    output: output_for(agent),
                },
                started_at: Utc::now(),
                completed_at: Utc::now(),
            };
            self.push(agent, phase, EntryOutcome::Responded { response })
        }

        fn unavailable(self, agent: AgentName, phase: Phase) -> Self {
            self.push(
                agent,
                phase,
                EntryOutcome::Unavailable {
                    error_kind: AgentErrorKind::Timeout,
                    message: "timed out".to_string(),
                },
            )
        }

        fn push(mut self, agent: AgentName, phase: Phase, outcome: EntryOutcome) -> Self {
            self.collation
                .insert(CollationEntry {
                    agent,
                    class: agent.class(),
                    phase,
                    invocation_index: self.next,
                    started_at: Utc::now(),
                    completed_at: Utc::now(),
                    outcome,
                })
                .unwrap();
            self.next += 1;
            self
        }
    }

    fn crew_constraint(crew: &str) -> BindingConstraint {
        BindingConstraint {
            rule: ConstraintRule::CrewMustBeReplaced {
                crew_id: crew.to_string(),
            },
            reason: format!("{} exceeds flight duty period", crew),
        }
    }

    fn grounded(tail: &str) -> BindingConstraint {
        BindingConstraint {
            rule: ConstraintRule::AircraftGrounded {
                tail_number: tail.to_string(),
            },
            reason: format!("{} hydraulic leak", tail),
        }
    }

    fn crew_duty_scenario() -> Collation {
        Builder::new()
            .respond(AgentName::CrewCompliance, Phase::Initial, vec![crew_constraint("C100")], vec![])
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate(
                    "net-swap",
                    vec![swap("G-XWBB"), reassign("C100", "C200")],
                    impact(0.9, 40_000.0),
                )],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate(
                    "fin-swap",
                    vec![swap("G-XWBC"), reassign("C100", "C200")],
                    impact(0.9, 90_000.0),
                )],
            )
            .collation
    }

    #[test]
    fn test_crew_duty_conflict_resolved_by_weighted_score() {
        let collation = crew_duty_scenario();
        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();

        assert_eq!(output.safety_overrides.len(), 1);
        assert_eq!(output.conflicts.len(), 1);
        assert_eq!(output.conflicts[0].candidates.len(), 2);
        assert_eq!(
            output.conflicts[0].incompatibilities[0].reasons,
            vec![ConflictReason::AircraftAssignment {
                tail_number: "G-XWBA".to_string()
            }]
        );

        assert_eq!(output.resolutions.len(), 1);
        let resolution = &output.resolutions[0];
        assert_eq!(resolution.winner.candidate_id, "net-swap");
        assert_eq!(resolution.deciding_rule, DecidingRule::WeightedScore);
        assert_eq!(resolution.scores.len(), 2);
        assert!(resolution.scores[0].score.aggregate > resolution.scores[1].score.aggregate);

        assert_eq!(output.solutions.len(), 1);
        assert_eq!(output.solutions[0].rank, 1);
        assert_eq!(output.top().unwrap().candidate.candidate_id, "net-swap");
    }

    #[test]
    fn test_resolutions_are_deterministic() {
        let collation = crew_duty_scenario();
        let arbitrator = Arbitrator::new(ArbitrationPolicy::default());
        let first = arbitrator.arbitrate(&collation, &flight()).unwrap();
        let second = arbitrator.arbitrate(&collation, &flight()).unwrap();
        assert_eq!(first.resolutions, second.resolutions);
        assert_eq!(first.solutions, second.solutions);
        assert_eq!(first.conflicts, second.conflicts);
    }

    #[test]
    fn test_violating_candidates_never_ranked() {
        let collation = Builder::new()
            .respond(AgentName::Maintenance, Phase::Initial, vec![grounded("G-XWBA")], vec![])
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![
                    candidate("delay-only", vec![RecoveryAction::Delay { minutes: 30 }], impact(1.0, 0.0)),
                    candidate("swap", vec![swap("G-XWBB")], impact(0.8, 60_000.0)),
                ],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();

        let ranked: Vec<_> = output.solutions.iter().map(|s| s.candidate.candidate_id.as_str()).collect();
        assert_eq!(ranked, vec!["swap"]);
        assert_eq!(output.rejected.len(), 1);
        assert_eq!(output.rejected[0].candidate.candidate_id, "delay-only");
        assert_eq!(output.rejected[0].violated[0].source_agent, AgentName::Maintenance);
    }

    #[test]
    fn test_all_candidates_violating_fails() {
        let collation = Builder::new()
            .respond(AgentName::Maintenance, Phase::Initial, vec![grounded("G-XWBA")], vec![])
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("delay", vec![RecoveryAction::Delay { minutes: 30 }], impact(1.0, 0.0))],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate("onto-grounded", vec![RecoveryAction::AircraftSwap {
                    from_tail: "G-XWBZ".to_string(),
                    to_tail: "G-XWBA".to_string(),
                }], impact(1.0, 0.0))],
            )
            .collation;

        let err = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap_err();
        let failure = err.failure();
        assert_eq!(failure.rejected.len(), 2);
        assert!(failure.reason.contains("violate"));
        assert!(failure.audit_trail.iter().any(|a| a.message.contains("Arbitration failed")));
    }

    #[test]
    fn test_no_business_candidates_fails() {
        let collation = Builder::new()
            .respond(AgentName::CrewCompliance, Phase::Initial, vec![], vec![])
            .unavailable(AgentName::Network, Phase::Initial)
            .collation;

        let failure = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap_err()
            .into_failure();
        assert!(failure.reason.contains("no business-class agent"));
        assert_eq!(failure.unavailable_agents, vec![AgentName::Network]);
    }

    #[test]
    fn test_exact_tie_goes_to_earliest_invocation() {
        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("a", vec![swap("G-XWBB")], impact(0.9, 10_000.0))],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate("b", vec![swap("G-XWBC")], impact(0.9, 10_000.0))],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        assert_eq!(output.resolutions[0].winner.agent, AgentName::Network);
        assert_eq!(output.resolutions[0].deciding_rule, DecidingRule::InvocationOrder);
    }

    #[test]
    fn test_failed_revision_keeps_invocation_order() {
        // Network revises in Phase 2; Finance's revision times out and its
        // Phase-1 response stands. Finance must not jump ahead of Network.
        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("a0", vec![swap("G-XWBD")], impact(0.5, 50_000.0))],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate("b", vec![swap("G-XWBC")], impact(0.9, 10_000.0))],
            )
            .respond(
                AgentName::Network,
                Phase::Revision,
                vec![],
                vec![candidate("a", vec![swap("G-XWBB")], impact(0.9, 10_000.0))],
            )
            .unavailable(AgentName::Finance, Phase::Revision)
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        let resolution = &output.resolutions[0];
        assert_eq!(resolution.winner.agent, AgentName::Network);
        assert_eq!(resolution.winner.candidate_id, "a");
        assert_eq!(resolution.deciding_rule, DecidingRule::InvocationOrder);
        assert!(output.audit_trail.iter().any(|a| a.message
            == "finance failed in the revision phase; its initial response is used"));
    }

    #[test]
    fn test_initial_failure_audits_revision_response() {
        let collation = Builder::new()
            .unavailable(AgentName::Network, Phase::Initial)
            .respond(
                AgentName::Network,
                Phase::Revision,
                vec![],
                vec![candidate("retry", vec![swap("G-XWBB")], impact(0.9, 10_000.0))],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        assert!(output.audit_trail.iter().any(|a| a.message
            == "network failed in the initial phase; its revision response is used"));
        assert!(output.unavailable_agents.is_empty());
    }

    #[test]
    fn test_extreme_delay_violates_latest_departure() {
        let collation = Builder::new()
            .respond(
                AgentName::Regulatory,
                Phase::Initial,
                vec![BindingConstraint {
                    rule: ConstraintRule::LatestDeparture {
                        at: Utc.with_ymd_and_hms(2026, 10, 18, 11, 0, 0).unwrap(),
                    },
                    reason: "JFK curfew".to_string(),
                }],
                vec![],
            )
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate(
                    "wrap",
                    vec![
                        RecoveryAction::Delay { minutes: u32::MAX },
                        RecoveryAction::Delay { minutes: 61 },
                    ],
                    impact(0.9, 10_000.0),
                )],
            )
            .collation;

        let failure = match Arbitrator::new(ArbitrationPolicy::default()).arbitrate(&collation, &flight()) {
            Err(ArbitrationError::NoSafetyCompliantSolution(failure)) => failure,
            other => panic!("expected a safety failure, got {:?}", other),
        };
        assert_eq!(failure.rejected.len(), 1);
        assert_eq!(failure.rejected[0].candidate.candidate_id, "wrap");
    }

    #[test]
    fn test_aggregate_tie_goes_to_safety_then_cost() {
        // Cost weight zero: cost differences cannot move the aggregate.
        let mut policy = ArbitrationPolicy::default();
        policy.weights.safety = 0.0;
        policy.weights.cost = 0.0;
        policy.weights.passenger = 0.6;
        policy.weights.network = 0.2;
        policy.weights.reputation = 0.2;

        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("a", vec![swap("G-XWBB")], impact(0.7, 10_000.0))],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate("b", vec![swap("G-XWBC")], impact(0.9, 50_000.0))],
            )
            .collation;
        let output = Arbitrator::new(policy.clone()).arbitrate(&collation, &flight()).unwrap();
        assert_eq!(output.resolutions[0].winner.candidate_id, "b");
        assert_eq!(output.resolutions[0].deciding_rule, DecidingRule::SafetyScore);

        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("a", vec![swap("G-XWBB")], impact(0.9, 50_000.0))],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate("b", vec![swap("G-XWBC")], impact(0.9, 10_000.0))],
            )
            .collation;
        let output = Arbitrator::new(policy).arbitrate(&collation, &flight()).unwrap();
        assert_eq!(output.resolutions[0].winner.candidate_id, "b");
        assert_eq!(output.resolutions[0].deciding_rule, DecidingRule::LowerCost);
    }

    #[test]
    fn test_same_agent_candidates_never_conflict() {
        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![
                    candidate("cancel", vec![RecoveryAction::Cancel], impact(1.0, 200_000.0)),
                    candidate("delay", vec![RecoveryAction::Delay { minutes: 90 }], impact(0.9, 20_000.0)),
                ],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        assert!(output.conflicts.is_empty());
        assert_eq!(output.solutions.len(), 2);
        assert_eq!(output.solutions[1].rank, 2);
    }

    #[test]
    fn test_connected_conflicts_form_one_group() {
        // a (network) cancels, b (cargo) delays 60, c (finance) delays 60:
        // a-b and a-c conflict, b-c agree, all three form one group.
        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("a", vec![RecoveryAction::Cancel], impact(0.9, 300_000.0))],
            )
            .respond(
                AgentName::Cargo,
                Phase::Initial,
                vec![],
                vec![candidate("b", vec![RecoveryAction::Delay { minutes: 60 }], impact(0.9, 30_000.0))],
            )
            .respond(
                AgentName::Finance,
                Phase::Initial,
                vec![],
                vec![candidate("c", vec![RecoveryAction::Delay { minutes: 60 }], impact(0.9, 20_000.0))],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        assert_eq!(output.conflicts.len(), 1);
        assert_eq!(output.conflicts[0].candidates.len(), 3);
        assert_eq!(output.conflicts[0].incompatibilities.len(), 2);
        assert_eq!(output.resolutions[0].winner.candidate_id, "c");
        let ranked: Vec<_> = output.solutions.iter().map(|s| s.candidate.candidate_id.as_str()).collect();
        assert_eq!(ranked, vec!["c"]);
    }

    #[test]
    fn test_revision_supersedes_and_failures_are_audited() {
        let collation = Builder::new()
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate("old", vec![swap("G-XWBB")], impact(0.9, 10_000.0))],
            )
            .unavailable(AgentName::Cargo, Phase::Initial)
            .respond(
                AgentName::Network,
                Phase::Revision,
                vec![],
                vec![candidate("new", vec![swap("G-XWBC")], impact(0.9, 10_000.0))],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        assert_eq!(output.top().unwrap().candidate.candidate_id, "new");
        assert_eq!(output.unavailable_agents, vec![AgentName::Cargo]);
        assert!(output.audit_trail.iter().any(|a| a.message.contains("cargo")));
        assert_eq!(decisive_phase(&collation, AgentName::Network), Some(Phase::Revision));
    }

    #[test]
    fn test_plan_orders_steps_and_appends_verifications() {
        let collation = Builder::new()
            .respond(AgentName::CrewCompliance, Phase::Initial, vec![crew_constraint("C100")], vec![])
            .respond(
                AgentName::Network,
                Phase::Initial,
                vec![],
                vec![candidate(
                    "full",
                    vec![
                        RecoveryAction::RebookPassengers { passengers: 20 },
                        RecoveryAction::Delay { minutes: 45 },
                        reassign("C100", "C200"),
                    ],
                    impact(0.9, 10_000.0),
                )],
            )
            .collation;

        let output = Arbitrator::new(ArbitrationPolicy::default())
            .arbitrate(&collation, &flight())
            .unwrap();
        let steps = &output.solutions[0].plan.steps;
        assert_eq!(steps.len(), 4);
        assert!(matches!(
            steps[0].kind,
            StepKind::Execute { action: RecoveryAction::CrewReassignment { .. } }
        ));
        assert!(matches!(steps[1].kind, StepKind::Execute { action: RecoveryAction::Delay { .. } }));
        assert!(matches!(
            steps[2].kind,
            StepKind::Execute { action: RecoveryAction::RebookPassengers { .. } }
        ));
        assert!(matches!(steps[3].kind, StepKind::VerifyConstraint { .. }));
        assert_eq!(steps[3].owner, AgentName::CrewCompliance);
        assert_eq!(steps.iter().map(|s| s.sequence).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_violation_rules() {
        let f = flight();
        let c = |actions| candidate("x", actions, impact(1.0, 0.0));

        let min_delay = ConstraintRule::MinimumDelay { minutes: 120 };
        assert!(violates(&min_delay, &c(vec![RecoveryAction::Delay { minutes: 60 }]), &f));
        assert!(!violates(&min_delay, &c(vec![swap("G-XWBB")]), &f));
        assert!(!violates(&min_delay, &c(vec![RecoveryAction::Cancel]), &f));

        let latest = ConstraintRule::LatestDeparture {
            at: Utc.with_ymd_and_hms(2026, 10, 18, 11, 0, 0).unwrap(),
        };
        assert!(!violates(&latest, &c(vec![RecoveryAction::Delay { minutes: 90 }]), &f));
        assert!(violates(&latest, &c(vec![RecoveryAction::Delay { minutes: 91 }]), &f));
        assert!(!violates(&latest, &c(vec![RecoveryAction::Cancel]), &f));
        assert!(violates(
            &latest,
            &c(vec![RecoveryAction::Delay { minutes: u32::MAX }, RecoveryAction::Delay { minutes: 61 }]),
            &f
        ));

        let short = ConstraintRule::MinimumDelay { minutes: u32::MAX };
        assert!(!violates(
            &short,
            &c(vec![RecoveryAction::Delay { minutes: u32::MAX }, RecoveryAction::Delay { minutes: 1 }]),
            &f
        ));

        let airport = ConstraintRule::ProhibitedAirport { iata: "BOS".to_string() };
        assert!(violates(&airport, &c(vec![RecoveryAction::Reroute { via: "bos".to_string() }]), &f));
        assert!(!violates(&airport, &c(vec![RecoveryAction::Reroute { via: "DUB".to_string() }]), &f));

        let crew = ConstraintRule::CrewMustBeReplaced { crew_id: "C100".to_string() };
        assert!(violates(&crew, &c(vec![RecoveryAction::Delay { minutes: 30 }]), &f));
        assert!(!violates(&crew, &c(vec![RecoveryAction::Cancel]), &f));
        assert!(violates(&crew, &c(vec![reassign("C101", "C100")]), &f));
    }
}
