// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Terminal rendering of progress events, collations and decisions.

use colored::Colorize;

use skymarshal_core::application::arbitrator::decisive_phase;
use skymarshal_core::application::{DecisionReport, PersistenceStatus};
use skymarshal_core::domain::arbitration::{
    ArbitrationFailure, ArbitratorOutput, DecidingRule, DecisionOutcome, SafetyOverride,
};
use skymarshal_core::domain::collation::{Collation, EntryOutcome, Phase};
use skymarshal_core::domain::events::OrchestrationEvent;
use skymarshal_core::domain::recommendation::ConstraintRule;

/// One progress line per event worth showing, `None` for the rest.
pub fn event_line(event: &OrchestrationEvent) -> Option<String> {
    match event {
        OrchestrationEvent::PhaseStarted { phase, agents, .. } => Some(format!(
            "{} {} phase: invoking {} agent(s)",
            "▶".cyan(),
            phase,
            agents.len()
        )),
        OrchestrationEvent::AgentResponded {
            phase,
            agent,
            confidence,
            candidate_count,
            constraint_count,
            ..
        } => Some(format!(
            "  {} {} ({}) confidence {:.2}, {} candidate(s), {} constraint(s)",
            "✓".green(),
            agent,
            phase,
            confidence,
            candidate_count,
            constraint_count
        )),
        OrchestrationEvent::AgentUnavailable {
            phase,
            agent,
            error_kind,
            message,
            ..
        } => Some(format!(
            "  {} {} ({}) unavailable [{:?}]: {}",
            "✗".red(),
            agent,
            phase,
            error_kind,
            message
        )),
        OrchestrationEvent::PhaseCompleted {
            phase,
            responded,
            unavailable,
            ..
        } => Some(format!(
            "{} {} phase complete: {} responded, {} unavailable",
            "■".cyan(),
            phase,
            responded,
            unavailable
        )),
        OrchestrationEvent::ArbitrationFailed { reason, .. } => {
            Some(format!("{} arbitration failed: {}", "✗".red(), reason))
        }
        _ => None,
    }
}

pub fn print_report(report: &DecisionReport) {
    println!();
    println!("{}", "Decision Report".bold());
    println!("  Request: {}", report.request_id);
    println!("  Record:  {}", report.record_id);
    println!();

    print_collation(&report.collation);
    print_outcome(&report.outcome, &report.collation);
    print_persistence(&report.persistence);
}

pub fn print_collation(collation: &Collation) {
    println!("{}", "Collation:".bold());
    for phase in [Phase::Initial, Phase::Revision] {
        let mut entries = collation.phase_entries(phase).peekable();
        if entries.peek().is_none() {
            continue;
        }
        println!("  {} phase", phase);
        for entry in entries {
            match &entry.outcome {
                EntryOutcome::Responded { response } => println!(
                    "    {:<18} {} {}",
                    entry.agent.to_string(),
                    "responded".green(),
                    response.analysis.recommendation.dimmed()
                ),
                EntryOutcome::Unavailable { error_kind, message } => println!(
                    "    {:<18} {} [{:?}] {}",
                    entry.agent.to_string(),
                    "unavailable".red(),
                    error_kind,
                    message
                ),
            }
        }
    }
    println!();
}

pub fn print_outcome(outcome: &DecisionOutcome, collation: &Collation) {
    match outcome {
        DecisionOutcome::Decided { output } => print_output(output, collation),
        DecisionOutcome::Failed { failure } => print_failure(failure),
    }
}

fn print_output(output: &ArbitratorOutput, collation: &Collation) {
    print_overrides(&output.safety_overrides);

    if !output.rejected.is_empty() {
        println!("{}", "Rejected (safety):".bold());
        for rejected in &output.rejected {
            println!("  {} {}", "✗".red(), rejected.candidate);
        }
        println!();
    }

    if !output.resolutions.is_empty() {
        println!("{}", "Conflicts:".bold());
        for resolution in &output.resolutions {
            println!(
                "  {} won by {}: {}",
                resolution.conflict_id,
                rule_label(resolution.deciding_rule),
                resolution.rationale
            );
            for score in &resolution.scores {
                let marker = if score.candidate == resolution.winner {
                    "★".yellow()
                } else {
                    " ".normal()
                };
                println!(
                    "    {} {:<32} aggregate {:.4}  safety {:.4}  cost ${:.0}",
                    marker,
                    score.candidate.to_string(),
                    score.score.aggregate,
                    score.score.safety,
                    score.score.cost_usd
                );
            }
        }
        println!();
    }

    println!("{}", "Recommended solutions:".bold());
    for solution in &output.solutions {
        let proposed_in = decisive_phase(collation, solution.candidate.agent)
            .map(|p| p.to_string())
            .unwrap_or_default();
        println!(
            "  {}. {} ({}, {} phase) aggregate {:.4}",
            solution.rank,
            solution.title.bold(),
            solution.candidate,
            proposed_in,
            solution.score.aggregate
        );
        for step in &solution.plan.steps {
            println!("      {:>2}. [{}] {}", step.sequence, step.owner, step.description);
        }
    }

    if !output.unavailable_agents.is_empty() {
        println!();
        println!(
            "{} decided without: {}",
            "⚠".yellow(),
            output
                .unavailable_agents
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    println!();
}

fn print_failure(failure: &ArbitrationFailure) {
    print_overrides(&failure.safety_overrides);
    println!("{}", "No safety-compliant solution".red().bold());
    println!("  Reason: {}", failure.reason);
    for rejected in &failure.rejected {
        let rules: Vec<String> = rejected
            .violated
            .iter()
            .map(|o| describe_rule(&o.constraint.rule))
            .collect();
        println!("  {} {} violates {}", "✗".red(), rejected.candidate, rules.join("; "));
    }
    println!();
}

fn print_overrides(overrides: &[SafetyOverride]) {
    if overrides.is_empty() {
        return;
    }
    println!("{}", "Binding safety constraints:".bold());
    for o in overrides {
        println!(
            "  {} {} (from {}, revision {}): {}",
            "●".red(),
            describe_rule(&o.constraint.rule),
            o.source_agent,
            o.revision,
            o.constraint.reason
        );
    }
    println!();
}

fn print_persistence(status: &PersistenceStatus) {
    match status {
        PersistenceStatus::Stored { location } => {
            println!("{}", format!("✓ Decision record stored: {}", location).green())
        }
        PersistenceStatus::Failed { warning } => {
            println!("{}", format!("⚠ {}", warning).yellow())
        }
    }
}

pub fn describe_rule(rule: &ConstraintRule) -> String {
    match rule {
        ConstraintRule::CrewMustBeReplaced { crew_id } => format!("crew {} must be replaced", crew_id),
        ConstraintRule::AircraftGrounded { tail_number } => format!("aircraft {} is grounded", tail_number),
        ConstraintRule::MinimumDelay { minutes } => format!("delay of at least {} min", minutes),
        ConstraintRule::LatestDeparture { at } => format!("depart no later than {}", at.format("%Y-%m-%d %H:%MZ")),
        ConstraintRule::ProhibitedAirport { iata } => format!("no operation via {}", iata),
    }
}

fn rule_label(rule: DecidingRule) -> &'static str {
    match rule {
        DecidingRule::WeightedScore => "weighted score",
        DecidingRule::SafetyScore => "safety score",
        DecidingRule::LowerCost => "lower cost",
        DecidingRule::InvocationOrder => "invocation order",
    }
}
