// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Renders agent prompts with Handlebars.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn an invocation request plus looked-up records into the
//!   system and user prompts sent to the LLM provider
//! - **Integration:** `AgentInvocationRequest` → `LlmAgentInvoker` → LLM input
//!
//! # Supported Placeholders
//!
//! - `{{agent}}`, `{{agent_class}}`, `{{role}}` - Agent identity
//! - `{{phase}}`, `{{revision}}` - Current phase
//! - `{{disruption}}`, `{{flight}}` - Pretty-printed payload JSON
//! - `{{tools}}` - Tool capability list
//! - `{{records}}` - Operational records found for this agent
//! - `{{degraded}}` - Lookups that failed (array)
//! - `{{peer_context}}` - Labeled Phase-1 outputs (revision round only)

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::{Deserialize, Serialize};

use crate::domain::agent::AgentName;

/// Shape of the JSON object every agent must answer with.
pub const ANALYSIS_SCHEMA: &str = r#"{
  "recommendation": string,
  "confidence": number between 0 and 1,
  "reasoning": string,
  "binding_constraints": [            // safety-class agents only
    { "rule": "crew_must_be_replaced", "crew_id": string, "reason": string }
    | { "rule": "aircraft_grounded", "tail_number": string, "reason": string }
    | { "rule": "minimum_delay", "minutes": integer, "reason": string }
    | { "rule": "latest_departure", "at": RFC3339 timestamp, "reason": string }
    | { "rule": "prohibited_airport", "iata": string, "reason": string }
  ],
  "candidates": [                     // business-class agents
    {
      "candidate_id": string, "title": string,
      "actions": [ { "action": "aircraft_swap" | "crew_reassignment" | "delay"
                     | "cancel" | "reroute" | "rebook_passengers" | "offload_cargo", ... } ],
      "impact": { "safety_margin": 0..1, "cost_usd": number, "passengers_affected": integer,
                  "downstream_flights_affected": integer, "reputation_risk": 0..1 }
    }
  ],
  "output": { "domain": "{{agent}}", ...domain fields }
}"#;

const SYSTEM_TEMPLATE: &str = "You are the {{agent}} agent ({{agent_class}} class) of an airline \
operations control centre. {{role}}\n\n\
{{#if safety}}You may declare binding constraints. They are non-negotiable and filter out any \
recovery option that breaks them.{{else}}You must not declare binding constraints. Propose \
candidate recovery solutions with your own impact estimate.{{/if}}\n\n\
Answer with a single JSON object of this shape and nothing else:\n{{schema}}";

const USER_TEMPLATE: &str = "Phase: {{phase}} (revision {{revision}})\n\n\
Disruption:\n{{disruption}}\n\n\
Flight:\n{{flight}}\n\n\
Tools available: {{#each tools}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}\n\n\
Operational records:\n{{records}}\n\
{{#if degraded}}\nThe following lookups failed; reason with what is available:\n\
{{#each degraded}}- {{this}}\n{{/each}}{{/if}}\
{{#if peer_context}}\nPhase-1 outputs of all agents (is_self marks your own):\n{{peer_context}}\n\n\
Review your peers' findings. Resubmit your analysis unchanged or revise it.{{/if}}";

/// Context data for agent prompt rendering
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptContext {
    pub agent: String,
    pub agent_class: String,
    pub role: String,
    pub safety: bool,
    pub phase: String,
    pub revision: u8,
    pub disruption: String,
    pub flight: String,
    pub tools: Vec<String>,
    pub records: String,
    pub degraded: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer_context: Option<String>,
    pub schema: String,
}

/// System and user prompt pair.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        // Don't fail on missing variables
        handlebars.set_strict_mode(false);
        // Prompts carry JSON, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render(&self, template: &str, context: &PromptContext) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render prompt template")
    }

    pub fn render_agent_prompt(&self, context: &PromptContext) -> Result<RenderedPrompt> {
        let schema = self
            .handlebars
            .render_template(ANALYSIS_SCHEMA, context)
            .context("Failed to render analysis schema")?;
        let context = PromptContext {
            schema,
            ..context.clone()
        };
        Ok(RenderedPrompt {
            system: self.render(SYSTEM_TEMPLATE, &context)?,
            user: self.render(USER_TEMPLATE, &context)?,
        })
    }
}

impl Default for PromptTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line brief for each agent's domain.
pub fn role_description(agent: AgentName) -> &'static str {
    match agent {
        AgentName::CrewCompliance => {
            "Check flight duty periods, rest requirements and qualifications of the assigned crew."
        }
        AgentName::Maintenance => {
            "Assess airworthiness, open defects and deferred items of the scheduled aircraft."
        }
        AgentName::Regulatory => {
            "Check curfews, slot restrictions, NOTAMs and overflight or airport restrictions."
        }
        AgentName::Network => {
            "Protect the downstream schedule: aircraft rotations, spare aircraft and knock-on delays."
        }
        AgentName::GuestExperience => {
            "Minimize passenger impact: connections at risk, rebooking and premium passengers."
        }
        AgentName::Cargo => "Protect cargo commitments, especially perishable and priority shipments.",
        AgentName::Finance => {
            "Estimate the total cost of each option, including compensation exposure."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> PromptContext {
        PromptContext {
            agent: "network".to_string(),
            agent_class: "business".to_string(),
            role: role_description(AgentName::Network).to_string(),
            safety: false,
            phase: "initial".to_string(),
            revision: 1,
            disruption: "{\"description\": \"A & B <late>\"}".to_string(),
            flight: "{}".to_string(),
            tools: vec!["flight_lookup".to_string(), "aircraft_status".to_string()],
            records: "{}".to_string(),
            degraded: vec![],
            peer_context: None,
            schema: String::new(),
        }
    }

    #[test]
    fn test_agent_prompt_renders_without_escaping() {
        let prompt = PromptTemplateEngine::new().render_agent_prompt(&context()).unwrap();
        assert!(prompt.system.contains("You are the network agent (business class)"));
        assert!(prompt.system.contains("\"domain\": \"network\""));
        assert!(prompt.system.contains("must not declare binding constraints"));
        assert!(prompt.user.contains("A & B <late>"));
        assert!(prompt.user.contains("Tools available: flight_lookup, aircraft_status"));
        assert!(!prompt.user.contains("Phase-1 outputs"));
        assert!(!prompt.user.contains("lookups failed"));
    }

    #[test]
    fn test_revision_prompt_includes_peers_and_degraded_lookups() {
        let ctx = PromptContext {
            phase: "revision".to_string(),
            revision: 2,
            peer_context: Some("[{\"agent\": \"cargo\", \"is_self\": false}]".to_string()),
            degraded: vec!["aircraft/G-XWBA: store unavailable".to_string()],
            ..context()
        };
        let prompt = PromptTemplateEngine::new().render_agent_prompt(&ctx).unwrap();
        assert!(prompt.user.contains("revision 2"));
        assert!(prompt.user.contains("\"is_self\": false"));
        assert!(prompt.user.contains("- aircraft/G-XWBA: store unavailable"));
    }
}
