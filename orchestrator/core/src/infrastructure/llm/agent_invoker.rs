// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM-backed Agent Invoker
//
// Implements the AgentInvoker contract on top of any LLMProvider:
// look up the agent's operational records, render its prompt, call the model
// and parse the structured analysis out of the reply.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::agent::ToolCapability;
use crate::domain::invocation::{AgentError, AgentInvocationRequest, AgentInvoker};
use crate::domain::llm::{
    FinishReason, GenerationOptions, GenerationRequest, LLMError, LLMProvider,
};
use crate::domain::recommendation::AgentAnalysis;
use crate::domain::repository::{OperationalDataStore, RecordKind};
use crate::infrastructure::prompt_template_engine::{
    role_description, PromptContext, PromptTemplateEngine,
};

pub struct LlmAgentInvoker {
    provider: Arc<dyn LLMProvider>,
    data_store: Arc<dyn OperationalDataStore>,
    templates: PromptTemplateEngine,
    options: GenerationOptions,
}

/// Records found for one request plus the lookups that failed.
#[derive(Debug, Default)]
struct AgentRecords {
    found: Map<String, Value>,
    degraded: Vec<String>,
}

impl LlmAgentInvoker {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        data_store: Arc<dyn OperationalDataStore>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            provider,
            data_store,
            templates: PromptTemplateEngine::new(),
            options,
        }
    }

    /// Lookups implied by the agent's tool capability set.
    fn lookups(request: &AgentInvocationRequest) -> Vec<(RecordKind, String)> {
        let flight = &request.flight;
        let flight_key = flight.lookup_key();
        let mut lookups = Vec::new();

        for tool in &request.tools {
            match tool {
                ToolCapability::FlightLookup => lookups.push((RecordKind::Flight, flight_key.clone())),
                ToolCapability::CrewRoster => {
                    if flight.assigned_crew.is_empty() {
                        lookups.push((RecordKind::CrewRoster, flight_key.clone()));
                    }
                    for crew in &flight.assigned_crew {
                        lookups.push((RecordKind::CrewRoster, crew.clone()));
                    }
                }
                ToolCapability::AircraftStatus => {
                    if let Some(tail) = &flight.tail_number {
                        lookups.push((RecordKind::Aircraft, tail.clone()));
                    }
                }
                ToolCapability::CargoManifest => {
                    lookups.push((RecordKind::CargoManifest, flight_key.clone()))
                }
                ToolCapability::PassengerBookings => {
                    lookups.push((RecordKind::Bookings, flight_key.clone()))
                }
            }
        }
        lookups
    }

    /// Failed lookups degrade only this agent's context.
    async fn gather_records(&self, request: &AgentInvocationRequest) -> AgentRecords {
        let lookups = Self::lookups(request);
        let results = join_all(lookups.iter().map(|(kind, key)| self.data_store.lookup(*kind, key))).await;

        let mut records = AgentRecords::default();
        for ((kind, key), result) in lookups.into_iter().zip(results) {
            let label = format!("{}/{}", kind, key);
            match result {
                Ok(Some(value)) => {
                    records.found.insert(label, value);
                }
                Ok(None) => debug!(agent = %request.agent, record = %label, "No operational record"),
                Err(e) => {
                    warn!(agent = %request.agent, record = %label, error = %e, "Operational lookup failed");
                    records.degraded.push(format!("{}: {}", label, e));
                }
            }
        }
        records
    }

    fn prompt_context(
        request: &AgentInvocationRequest,
        records: AgentRecords,
    ) -> Result<PromptContext, AgentError> {
        let peer_context = request.peer_context.as_ref().map(pretty).transpose()?;

        Ok(PromptContext {
            agent: request.agent.to_string(),
            agent_class: request.agent.class().to_string(),
            role: role_description(request.agent).to_string(),
            safety: request.agent.is_safety(),
            phase: request.phase.to_string(),
            revision: request.phase.revision(),
            disruption: pretty(&request.disruption)?,
            flight: pretty(&request.flight)?,
            tools: request
                .tools
                .iter()
                .map(|t| {
                    serde_json::to_value(t)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_else(|| format!("{:?}", t))
                })
                .collect(),
            records: pretty(&Value::Object(records.found))?,
            degraded: records.degraded,
            peer_context,
            schema: String::new(),
        })
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String, AgentError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AgentError::Invocation(format!("failed to serialize prompt input: {}", e)))
}

/// Pull the JSON object out of a model reply: fenced block first, then the
/// outermost braces, then the raw text.
pub fn extract_json(text: &str) -> &str {
    for marker in ["```json", "```"] {
        if let Some(start) = text.find(marker) {
            let content_start = start + marker.len();
            if let Some(end_offset) = text[content_start..].find("```") {
                return text[content_start..content_start + end_offset].trim();
            }
        }
    }
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text.trim(),
    }
}

fn map_llm_error(error: LLMError) -> AgentError {
    AgentError::Invocation(error.to_string())
}

#[async_trait]
impl AgentInvoker for LlmAgentInvoker {
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentAnalysis, AgentError> {
        let records = self.gather_records(&request).await;
        let context = Self::prompt_context(&request, records)?;
        let prompt = self
            .templates
            .render_agent_prompt(&context)
            .map_err(|e| AgentError::Invocation(format!("{:#}", e)))?;

        let response = self
            .provider
            .generate(&GenerationRequest {
                system: prompt.system,
                prompt: prompt.user,
                options: self.options.clone(),
            })
            .await
            .map_err(map_llm_error)?;

        debug!(
            agent = %request.agent,
            model = %response.model,
            tokens = response.usage.total_tokens,
            "Model replied"
        );

        match response.finish_reason {
            FinishReason::Length => {
                return Err(AgentError::OutputValidation(
                    "model output truncated at max_tokens".to_string(),
                ))
            }
            FinishReason::ContentFilter => {
                return Err(AgentError::Invocation(
                    "model output blocked by content filter".to_string(),
                ))
            }
            FinishReason::Stop => {}
        }

        serde_json::from_str::<AgentAnalysis>(extract_json(&response.text))
            .map_err(|e| AgentError::OutputValidation(format!("unparsable analysis: {}", e)))
    }
}
