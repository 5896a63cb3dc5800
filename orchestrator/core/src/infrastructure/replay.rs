// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Replay Agent Invoker
//!
//! Serves pre-recorded agent results for offline drills and tests, without
//! any model behind it.
//!
//! ```json
//! {
//!   "agents": {
//!     "maintenance": {
//!       "initial":  { "delay_ms": 120, "analysis": { ... } },
//!       "revision": { "error": { "kind": "invocation", "message": "tool error" } }
//!     },
//!     "cargo": { "initial": { "error": { "kind": "timeout" } } }
//!   }
//! }
//! ```
//!
//! - A missing `revision` step resubmits the `initial` analysis unchanged.
//! - An error of kind `timeout` never answers, so the caller's timeout fires.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::domain::agent::AgentName;
use crate::domain::collation::Phase;
use crate::domain::invocation::{AgentError, AgentErrorKind, AgentInvocationRequest, AgentInvoker};
use crate::domain::recommendation::AgentAnalysis;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayScript {
    #[serde(default)]
    pub agents: HashMap<AgentName, AgentScript>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentScript {
    #[serde(default)]
    pub initial: Option<ScriptedStep>,
    #[serde(default)]
    pub revision: Option<ScriptedStep>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptedStep {
    #[serde(default)]
    pub delay_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<AgentAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ScriptedError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedError {
    pub kind: AgentErrorKind,
    #[serde(default)]
    pub message: String,
}

impl ReplayScript {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let script: Self = serde_json::from_str(json)?;
        script.validate()?;
        Ok(script)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay script: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Invalid replay script: {}", path.display()))
    }

    /// Every step must carry exactly one of `analysis` or `error`.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (agent, script) in &self.agents {
            for (phase, step) in [(Phase::Initial, &script.initial), (Phase::Revision, &script.revision)] {
                if let Some(step) = step {
                    if step.analysis.is_some() == step.error.is_some() {
                        anyhow::bail!(
                            "{} {} step must set exactly one of 'analysis' or 'error'",
                            agent,
                            phase
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct ReplayAgentInvoker {
    script: ReplayScript,
}

impl ReplayAgentInvoker {
    pub fn new(script: ReplayScript) -> Self {
        Self { script }
    }

    fn step(&self, agent: AgentName, phase: Phase) -> Result<&ScriptedStep, AgentError> {
        let script = self
            .script
            .agents
            .get(&agent)
            .ok_or_else(|| AgentError::Invocation(format!("no replay script for {}", agent)))?;
        let step = match phase {
            Phase::Initial => script.initial.as_ref(),
            Phase::Revision => script.revision.as_ref().or(script.initial.as_ref()),
        };
        step.ok_or_else(|| AgentError::Invocation(format!("no {} step scripted for {}", phase, agent)))
    }
}

#[async_trait]
impl AgentInvoker for ReplayAgentInvoker {
    async fn invoke(&self, request: AgentInvocationRequest) -> Result<AgentAnalysis, AgentError> {
        let step = self.step(request.agent, request.phase)?;

        if step.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.delay_ms)).await;
        }

        match (&step.analysis, &step.error) {
            (Some(analysis), _) => Ok(analysis.clone()),
            (None, Some(error)) => match error.kind {
                AgentErrorKind::Timeout => futures::future::pending().await,
                AgentErrorKind::Invocation => Err(AgentError::Invocation(error.message.clone())),
                AgentErrorKind::OutputValidation => {
                    Err(AgentError::OutputValidation(error.message.clone()))
                }
            },
            (None, None) => Err(AgentError::Invocation(format!(
                "empty replay step for {}",
                request.agent
            ))),
        }
    }
}
