// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `skymarshal run` - drive one disruption through the protocol
//!
//! Agents are backed by the configured LLM endpoint, or by a replay script
//! when `--replay` is given. Ctrl-C cancels the run; whatever was collated
//! so far is summarized before exiting.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use skymarshal_core::application::{DisruptionOrchestrator, HandleDisruptionUseCase, OrchestrationError};
use skymarshal_core::domain::config::SkyMarshalConfig;
use skymarshal_core::domain::disruption::DisruptionPayload;
use skymarshal_core::domain::invocation::AgentInvoker;
use skymarshal_core::domain::llm::GenerationOptions;
use skymarshal_core::domain::repository::OperationalDataStore;
use skymarshal_core::infrastructure::event_bus::{DisruptionEventReceiver, EventBus, EventBusError};
use skymarshal_core::infrastructure::llm::{LlmAgentInvoker, OpenAIAdapter};
use skymarshal_core::infrastructure::storage::{create_decision_store, StorageBackend};
use skymarshal_core::infrastructure::{
    InMemoryOperationalDataStore, ReplayAgentInvoker, ReplayScript,
};

use crate::render;

#[derive(Args)]
pub struct RunArgs {
    /// Disruption payload (JSON)
    #[arg(long, value_name = "FILE")]
    pub disruption: PathBuf,

    /// Serve agent results from a replay script instead of the LLM
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Operational data snapshot (JSON) for agent tool lookups
    #[arg(long, value_name = "FILE")]
    pub ops_data: Option<PathBuf>,

    /// Correlation id for this run (default: random)
    #[arg(long)]
    pub request_id: Option<String>,

    /// Print the full decision report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = SkyMarshalConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let payload = read_payload(&args.disruption)?;
    let disruption_id = payload.disruption_id;

    let event_bus = Arc::new(EventBus::new(config.spec.orchestration.event_bus_capacity));
    let invoker = build_invoker(&config, args.replay.as_deref(), args.ops_data.as_deref())?;
    let decision_store = create_decision_store(StorageBackend::Local {
        decision_dir: config.spec.storage.decision_dir.clone(),
    });
    let orchestrator = DisruptionOrchestrator::new(
        invoker,
        decision_store,
        event_bus.clone(),
        &config.spec.orchestration,
        config.spec.arbitration.clone(),
    );

    let progress = (!args.json)
        .then(|| tokio::spawn(print_progress(event_bus.subscribe_disruption(disruption_id))));

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling in-flight agents");
                cancel.cancel();
            }
        })
    };

    let request_id = args.request_id.unwrap_or_else(|| Uuid::new_v4().to_string());
    info!(%disruption_id, %request_id, "Starting disruption run");
    let result = orchestrator.handle(payload, request_id, &cancel).await;
    ctrl_c.abort();

    // Dropping the last sender closes the bus so the progress printer drains and exits
    drop(orchestrator);
    drop(event_bus);
    if let Some(progress) = progress {
        let _ = progress.await;
    }

    match result {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                render::print_report(&report);
            }
            if !report.outcome.is_decided() {
                anyhow::bail!("No safety-compliant recovery solution was found");
            }
            Ok(())
        }
        Err(OrchestrationError::Cancelled { phase, collation }) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&collation)?);
            } else {
                println!();
                println!("{}", format!("Run cancelled during the {} phase", phase).yellow().bold());
                render::print_collation(&collation);
            }
            anyhow::bail!("Run cancelled")
        }
        Err(e) => Err(e.into()),
    }
}

fn read_payload(path: &Path) -> Result<DisruptionPayload> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read disruption payload: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse disruption payload: {}", path.display()))
}

fn build_invoker(
    config: &SkyMarshalConfig,
    replay: Option<&Path>,
    ops_data: Option<&Path>,
) -> Result<Arc<dyn AgentInvoker>> {
    if let Some(path) = replay {
        info!(script = %path.display(), "Using replay agents");
        let script = ReplayScript::from_json_file(path)?;
        return Ok(Arc::new(ReplayAgentInvoker::new(script)));
    }

    let llm = config.spec.llm.as_ref().context(
        "No LLM endpoint configured. Set spec.llm in the configuration or pass --replay",
    )?;
    let provider = Arc::new(OpenAIAdapter::new(
        llm.endpoint.clone(),
        llm.resolved_api_key()?,
        llm.model.clone(),
    ));

    let data_store: Arc<dyn OperationalDataStore> = match ops_data {
        Some(path) => {
            let store = InMemoryOperationalDataStore::from_json_file(path)?;
            info!(records = store.len(), "Loaded operational data snapshot");
            Arc::new(store)
        }
        None => {
            warn!("No operational data snapshot given; agent tool lookups will find nothing");
            Arc::new(InMemoryOperationalDataStore::new())
        }
    };

    let options = GenerationOptions {
        max_tokens: Some(llm.max_tokens),
        temperature: Some(llm.temperature),
        json_mode: true,
    };
    info!(endpoint = %llm.endpoint, model = %llm.model, "Using LLM agents");
    Ok(Arc::new(LlmAgentInvoker::new(provider, data_store, options)))
}

async fn print_progress(mut events: DisruptionEventReceiver) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(line) = render::event_line(&event) {
                    println!("{}", line);
                }
            }
            Err(EventBusError::Lagged(n)) => {
                println!("{}", format!("  ... {} progress events skipped", n).dimmed());
            }
            Err(_) => break,
        }
    }
}
