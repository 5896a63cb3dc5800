// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Decision record review commands
//!
//! Commands: show, list

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use skymarshal_core::domain::arbitration::DecisionOutcome;
use skymarshal_core::domain::config::SkyMarshalConfig;
use skymarshal_core::domain::disruption::DisruptionId;
use skymarshal_core::domain::repository::{DecisionRecord, DecisionStore};
use skymarshal_core::infrastructure::storage::LocalDecisionStore;

use crate::render;

#[derive(Subcommand)]
pub enum DecisionCommand {
    /// Pretty-print one stored decision record
    Show {
        /// Path to the record file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List stored records for one disruption
    List {
        /// Disruption id
        #[arg(value_name = "DISRUPTION_ID")]
        disruption_id: String,

        /// Decision directory (default: from configuration)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

pub async fn handle_command(
    command: DecisionCommand,
    config_path: Option<PathBuf>,
) -> Result<()> {
    match command {
        DecisionCommand::Show { file, json } => show(file, json).await,
        DecisionCommand::List { disruption_id, dir } => list(&disruption_id, dir, config_path).await,
    }
}

async fn show(file: PathBuf, json: bool) -> Result<()> {
    let record = LocalDecisionStore::load(&file)
        .await
        .with_context(|| format!("Failed to load decision record {}", file.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    print_header(&record);
    render::print_collation(&record.collation);
    render::print_outcome(&record.outcome, &record.collation);
    Ok(())
}

async fn list(disruption_id: &str, dir: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let disruption_id = DisruptionId::from_string(disruption_id)
        .with_context(|| format!("Invalid disruption id '{}'", disruption_id))?;

    let dir = match dir {
        Some(dir) => dir,
        None => {
            SkyMarshalConfig::load_or_default(config_path)
                .context("Failed to load configuration")?
                .spec
                .storage
                .decision_dir
        }
    };

    let store = LocalDecisionStore::new(dir);
    let records = store.find_by_disruption(disruption_id).await?;
    if records.is_empty() {
        println!("{}", "No decision records found".yellow());
        return Ok(());
    }

    println!("{} record(s) found in {}:", records.len(), store.base_path().display());
    println!("{:<38} {:<26} {:<10} {}", "RECORD", "CREATED", "OUTCOME", "REQUEST");
    for record in records {
        let outcome = match &record.outcome {
            DecisionOutcome::Decided { .. } => "decided".green(),
            DecisionOutcome::Failed { .. } => "failed".red(),
        };
        println!(
            "{:<38} {:<26} {:<10} {}",
            record.record_id,
            record.created_at.to_rfc3339(),
            outcome,
            record.request_id
        );
    }
    Ok(())
}

fn print_header(record: &DecisionRecord) {
    println!("{}", "Decision Record".bold());
    println!("  Record:     {}", record.record_id);
    println!("  Disruption: {}", record.disruption_id);
    println!("  Request:    {}", record.request_id);
    println!("  Created:    {}", record.created_at.to_rfc3339());
    println!();
}
