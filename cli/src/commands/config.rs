// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use skymarshal_core::domain::config::{LlmConfig, SkyMarshalConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./skymarshal.yaml)
        #[arg(short, long, default_value = "./skymarshal.yaml")]
        output: PathBuf,

        /// Include an OpenAI-compatible LLM endpoint block
        #[arg(long)]
        with_llm: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, with_llm } => generate(&output, with_llm).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = SkyMarshalConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. SKYMARSHAL_CONFIG_PATH: {}",
            std::env::var("SKYMARSHAL_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./skymarshal.yaml");
        println!("  4. ~/.skymarshal/config.yaml");
        println!("  5. /etc/skymarshal/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    let orchestration = &config.spec.orchestration;
    println!("{}", "Orchestration:".bold());
    println!("  Agent timeout: {:?}", orchestration.agent_timeout);
    println!(
        "  Retry unavailable agents in revision: {}",
        orchestration.retry_unavailable_in_revision
    );
    println!("  Event bus capacity: {}", orchestration.event_bus_capacity);
    println!();

    let weights = &config.spec.arbitration.weights;
    println!("{}", "Arbitration weights:".bold());
    println!("  safety      {:.2}", weights.safety);
    println!("  cost        {:.2}", weights.cost);
    println!("  passenger   {:.2}", weights.passenger);
    println!("  network     {:.2}", weights.network);
    println!("  reputation  {:.2}", weights.reputation);
    println!();

    println!("{}", "LLM:".bold());
    match &config.spec.llm {
        Some(llm) => {
            println!("  Endpoint: {}", llm.endpoint);
            println!("  Model: {}", llm.model);
            println!("  Temperature: {}", llm.temperature);
            println!("  Max tokens: {}", llm.max_tokens);
        }
        None => println!("  {}", "(not configured, use --replay)".dimmed()),
    }
    println!();

    println!("{}", "Storage:".bold());
    println!("  Decision directory: {}", config.spec.storage.decision_dir.display());
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = SkyMarshalConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: &Path, with_llm: bool) -> Result<()> {
    let config = sample_config(with_llm);
    config
        .to_yaml_file(output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn sample_config(with_llm: bool) -> SkyMarshalConfig {
    let mut config = SkyMarshalConfig::default();
    if with_llm {
        config.spec.llm = Some(LlmConfig {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: Some("env:OPENAI_API_KEY".to_string()),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            max_tokens: 2048,
        });
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skymarshal.yaml");

        generate(&path, true).await.unwrap();

        let loaded = SkyMarshalConfig::from_yaml_file(&path).unwrap();
        loaded.validate().unwrap();
        let llm = loaded.spec.llm.unwrap();
        assert_eq!(llm.api_key.as_deref(), Some("env:OPENAI_API_KEY"));
        assert_eq!(loaded.spec.orchestration.agent_timeout.as_secs(), 60);
    }

    #[test]
    fn test_sample_without_llm() {
        assert!(sample_config(false).spec.llm.is_none());
    }
}
