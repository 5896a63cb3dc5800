// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for SkyMarshal CLI

pub mod config;
pub mod decision;
pub mod run;

pub use self::config::ConfigCommand;
pub use self::decision::DecisionCommand;
pub use self::run::RunArgs;
