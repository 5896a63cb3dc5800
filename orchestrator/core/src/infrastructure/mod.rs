// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod llm;
pub mod prompt_template_engine;
pub mod replay;
pub mod repositories;
pub mod storage;

pub use replay::{ReplayAgentInvoker, ReplayScript};
pub use repositories::{InMemoryDecisionStore, InMemoryOperationalDataStore};
