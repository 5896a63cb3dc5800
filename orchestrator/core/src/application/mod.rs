// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod phase;
pub mod collator;
pub mod arbitrator;
pub mod orchestrator;

// Re-export use cases for convenience
pub use orchestrator::{
    DecisionReport, DisruptionOrchestrator, HandleDisruptionUseCase, OrchestrationError,
    PersistenceStatus,
};
