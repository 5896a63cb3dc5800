// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! SkyMarshal core
//!
//! Multi-agent airline-disruption decision system: seven domain agents
//! recommend, revise with peer context, and an arbitrator turns their
//! outputs into one safety-compliant ranked decision.
//!
//! # Architecture
//!
//! - **domain:** types, invariants and collaborator traits
//! - **application:** phase runner, collator, arbitrator, orchestrator
//! - **infrastructure:** event bus, LLM and replay adapters, stores

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
