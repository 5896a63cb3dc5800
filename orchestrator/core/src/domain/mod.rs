// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure domain types for disruption handling. No I/O dependencies beyond the
//! collaborator traits declared here.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`agent`] | `AgentName`, `AgentClass`, `ToolCapability` |
//! | [`disruption`] | `DisruptionPayload`, `FlightInfo` |
//! | [`recommendation`] | `AgentAnalysis`, `AgentResponse`, `DomainOutput`, `CandidateSolution` |
//! | [`collation`] | `Collation`, `CollationEntry`, `Phase` |
//! | [`arbitration`] | `ArbitratorOutput`, `ConflictDetail`, `ResolutionDetail`, `SafetyOverride` |
//! | [`policy`] | `ArbitrationPolicy`, `CriteriaWeights` |
//! | [`invocation`] | `AgentInvoker`, `AgentError` |
//! | [`llm`] | `LLMProvider` |
//! | [`events`] | `OrchestrationEvent` |
//! | [`repository`] | `OperationalDataStore`, `DecisionStore`, `DecisionRecord` |
//! | [`config`] | `SkyMarshalConfig` |

pub mod agent;
pub mod disruption;
pub mod recommendation;
pub mod collation;
pub mod arbitration;
pub mod policy;
pub mod invocation;
pub mod llm;
pub mod events;
pub mod repository;
pub mod config;
