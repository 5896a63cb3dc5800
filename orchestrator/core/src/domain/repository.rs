// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Contracts for the two storage collaborators of the orchestration core,
//! declared in the domain layer and implemented in
//! `crate::infrastructure::repositories` and `crate::infrastructure::storage`.
//!
//! | Trait | Access | Implementations |
//! |-------|--------|----------------|
//! | `OperationalDataStore` | read-only, concurrent | `InMemoryOperationalDataStore` |
//! | `DecisionStore` | append-only audit | `InMemoryDecisionStore`, `LocalDecisionStore` |
//!
//! Operational lookups are issued by many agents at once and must tolerate
//! concurrent reads. A lookup failure degrades only the asking agent's
//! context. A decision write failure never invalidates the decision.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::arbitration::DecisionOutcome;
use crate::domain::collation::Collation;
use crate::domain::disruption::DisruptionId;

/// Category of operational record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Flight,
    CrewRoster,
    Aircraft,
    CargoManifest,
    Bookings,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecordKind::Flight => "flight",
            RecordKind::CrewRoster => "crew_roster",
            RecordKind::Aircraft => "aircraft",
            RecordKind::CargoManifest => "cargo_manifest",
            RecordKind::Bookings => "bookings",
        };
        f.write_str(s)
    }
}

/// Read-only operational data lookups keyed by flight, crew, aircraft or
/// cargo identifier.
#[async_trait]
pub trait OperationalDataStore: Send + Sync {
    async fn lookup(
        &self,
        kind: RecordKind,
        key: &str,
    ) -> Result<Option<serde_json::Value>, OperationalDataError>;
}

#[derive(Debug, thiserror::Error)]
pub enum OperationalDataError {
    #[error("Operational data store unavailable: {0}")]
    Unavailable(String),

    #[error("Operational data backend error: {0}")]
    Backend(String),
}

/// Decision plus provenance, as handed to the decision store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub record_id: Uuid,
    pub request_id: String,
    pub disruption_id: DisruptionId,
    pub created_at: DateTime<Utc>,
    pub outcome: DecisionOutcome,
    pub collation: Collation,
}

impl DecisionRecord {
    pub fn new(request_id: impl Into<String>, outcome: DecisionOutcome, collation: Collation) -> Self {
        Self {
            record_id: Uuid::new_v4(),
            request_id: request_id.into(),
            disruption_id: collation.disruption_id,
            created_at: Utc::now(),
            outcome,
            collation,
        }
    }

    /// Object key under which the record is stored.
    pub fn object_key(&self) -> String {
        format!("{}-{}.json", self.disruption_id, self.record_id)
    }
}

/// Durable audit storage for decision records.
#[async_trait]
pub trait DecisionStore: Send + Sync {
    /// Store the record and return its location.
    async fn put(&self, record: &DecisionRecord) -> Result<String, PersistenceError>;

    /// Records stored for a disruption, oldest first.
    async fn find_by_disruption(
        &self,
        disruption_id: DisruptionId,
    ) -> Result<Vec<DecisionRecord>, PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        PersistenceError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(err: std::io::Error) -> Self {
        PersistenceError::Io(err.to_string())
    }
}
