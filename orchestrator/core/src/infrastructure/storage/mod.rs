// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Storage Infrastructure Module
//!
//! Concrete implementations of the `DecisionStore` trait.

pub mod local;

pub use local::LocalDecisionStore;

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::repository::DecisionStore;
use crate::infrastructure::repositories::InMemoryDecisionStore;

/// Decision storage backend configuration
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// One JSON file per record under a directory
    Local { decision_dir: PathBuf },

    /// Process-local, lost on exit
    Memory,
}

/// Factory function to create a decision store from configuration
pub fn create_decision_store(backend: StorageBackend) -> Arc<dyn DecisionStore> {
    match backend {
        StorageBackend::Local { decision_dir } => Arc::new(LocalDecisionStore::new(decision_dir)),
        StorageBackend::Memory => Arc::new(InMemoryDecisionStore::new()),
    }
}
