// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::domain::disruption::DisruptionId;
use crate::domain::repository::{
    DecisionRecord, DecisionStore, OperationalDataError, OperationalDataStore, PersistenceError,
    RecordKind,
};

/// Snapshot layout: `{ "<kind>": { "<key>": <record> } }`.
pub type OperationalSnapshot = HashMap<RecordKind, HashMap<String, Value>>;

/// Read-mostly operational data held in memory. Lookups take a shared read
/// lock, so any number of agents can read concurrently.
#[derive(Clone, Default)]
pub struct InMemoryOperationalDataStore {
    records: Arc<RwLock<OperationalSnapshot>>,
}

impl InMemoryOperationalDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: OperationalSnapshot) -> Self {
        Self {
            records: Arc::new(RwLock::new(snapshot)),
        }
    }

    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let snapshot: OperationalSnapshot = serde_json::from_str(json)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read operational data: {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("Failed to parse operational data: {}", path.display()))
    }

    pub fn insert(&self, kind: RecordKind, key: impl Into<String>, record: Value) {
        self.records.write().entry(kind).or_default().insert(key.into(), record);
    }

    pub fn len(&self) -> usize {
        self.records.read().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OperationalDataStore for InMemoryOperationalDataStore {
    async fn lookup(&self, kind: RecordKind, key: &str) -> Result<Option<Value>, OperationalDataError> {
        let records = self.records.read();
        Ok(records.get(&kind).and_then(|by_key| by_key.get(key)).cloned())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDecisionStore {
    records: Arc<RwLock<Vec<DecisionRecord>>>,
}

impl InMemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<DecisionRecord> {
        self.records.read().clone()
    }
}

#[async_trait]
impl DecisionStore for InMemoryDecisionStore {
    async fn put(&self, record: &DecisionRecord) -> Result<String, PersistenceError> {
        self.records.write().push(record.clone());
        Ok(format!("memory://{}", record.object_key()))
    }

    async fn find_by_disruption(
        &self,
        disruption_id: DisruptionId,
    ) -> Result<Vec<DecisionRecord>, PersistenceError> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.disruption_id == disruption_id)
            .cloned()
            .collect())
    }
}
