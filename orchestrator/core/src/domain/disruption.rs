// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Disruption Payload
//!
//! The immutable input to every orchestration phase, and the normalized
//! [`FlightInfo`] derived from it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisruptionId(pub Uuid);

impl DisruptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for DisruptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DisruptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisruptionType {
    Delay,
    Cancellation,
    EquipmentFault,
    CrewShortage,
    Weather,
    Other,
}

/// Flight identity as reported with the disruption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightIdentity {
    pub flight_number: String,
    pub flight_date: NaiveDate,
    pub origin: String,
    pub destination: String,
    pub scheduled_departure: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tail_number: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assigned_crew: Vec<String>,
}

/// Operational event requiring a recovery decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisruptionPayload {
    #[serde(default)]
    pub disruption_id: DisruptionId,
    pub flight: FlightIdentity,
    pub disruption_type: DisruptionType,
    pub description: String,
    pub reported_at: DateTime<Utc>,
    /// Free-form context forwarded verbatim to agents.
    #[serde(default)]
    pub context: serde_json::Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("flight number must not be empty")]
    MissingFlightNumber,
    #[error("disruption description must not be empty")]
    MissingDescription,
    #[error("invalid airport code '{0}'")]
    InvalidAirport(String),
}

impl DisruptionPayload {
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.flight.flight_number.trim().is_empty() {
            return Err(PayloadError::MissingFlightNumber);
        }
        if self.description.trim().is_empty() {
            return Err(PayloadError::MissingDescription);
        }
        for code in [&self.flight.origin, &self.flight.destination] {
            let code = code.trim();
            if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(PayloadError::InvalidAirport(code.to_string()));
            }
        }
        Ok(())
    }

    pub fn flight_info(&self) -> FlightInfo {
        FlightInfo::from(&self.flight)
    }
}

/// Normalized flight identity shared read-only by all agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightInfo {
    pub flight_number: String,
    pub flight_date: NaiveDate,
    pub origin: String,
    pub destination: String,
    pub scheduled_departure: DateTime<Utc>,
    pub tail_number: Option<String>,
    pub assigned_crew: Vec<String>,
}

impl FlightInfo {
    /// Key used for operational data lookups, e.g. `BA117/2026-10-18`.
    pub fn lookup_key(&self) -> String {
        format!("{}/{}", self.flight_number, self.flight_date)
    }
}

impl From<&FlightIdentity> for FlightInfo {
    fn from(flight: &FlightIdentity) -> Self {
        Self {
            flight_number: flight.flight_number.trim().to_ascii_uppercase(),
            flight_date: flight.flight_date,
            origin: flight.origin.trim().to_ascii_uppercase(),
            destination: flight.destination.trim().to_ascii_uppercase(),
            scheduled_departure: flight.scheduled_departure,
            tail_number: flight
                .tail_number
                .as_ref()
                .map(|t| t.trim().to_ascii_uppercase())
                .filter(|t| !t.is_empty()),
            assigned_crew: flight.assigned_crew.iter().map(|c| c.trim().to_string()).collect(),
        }
    }
}
