// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agent Identity
//!
//! The seven domain agents and their fixed classification. Safety-class agents
//! may declare binding constraints; business-class agents only propose
//! weighed candidate solutions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of one of the seven domain agents.
///
/// Declaration order is the canonical invocation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentName {
    CrewCompliance,
    Maintenance,
    Regulatory,
    Network,
    GuestExperience,
    Cargo,
    Finance,
}

/// Override authority of an agent in arbitration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentClass {
    /// Output can impose binding, non-negotiable constraints.
    Safety,
    /// Output is a weighed, non-binding recommendation.
    Business,
}

/// Operational lookup an agent is allowed to perform while analyzing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCapability {
    FlightLookup,
    CrewRoster,
    AircraftStatus,
    CargoManifest,
    PassengerBookings,
}

impl AgentName {
    /// All agents in invocation order.
    pub const ALL: [AgentName; 7] = [
        AgentName::CrewCompliance,
        AgentName::Maintenance,
        AgentName::Regulatory,
        AgentName::Network,
        AgentName::GuestExperience,
        AgentName::Cargo,
        AgentName::Finance,
    ];

    /// Fixed classification. Not configurable.
    pub fn class(&self) -> AgentClass {
        match self {
            AgentName::CrewCompliance | AgentName::Maintenance | AgentName::Regulatory => {
                AgentClass::Safety
            }
            AgentName::Network
            | AgentName::GuestExperience
            | AgentName::Cargo
            | AgentName::Finance => AgentClass::Business,
        }
    }

    pub fn is_safety(&self) -> bool {
        self.class() == AgentClass::Safety
    }

    /// Tool capability set handed to the invocation adapter.
    pub fn tools(&self) -> &'static [ToolCapability] {
        use ToolCapability::*;
        match self {
            AgentName::CrewCompliance => &[FlightLookup, CrewRoster],
            AgentName::Maintenance => &[FlightLookup, AircraftStatus],
            AgentName::Regulatory => &[FlightLookup, AircraftStatus, CrewRoster],
            AgentName::Network => &[FlightLookup, AircraftStatus],
            AgentName::GuestExperience => &[FlightLookup, PassengerBookings],
            AgentName::Cargo => &[FlightLookup, CargoManifest],
            AgentName::Finance => &[FlightLookup, PassengerBookings, CargoManifest],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentName::CrewCompliance => "crew_compliance",
            AgentName::Maintenance => "maintenance",
            AgentName::Regulatory => "regulatory",
            AgentName::Network => "network",
            AgentName::GuestExperience => "guest_experience",
            AgentName::Cargo => "cargo",
            AgentName::Finance => "finance",
        }
    }
}

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown agent name: {0}")]
pub struct UnknownAgentName(pub String);

impl FromStr for AgentName {
    type Err = UnknownAgentName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentName::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAgentName(s.to_string()))
    }
}

impl fmt::Display for AgentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentClass::Safety => f.write_str("safety"),
            AgentClass::Business => f.write_str("business"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_fixed() {
        let safety: Vec<_> = AgentName::ALL.iter().filter(|a| a.is_safety()).collect();
        assert_eq!(
            safety,
            vec![&AgentName::CrewCompliance, &AgentName::Maintenance, &AgentName::Regulatory]
        );
        assert_eq!(AgentName::Finance.class(), AgentClass::Business);
        assert_eq!(AgentName::GuestExperience.class(), AgentClass::Business);
    }

    #[test]
    fn test_name_roundtrip() {
        for agent in AgentName::ALL {
            assert_eq!(agent.as_str().parse::<AgentName>().unwrap(), agent);
            let json = serde_json::to_string(&agent).unwrap();
            assert_eq!(json, format!("\"{}\"", agent.as_str()));
        }
        assert!("dispatcher".parse::<AgentName>().is_err());
    }

    #[test]
    fn test_every_agent_can_look_up_its_flight() {
        for agent in AgentName::ALL {
            assert!(agent.tools().contains(&ToolCapability::FlightLookup));
        }
    }
}
