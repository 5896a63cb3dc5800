// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Arbitration Policy
//!
//! Weighted-criteria scoring configuration used by the arbitrator. Weights
//! and normalization ceilings are injectable so policy tests can override
//! them without touching arbitration logic. Agent classification is not part
//! of the policy; it is fixed by [`crate::domain::agent::AgentName::class`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::arbitration::ScoreBreakdown;
use crate::domain::recommendation::ImpactEstimate;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("criteria weights must sum to 1.0 (got {0})")]
    WeightSum(f64),
    #[error("criterion weight '{0}' must be within [0, 1]")]
    WeightRange(&'static str),
    #[error("normalization ceiling '{0}' must be positive")]
    Ceiling(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaWeights {
    pub safety: f64,
    pub cost: f64,
    pub passenger: f64,
    pub network: f64,
    pub reputation: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            safety: 0.40,
            cost: 0.25,
            passenger: 0.20,
            network: 0.10,
            reputation: 0.05,
        }
    }
}

impl CriteriaWeights {
    pub fn validate(&self) -> Result<(), PolicyError> {
        let named = [
            ("safety", self.safety),
            ("cost", self.cost),
            ("passenger", self.passenger),
            ("network", self.network),
            ("reputation", self.reputation),
        ];
        for (name, w) in named {
            if !(0.0..=1.0).contains(&w) {
                return Err(PolicyError::WeightRange(name));
            }
        }
        let sum: f64 = named.iter().map(|(_, w)| w).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(PolicyError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Raw impact values at or above a ceiling normalize to a score of 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationScales {
    pub cost_ceiling_usd: f64,
    pub passenger_ceiling: f64,
    pub network_ceiling: f64,
}

impl Default for NormalizationScales {
    fn default() -> Self {
        Self {
            cost_ceiling_usd: 500_000.0,
            passenger_ceiling: 400.0,
            network_ceiling: 12.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArbitrationPolicy {
    #[serde(default)]
    pub weights: CriteriaWeights,
    #[serde(default)]
    pub scales: NormalizationScales,
}

impl ArbitrationPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        self.weights.validate()?;
        let ceilings = [
            ("cost_ceiling_usd", self.scales.cost_ceiling_usd),
            ("passenger_ceiling", self.scales.passenger_ceiling),
            ("network_ceiling", self.scales.network_ceiling),
        ];
        for (name, c) in ceilings {
            if !(c.is_finite() && c > 0.0) {
                return Err(PolicyError::Ceiling(name));
            }
        }
        Ok(())
    }

    /// Normalize each criterion to [0, 1] (higher is better) and weight it.
    pub fn score(&self, impact: &ImpactEstimate) -> ScoreBreakdown {
        let inverse = |value: f64, ceiling: f64| 1.0 - (value / ceiling).clamp(0.0, 1.0);

        let safety = impact.safety_margin.clamp(0.0, 1.0);
        let cost = inverse(impact.cost_usd, self.scales.cost_ceiling_usd);
        let passenger = inverse(impact.passengers_affected as f64, self.scales.passenger_ceiling);
        let network = inverse(
            impact.downstream_flights_affected as f64,
            self.scales.network_ceiling,
        );
        let reputation = 1.0 - impact.reputation_risk.clamp(0.0, 1.0);

        let w = &self.weights;
        let aggregate = safety * w.safety
            + cost * w.cost
            + passenger * w.passenger
            + network * w.network
            + reputation * w.reputation;

        ScoreBreakdown {
            safety,
            cost,
            passenger,
            network,
            reputation,
            aggregate,
            cost_usd: impact.cost_usd,
        }
    }
}
