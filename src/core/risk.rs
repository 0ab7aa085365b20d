use std::fmt;

use serde::{Deserialize, Serialize};

pub const HIGH_RISK_THRESHOLD: f64 = 50.0;
pub const MEDIUM_RISK_THRESHOLD: f64 = 30.0;

/// Discrete readmission risk band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl RiskCategory {
    pub fn from_risk(value: f64) -> Self {
        if value >= HIGH_RISK_THRESHOLD {
            RiskCategory::High
        } else if value >= MEDIUM_RISK_THRESHOLD {
            RiskCategory::Medium
        } else {
            RiskCategory::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
