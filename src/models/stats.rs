use serde::{Deserialize, Serialize};

/// Counts and averages over the patient records of one 7-day window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySnapshot {
    pub total_patients: usize,
    /// Records without a risk value yet.
    pub pending_assessments: usize,
    pub unapproved_assessments: usize,
    #[serde(alias = "avgReadmissionRisk")]
    pub average_readmission_risk: f64,
    /// Records with risk strictly above 30.
    pub high_risk_patients: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Human-readable range such as `Mar 1-7`.
    pub week: String,
    #[serde(flatten)]
    pub stats: WeeklySnapshot,
}

/// Percentage change from last week to this week, per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekOverWeek {
    pub total_patients: f64,
    pub pending_assessments: f64,
    pub unapproved_assessments: f64,
    #[serde(alias = "avgReadmissionRisk")]
    pub average_readmission_risk: f64,
    pub high_risk_patients: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyStats {
    pub current_week: WeeklySnapshot,
    pub last_week: WeeklySnapshot,
    pub changes: WeekOverWeek,
    /// Oldest first.
    pub trend_data: Vec<TrendPoint>,
}
