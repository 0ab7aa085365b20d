use serde::{Deserialize, Serialize};

use super::Patient;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest {
    #[serde(default)]
    pub file_urls: Vec<String>,
    /// Record id to store the returned risk on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub success: bool,
    /// Two decimal places, e.g. `"62.50"`.
    pub readmission_risk: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<Patient>,
}
