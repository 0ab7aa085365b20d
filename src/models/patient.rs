use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::data::{coerce_count, coerce_risk, non_blank};
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            _ => Err(ApiError::validation("Gender must be male, female or other")),
        }
    }
}

/// Clinical sign-off on a risk assessment. Approver and time only exist
/// together with the flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approval {
    pub by: String,
    pub at: DateTime<Utc>,
}

/// One admission/assessment entry tracked for readmission risk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PatientDocument", into = "PatientDocument")]
pub struct Patient {
    pub id: String,
    pub hospital_id: String,
    /// Hospital-assigned identifier, e.g. `PT-1001`.
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub gender: Gender,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub diagnosis: String,
    pub length_of_stay: i64,
    pub previous_admissions: i64,
    pub readmission_risk: Option<f64>,
    pub file_urls: Vec<String>,
    pub approval: Option<Approval>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Patient {
    pub fn is_approved(&self) -> bool {
        self.approval.is_some()
    }

    pub fn set_approval(&mut self, approved: bool, by: &str, at: DateTime<Utc>) {
        self.approval = approved.then(|| Approval {
            by: by.to_string(),
            at,
        });
    }
}

/// Wire shape of a patient record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDocument {
    pub id: String,
    pub hospital_id: String,
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub gender: Gender,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub diagnosis: String,
    pub length_of_stay: i64,
    pub previous_admissions: i64,
    pub readmission_risk: Option<f64>,
    #[serde(default)]
    pub file_urls: Vec<String>,
    pub is_approved: bool,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Patient> for PatientDocument {
    fn from(p: Patient) -> Self {
        let (is_approved, approved_by, approved_at) = match p.approval {
            Some(Approval { by, at }) => (true, Some(by), Some(at)),
            None => (false, None, None),
        };

        Self {
            id: p.id,
            hospital_id: p.hospital_id,
            patient_id: p.patient_id,
            first_name: p.first_name,
            last_name: p.last_name,
            age: p.age,
            gender: p.gender,
            medical_history: p.medical_history,
            current_medications: p.current_medications,
            diagnosis: p.diagnosis,
            length_of_stay: p.length_of_stay,
            previous_admissions: p.previous_admissions,
            readmission_risk: p.readmission_risk,
            file_urls: p.file_urls,
            is_approved,
            approved_by,
            approved_at,
            date: p.date,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl TryFrom<PatientDocument> for Patient {
    type Error = String;

    fn try_from(d: PatientDocument) -> Result<Self, Self::Error> {
        let approval = match (d.is_approved, d.approved_by, d.approved_at) {
            (true, Some(by), Some(at)) => Some(Approval { by, at }),
            (false, None, None) => None,
            _ => {
                return Err(format!(
                    "patient {} has inconsistent approval fields",
                    d.id
                ))
            }
        };

        Ok(Self {
            id: d.id,
            hospital_id: d.hospital_id,
            patient_id: d.patient_id,
            first_name: d.first_name,
            last_name: d.last_name,
            age: d.age,
            gender: d.gender,
            medical_history: d.medical_history,
            current_medications: d.current_medications,
            diagnosis: d.diagnosis,
            length_of_stay: d.length_of_stay,
            previous_admissions: d.previous_admissions,
            readmission_risk: d.readmission_risk,
            file_urls: d.file_urls,
            approval,
            date: d.date,
            created_at: d.created_at,
            updated_at: d.updated_at,
        })
    }
}

// Keeps an explicit `null` distinguishable from an absent field.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Intake form body, used for both create and partial update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInput {
    pub patient_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<Value>,
    pub gender: Option<String>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    #[serde(alias = "diagnosis")]
    pub primary_diagnosis: Option<String>,
    pub length_of_stay: Option<Value>,
    pub previous_admissions: Option<Value>,
    pub file_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub readmission_risk: Option<Value>,
    pub date: Option<DateTime<Utc>>,
    pub is_approved: Option<bool>,
}

/// Validated fields of a new record.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientDraft {
    pub patient_id: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i64,
    pub gender: Gender,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub diagnosis: String,
    pub length_of_stay: i64,
    pub previous_admissions: i64,
    pub readmission_risk: Option<f64>,
    pub file_urls: Vec<String>,
    pub date: Option<DateTime<Utc>>,
    pub approved: bool,
}

impl PatientDraft {
    pub fn into_patient(self, id: String, hospital_id: &str, now: DateTime<Utc>) -> Patient {
        let mut patient = Patient {
            id,
            hospital_id: hospital_id.to_string(),
            patient_id: self.patient_id,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            gender: self.gender,
            medical_history: self.medical_history,
            current_medications: self.current_medications,
            diagnosis: self.diagnosis,
            length_of_stay: self.length_of_stay,
            previous_admissions: self.previous_admissions,
            readmission_risk: self.readmission_risk,
            file_urls: self.file_urls,
            approval: None,
            date: self.date.unwrap_or(now),
            created_at: now,
            updated_at: now,
        };
        patient.set_approval(self.approved, hospital_id, now);
        patient
    }
}

/// Validated partial update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
    pub medical_history: Option<String>,
    pub current_medications: Option<String>,
    pub diagnosis: Option<String>,
    pub length_of_stay: Option<i64>,
    pub previous_admissions: Option<i64>,
    /// `Some(None)` clears the risk.
    pub readmission_risk: Option<Option<f64>>,
    pub file_urls: Option<Vec<String>>,
    pub approved: Option<bool>,
}

impl PatientPatch {
    pub fn apply(self, patient: &mut Patient, approver: &str, now: DateTime<Utc>) {
        if let Some(v) = self.first_name {
            patient.first_name = v;
        }
        if let Some(v) = self.last_name {
            patient.last_name = v;
        }
        if let Some(v) = self.age {
            patient.age = v;
        }
        if let Some(v) = self.gender {
            patient.gender = v;
        }
        if let Some(v) = self.medical_history {
            patient.medical_history = Some(v);
        }
        if let Some(v) = self.current_medications {
            patient.current_medications = Some(v);
        }
        if let Some(v) = self.diagnosis {
            patient.diagnosis = v;
        }
        if let Some(v) = self.length_of_stay {
            patient.length_of_stay = v;
        }
        if let Some(v) = self.previous_admissions {
            patient.previous_admissions = v;
        }
        if let Some(v) = self.readmission_risk {
            patient.readmission_risk = v;
        }
        if let Some(v) = self.file_urls {
            patient.file_urls = v;
        }
        if let Some(approved) = self.approved {
            patient.set_approval(approved, approver, now);
        }
        patient.updated_at = now;
    }
}

fn optional_count(field: &str, value: Option<Value>) -> ApiResult<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => coerce_count(field, &v).map(Some),
    }
}

fn required_text(field: &str, value: Option<String>) -> ApiResult<Option<String>> {
    match value {
        None => Ok(None),
        Some(v) => non_blank(Some(v))
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("{} cannot be empty", field))),
    }
}

impl PatientInput {
    /// Validates a create request. Every missing required field is reported.
    pub fn into_draft(self) -> ApiResult<PatientDraft> {
        let patient_id = non_blank(self.patient_id);
        let first_name = non_blank(self.first_name);
        let last_name = non_blank(self.last_name);
        let gender = non_blank(self.gender);
        let diagnosis = non_blank(self.primary_diagnosis);
        let age = self.age.filter(|v| !v.is_null());
        let length_of_stay = self.length_of_stay.filter(|v| !v.is_null());

        let mut missing = Vec::new();
        if patient_id.is_none() {
            missing.push("Please add a patient ID");
        }
        if first_name.is_none() {
            missing.push("Please add a first name");
        }
        if last_name.is_none() {
            missing.push("Please add a last name");
        }
        if age.is_none() {
            missing.push("Please add age");
        }
        if gender.is_none() {
            missing.push("Please add gender");
        }
        if diagnosis.is_none() {
            missing.push("Please add a primary diagnosis");
        }
        if length_of_stay.is_none() {
            missing.push("Please add length of stay");
        }
        let (
            Some(patient_id),
            Some(first_name),
            Some(last_name),
            Some(age),
            Some(gender),
            Some(diagnosis),
            Some(length_of_stay),
        ) = (patient_id, first_name, last_name, age, gender, diagnosis, length_of_stay)
        else {
            return Err(ApiError::validation(missing.join(", ")));
        };

        let readmission_risk = match self.readmission_risk {
            None | Some(Value::Null) => None,
            Some(v) => Some(coerce_risk(&v)?),
        };

        Ok(PatientDraft {
            patient_id,
            first_name,
            last_name,
            age: coerce_count("age", &age)?,
            gender: gender.parse()?,
            medical_history: non_blank(self.medical_history),
            current_medications: non_blank(self.current_medications),
            diagnosis,
            length_of_stay: coerce_count("lengthOfStay", &length_of_stay)?,
            previous_admissions: optional_count("previousAdmissions", self.previous_admissions)?
                .unwrap_or(0),
            readmission_risk,
            file_urls: self.file_urls.unwrap_or_default(),
            date: self.date,
            approved: self.is_approved.unwrap_or(false),
        })
    }

    /// Validates an update request. Only present fields end up in the patch.
    pub fn into_patch(self) -> ApiResult<PatientPatch> {
        let readmission_risk = match self.readmission_risk {
            None => None,
            Some(Value::Null) => Some(None),
            Some(v) => Some(Some(coerce_risk(&v)?)),
        };

        Ok(PatientPatch {
            first_name: required_text("firstName", self.first_name)?,
            last_name: required_text("lastName", self.last_name)?,
            age: optional_count("age", self.age)?,
            gender: self.gender.map(|g| g.parse()).transpose()?,
            medical_history: self.medical_history.map(|s| s.trim().to_string()),
            current_medications: self.current_medications.map(|s| s.trim().to_string()),
            diagnosis: required_text("primaryDiagnosis", self.primary_diagnosis)?,
            length_of_stay: optional_count("lengthOfStay", self.length_of_stay)?,
            previous_admissions: optional_count("previousAdmissions", self.previous_admissions)?,
            readmission_risk,
            file_urls: self.file_urls,
            approved: self.is_approved,
        })
    }
}
