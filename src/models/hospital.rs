use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A hospital account. Tenant identity owning a set of patient records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hospital {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub department: String,
    pub physician_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub phone: String,
    #[serde(rename = "type", default)]
    pub facility_type: String,
    #[serde(default)]
    pub beds: String,
    #[serde(default)]
    pub staff: String,
    pub created_at: DateTime<Utc>,
}

/// Emails are stored trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Hospital name is required"))]
    pub name: String,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: String,
    #[validate(length(min = 1, message = "Physician name is required"))]
    pub physician_name: String,
}

impl RegisterRequest {
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            email: normalize_email(&self.email),
            password: self.password,
            department: self.department.trim().to_string(),
            physician_name: self.physician_name.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile edit. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "Hospital name is required"))]
    pub name: Option<String>,
    #[validate(email(message = "Please enter a valid email"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Department is required"))]
    pub department: Option<String>,
    #[validate(length(min = 1, message = "Physician name is required"))]
    pub physician_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub phone: Option<String>,
    #[serde(rename = "type")]
    pub facility_type: Option<String>,
    pub beds: Option<String>,
    pub staff: Option<String>,
}

impl ProfileUpdate {
    /// Normalizes supplied fields so validation sees what will be stored.
    pub fn trimmed(self) -> Self {
        let trim = |value: Option<String>| value.map(|v| v.trim().to_string());
        Self {
            name: trim(self.name),
            email: self.email.as_deref().map(normalize_email),
            department: trim(self.department),
            physician_name: trim(self.physician_name),
            address: trim(self.address),
            city: trim(self.city),
            phone: trim(self.phone),
            facility_type: trim(self.facility_type),
            beds: trim(self.beds),
            staff: trim(self.staff),
        }
    }

    pub fn apply(self, hospital: &mut Hospital) {
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value.trim().to_string();
            }
        }

        set(&mut hospital.name, self.name);
        if let Some(email) = self.email {
            hospital.email = normalize_email(&email);
        }
        set(&mut hospital.department, self.department);
        set(&mut hospital.physician_name, self.physician_name);
        set(&mut hospital.address, self.address);
        set(&mut hospital.city, self.city);
        set(&mut hospital.phone, self.phone);
        set(&mut hospital.facility_type, self.facility_type);
        set(&mut hospital.beds, self.beds);
        set(&mut hospital.staff, self.staff);
    }
}
