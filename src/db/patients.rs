use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, instrument};

use super::{from_millis, is_unique_violation, to_millis, Database};
use crate::error::{ApiError, ApiResult};
use crate::models::{Approval, Patient};

const COLUMNS: &str = "id, hospital_id, patient_code, first_name, last_name, age, gender, \
                       medical_history, current_medications, diagnosis, length_of_stay, \
                       previous_admissions, readmission_risk, file_urls, is_approved, \
                       approved_by, approved_at, date, created_at, updated_at";

#[derive(Debug, FromRow)]
struct PatientRow {
    id: String,
    hospital_id: String,
    patient_code: String,
    first_name: String,
    last_name: String,
    age: i64,
    gender: String,
    medical_history: Option<String>,
    current_medications: Option<String>,
    diagnosis: String,
    length_of_stay: i64,
    previous_admissions: i64,
    readmission_risk: Option<f64>,
    file_urls: String,
    is_approved: bool,
    approved_by: Option<String>,
    approved_at: Option<i64>,
    date: i64,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<PatientRow> for Patient {
    type Error = ApiError;

    fn try_from(row: PatientRow) -> ApiResult<Self> {
        let approval = match (row.is_approved, row.approved_by, row.approved_at) {
            (true, Some(by), Some(at)) => Some(Approval {
                by,
                at: from_millis("patients.approved_at", at)?,
            }),
            _ => None,
        };
        let file_urls = serde_json::from_str(&row.file_urls)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("patients.file_urls: {}", e)))?;

        Ok(Patient {
            gender: row.gender.parse()?,
            date: from_millis("patients.date", row.date)?,
            created_at: from_millis("patients.created_at", row.created_at)?,
            updated_at: from_millis("patients.updated_at", row.updated_at)?,
            id: row.id,
            hospital_id: row.hospital_id,
            patient_id: row.patient_code,
            first_name: row.first_name,
            last_name: row.last_name,
            age: row.age,
            medical_history: row.medical_history,
            current_medications: row.current_medications,
            diagnosis: row.diagnosis,
            length_of_stay: row.length_of_stay,
            previous_admissions: row.previous_admissions,
            readmission_risk: row.readmission_risk,
            file_urls,
            approval,
        })
    }
}

fn rows_to_patients(rows: Vec<PatientRow>) -> ApiResult<Vec<Patient>> {
    rows.into_iter().map(Patient::try_from).collect()
}

fn file_urls_json(patient: &Patient) -> ApiResult<String> {
    serde_json::to_string(&patient.file_urls).map_err(|e| ApiError::Internal(e.into()))
}

impl Database {
    /// Newest record date first.
    #[instrument(skip(self))]
    pub async fn list_patients(&self, hospital_id: &str) -> ApiResult<Vec<Patient>> {
        let rows = sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {} FROM patients WHERE hospital_id = ? ORDER BY date DESC, created_at DESC",
            COLUMNS
        ))
        .bind(hospital_id)
        .fetch_all(self.pool())
        .await?;

        debug!(count = rows.len(), "patients loaded");
        rows_to_patients(rows)
    }

    #[instrument(skip(self))]
    pub async fn get_patient(&self, hospital_id: &str, id: &str) -> ApiResult<Option<Patient>> {
        sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {} FROM patients WHERE hospital_id = ? AND id = ?",
            COLUMNS
        ))
        .bind(hospital_id)
        .bind(id)
        .fetch_optional(self.pool())
        .await?
        .map(Patient::try_from)
        .transpose()
    }

    /// Looks a record up by its id or, failing that, its hospital-assigned
    /// patient code.
    #[instrument(skip(self))]
    pub async fn find_patient_by_key(&self, hospital_id: &str, key: &str) -> ApiResult<Option<Patient>> {
        sqlx::query_as::<_, PatientRow>(&format!(
            "SELECT {} FROM patients
             WHERE hospital_id = ? AND (id = ? OR patient_code = ?)
             ORDER BY id = ? DESC
             LIMIT 1",
            COLUMNS
        ))
        .bind(hospital_id)
        .bind(key)
        .bind(key)
        .bind(key)
        .fetch_optional(self.pool())
        .await?
        .map(Patient::try_from)
        .transpose()
    }

    #[instrument(skip(self, patient), fields(id = %patient.id, code = %patient.patient_id))]
    pub async fn insert_patient(&self, patient: &Patient) -> ApiResult<()> {
        let (is_approved, approved_by, approved_at) = approval_columns(patient);

        sqlx::query(&format!(
            "INSERT INTO patients ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            COLUMNS
        ))
        .bind(&patient.id)
        .bind(&patient.hospital_id)
        .bind(&patient.patient_id)
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.age)
        .bind(patient.gender.as_str())
        .bind(&patient.medical_history)
        .bind(&patient.current_medications)
        .bind(&patient.diagnosis)
        .bind(patient.length_of_stay)
        .bind(patient.previous_admissions)
        .bind(patient.readmission_risk)
        .bind(file_urls_json(patient)?)
        .bind(is_approved)
        .bind(approved_by)
        .bind(approved_at)
        .bind(to_millis(patient.date))
        .bind(to_millis(patient.created_at))
        .bind(to_millis(patient.updated_at))
        .execute(self.pool())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::validation("Patient with this ID already exists")
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    /// Writes the mutable columns of one row, the approval triple included.
    #[instrument(skip(self, patient), fields(id = %patient.id))]
    pub async fn update_patient(&self, patient: &Patient) -> ApiResult<()> {
        let (is_approved, approved_by, approved_at) = approval_columns(patient);

        let result = sqlx::query(
            "UPDATE patients
             SET first_name = ?, last_name = ?, age = ?, gender = ?, medical_history = ?,
                 current_medications = ?, diagnosis = ?, length_of_stay = ?,
                 previous_admissions = ?, readmission_risk = ?, file_urls = ?,
                 is_approved = ?, approved_by = ?, approved_at = ?, date = ?, updated_at = ?
             WHERE hospital_id = ? AND id = ?",
        )
        .bind(&patient.first_name)
        .bind(&patient.last_name)
        .bind(patient.age)
        .bind(patient.gender.as_str())
        .bind(&patient.medical_history)
        .bind(&patient.current_medications)
        .bind(&patient.diagnosis)
        .bind(patient.length_of_stay)
        .bind(patient.previous_admissions)
        .bind(patient.readmission_risk)
        .bind(file_urls_json(patient)?)
        .bind(is_approved)
        .bind(approved_by)
        .bind(approved_at)
        .bind(to_millis(patient.date))
        .bind(to_millis(patient.updated_at))
        .bind(&patient.hospital_id)
        .bind(&patient.id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Patient not found"));
        }
        Ok(())
    }

    /// Stores a model result without touching any other column.
    #[instrument(skip(self))]
    pub async fn set_patient_risk(
        &self,
        hospital_id: &str,
        id: &str,
        risk: f64,
        now: DateTime<Utc>,
    ) -> ApiResult<Patient> {
        let result = sqlx::query(
            "UPDATE patients SET readmission_risk = ?, updated_at = ? WHERE hospital_id = ? AND id = ?",
        )
        .bind(risk)
        .bind(to_millis(now))
        .bind(hospital_id)
        .bind(id)
        .execute(self.pool())
        .await?;

        self.reload_patient(result.rows_affected(), hospital_id, id).await
    }

    /// Writes the approval triple in one statement; `None` clears all three.
    #[instrument(skip(self, approval))]
    pub async fn set_patient_approval(
        &self,
        hospital_id: &str,
        id: &str,
        approval: Option<&Approval>,
        now: DateTime<Utc>,
    ) -> ApiResult<Patient> {
        let (approved_by, approved_at) = match approval {
            Some(a) => (Some(a.by.as_str()), Some(to_millis(a.at))),
            None => (None, None),
        };

        let result = sqlx::query(
            "UPDATE patients
             SET is_approved = ?, approved_by = ?, approved_at = ?, updated_at = ?
             WHERE hospital_id = ? AND id = ?",
        )
        .bind(approval.is_some())
        .bind(approved_by)
        .bind(approved_at)
        .bind(to_millis(now))
        .bind(hospital_id)
        .bind(id)
        .execute(self.pool())
        .await?;

        self.reload_patient(result.rows_affected(), hospital_id, id).await
    }

    async fn reload_patient(&self, affected: u64, hospital_id: &str, id: &str) -> ApiResult<Patient> {
        if affected == 0 {
            return Err(ApiError::not_found("Patient not found"));
        }
        self.get_patient(hospital_id, id)
            .await?
            .ok_or_else(|| ApiError::not_found("Patient not found"))
    }

    /// False when no such record exists for the hospital.
    #[instrument(skip(self))]
    pub async fn delete_patient(&self, hospital_id: &str, id: &str) -> ApiResult<bool> {
        let result = sqlx::query("DELETE FROM patients WHERE hospital_id = ? AND id = ?")
            .bind(hospital_id)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn approval_columns(patient: &Patient) -> (bool, Option<String>, Option<i64>) {
    match &patient.approval {
        Some(approval) => (true, Some(approval.by.clone()), Some(to_millis(approval.at))),
        None => (false, None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Gender, Hospital};
    use chrono::{Duration, TimeZone};

    async fn seeded() -> Database {
        let db = Database::in_memory().await.unwrap();
        for id in ["h-1", "h-2"] {
            db.insert_hospital(&Hospital {
                id: id.into(),
                name: format!("Hospital {}", id),
                email: format!("{}@example.org", id),
                password_hash: "hash".into(),
                department: "ER".into(),
                physician_name: "Dr. Who".into(),
                address: String::new(),
                city: String::new(),
                phone: String::new(),
                facility_type: String::new(),
                beds: String::new(),
                staff: String::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        }
        db
    }

    fn patient(id: &str, hospital_id: &str, code: &str, days_ago: i64) -> Patient {
        let at = Utc.with_ymd_and_hms(2024, 3, 13, 12, 0, 0).unwrap() - Duration::days(days_ago);
        Patient {
            id: id.into(),
            hospital_id: hospital_id.into(),
            patient_id: code.into(),
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            age: 67,
            gender: Gender::Female,
            medical_history: Some("Hypertension".into()),
            current_medications: None,
            diagnosis: "CHF".into(),
            length_of_stay: 10,
            previous_admissions: 1,
            readmission_risk: None,
            file_urls: vec!["https://files.example/a.pdf".into()],
            approval: None,
            date: at,
            created_at: at,
            updated_at: at,
        }
    }

    #[actix_web::test]
    async fn list_is_scoped_and_newest_first() {
        let db = seeded().await;
        db.insert_patient(&patient("p-1", "h-1", "PT-1", 3)).await.unwrap();
        db.insert_patient(&patient("p-2", "h-1", "PT-2", 1)).await.unwrap();
        db.insert_patient(&patient("p-3", "h-2", "PT-1", 0)).await.unwrap();

        let ids: Vec<_> = db
            .list_patients("h-1")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["p-2", "p-1"]);
        assert!(db.get_patient("h-2", "p-1").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn patient_code_is_unique_per_hospital() {
        let db = seeded().await;
        db.insert_patient(&patient("p-1", "h-1", "PT-1", 0)).await.unwrap();

        let err = db.insert_patient(&patient("p-2", "h-1", "PT-1", 0)).await.unwrap_err();
        assert!(matches!(err, ApiError::Validation(m) if m == "Patient with this ID already exists"));
    }

    #[actix_web::test]
    async fn unknown_hospital_is_rejected_by_the_foreign_key() {
        let db = seeded().await;
        let err = db.insert_patient(&patient("p-1", "nope", "PT-1", 0)).await.unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[actix_web::test]
    async fn approval_and_risk_survive_an_update() {
        let db = seeded().await;
        let mut stored = patient("p-1", "h-1", "PT-1", 0);
        db.insert_patient(&stored).await.unwrap();

        stored.readmission_risk = Some(62.5);
        stored.approval = Some(Approval { by: "h-1".into(), at: stored.date });
        db.update_patient(&stored).await.unwrap();

        let reloaded = db.find_patient_by_key("h-1", "PT-1").await.unwrap().unwrap();
        assert_eq!(reloaded, stored);
    }

    #[actix_web::test]
    async fn second_delete_finds_nothing() {
        let db = seeded().await;
        db.insert_patient(&patient("p-1", "h-1", "PT-1", 0)).await.unwrap();

        assert!(!db.delete_patient("h-2", "p-1").await.unwrap());
        assert!(db.delete_patient("h-1", "p-1").await.unwrap());
        assert!(!db.delete_patient("h-1", "p-1").await.unwrap());
    }

    #[actix_web::test]
    async fn focused_writes_leave_other_columns_alone() {
        let db = seeded().await;
        let stale = patient("p-1", "h-1", "PT-1", 0);
        db.insert_patient(&stale).await.unwrap();

        let approval = Approval { by: "h-1".into(), at: stale.date + Duration::hours(1) };
        let approved = db
            .set_patient_approval("h-1", "p-1", Some(&approval), approval.at)
            .await
            .unwrap();
        assert_eq!(approved.approval.as_ref(), Some(&approval));

        // A risk computed from the pre-approval copy must not revert the sign-off.
        let later = approval.at + Duration::minutes(5);
        let scored = db.set_patient_risk("h-1", "p-1", 41.25, later).await.unwrap();
        assert_eq!(scored.readmission_risk, Some(41.25));
        assert_eq!(scored.approval, Some(approval));
        assert_eq!(scored.updated_at, later);
        assert_eq!(scored.first_name, stale.first_name);

        let revoked = db.set_patient_approval("h-1", "p-1", None, later).await.unwrap();
        assert!(revoked.approval.is_none());
        assert_eq!(revoked.readmission_risk, Some(41.25));
    }

    #[actix_web::test]
    async fn focused_writes_are_scoped_to_the_hospital() {
        let db = seeded().await;
        db.insert_patient(&patient("p-1", "h-1", "PT-1", 0)).await.unwrap();

        let err = db.set_patient_risk("h-2", "p-1", 10.0, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        let err = db.set_patient_approval("h-2", "p-1", None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(db.get_patient("h-1", "p-1").await.unwrap().unwrap().readmission_risk, None);
    }
}
