use sqlx::FromRow;
use tracing::instrument;

use super::{from_millis, is_unique_violation, to_millis, Database};
use crate::error::{ApiError, ApiResult};
use crate::models::Hospital;

const COLUMNS: &str = "id, name, email, password_hash, department, physician_name, \
                       address, city, phone, facility_type, beds, staff, created_at";

#[derive(Debug, FromRow)]
struct HospitalRow {
    id: String,
    name: String,
    email: String,
    password_hash: String,
    department: String,
    physician_name: String,
    address: String,
    city: String,
    phone: String,
    facility_type: String,
    beds: String,
    staff: String,
    created_at: i64,
}

impl TryFrom<HospitalRow> for Hospital {
    type Error = ApiError;

    fn try_from(row: HospitalRow) -> ApiResult<Self> {
        Ok(Hospital {
            created_at: from_millis("hospitals.created_at", row.created_at)?,
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            department: row.department,
            physician_name: row.physician_name,
            address: row.address,
            city: row.city,
            phone: row.phone,
            facility_type: row.facility_type,
            beds: row.beds,
            staff: row.staff,
        })
    }
}

fn duplicate_email(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err) {
        ApiError::validation("Hospital with this email already exists")
    } else {
        err.into()
    }
}

impl Database {
    #[instrument(skip(self, hospital), fields(email = %hospital.email))]
    pub async fn insert_hospital(&self, hospital: &Hospital) -> ApiResult<()> {
        sqlx::query(
            "INSERT INTO hospitals (id, name, email, password_hash, department, physician_name,
                                    address, city, phone, facility_type, beds, staff, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&hospital.id)
        .bind(&hospital.name)
        .bind(&hospital.email)
        .bind(&hospital.password_hash)
        .bind(&hospital.department)
        .bind(&hospital.physician_name)
        .bind(&hospital.address)
        .bind(&hospital.city)
        .bind(&hospital.phone)
        .bind(&hospital.facility_type)
        .bind(&hospital.beds)
        .bind(&hospital.staff)
        .bind(to_millis(hospital.created_at))
        .execute(self.pool())
        .await
        .map_err(duplicate_email)?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_hospital_by_email(&self, email: &str) -> ApiResult<Option<Hospital>> {
        sqlx::query_as::<_, HospitalRow>(&format!("SELECT {} FROM hospitals WHERE email = ?", COLUMNS))
            .bind(email)
            .fetch_optional(self.pool())
            .await?
            .map(Hospital::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    pub async fn find_hospital(&self, id: &str) -> ApiResult<Option<Hospital>> {
        sqlx::query_as::<_, HospitalRow>(&format!("SELECT {} FROM hospitals WHERE id = ?", COLUMNS))
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .map(Hospital::try_from)
            .transpose()
    }

    /// Writes every profile column. The password hash is left alone.
    #[instrument(skip(self, hospital), fields(id = %hospital.id))]
    pub async fn update_hospital(&self, hospital: &Hospital) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE hospitals
             SET name = ?, email = ?, department = ?, physician_name = ?, address = ?,
                 city = ?, phone = ?, facility_type = ?, beds = ?, staff = ?
             WHERE id = ?",
        )
        .bind(&hospital.name)
        .bind(&hospital.email)
        .bind(&hospital.department)
        .bind(&hospital.physician_name)
        .bind(&hospital.address)
        .bind(&hospital.city)
        .bind(&hospital.phone)
        .bind(&hospital.facility_type)
        .bind(&hospital.beds)
        .bind(&hospital.staff)
        .bind(&hospital.id)
        .execute(self.pool())
        .await
        .map_err(duplicate_email)?;

        if result.rows_affected() == 0 {
            return Err(ApiError::not_found("Hospital not found"));
        }
        Ok(())
    }
}
