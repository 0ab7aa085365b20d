//! Client state container.
//!
//! State changes only through [`reduce`], a pure function of the previous
//! state and an [`Action`]. [`Store`] wraps it with session persistence and
//! the request flows used by the command line.

use tracing::{info, warn};

use super::api::{ApiClient, ClientError};
use super::session::{Session, SessionStorage};
use crate::core::data::format_risk;
use crate::models::prediction::PredictionResult;
use crate::models::recommendation::Recommendation;
use crate::models::{Hospital, LoginRequest, Patient, TrendPoint, WeeklyStats};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthState {
    pub token: Option<String>,
    pub hospital: Option<Hospital>,
    pub loading: bool,
    pub error: Option<String>,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn from_session(session: Session) -> Self {
        Self {
            token: Some(session.token),
            hospital: Some(session.hospital_info),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientState {
    pub current_patient: Option<Patient>,
    /// Latest prediction, two decimals.
    pub prediction: Option<String>,
    pub records: Vec<Patient>,
    pub weekly_stats: Option<WeeklyStats>,
    pub trend_data: Vec<TrendPoint>,
    pub recommendations: Vec<Recommendation>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientState {
    pub auth: AuthState,
    pub patient: PatientState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    AuthRequested,
    LoggedIn { token: String, hospital: Hospital },
    Verified(Hospital),
    ProfileUpdated(Hospital),
    AuthFailed(String),
    Logout,

    PatientRequested,
    PatientFailed(String),
    SetCurrentPatient(Option<Patient>),
    PredictionReceived(PredictionResult),
    RecordsLoaded(Vec<Patient>),
    RecordSaved(Patient),
    RecordRemoved(String),
    ApprovalUpdated(Patient),
    StatsLoaded(WeeklyStats),
    RecommendationsLoaded(Vec<Recommendation>),
}

pub fn reduce_auth(state: AuthState, action: &Action) -> AuthState {
    match action {
        Action::AuthRequested => AuthState {
            loading: true,
            error: None,
            ..state
        },
        Action::LoggedIn { token, hospital } => AuthState {
            token: Some(token.clone()),
            hospital: Some(hospital.clone()),
            loading: false,
            error: None,
        },
        Action::Verified(hospital) | Action::ProfileUpdated(hospital) => AuthState {
            hospital: Some(hospital.clone()),
            loading: false,
            error: None,
            ..state
        },
        Action::AuthFailed(message) => AuthState {
            loading: false,
            error: Some(message.clone()),
            ..state
        },
        Action::Logout => AuthState::default(),
        _ => state,
    }
}

fn same_record(a: &Patient, key: &str) -> bool {
    a.id == key || a.patient_id == key
}

pub fn reduce_patient(mut state: PatientState, action: &Action) -> PatientState {
    match action {
        Action::PatientRequested => {
            state.loading = true;
            state.error = None;
        }
        Action::PatientFailed(message) => {
            state.loading = false;
            state.error = Some(message.clone());
        }
        Action::SetCurrentPatient(patient) => {
            state.current_patient = patient.clone();
            if patient.is_none() {
                state.prediction = None;
            }
        }
        Action::PredictionReceived(result) => {
            state.loading = false;
            match result.readmission_risk.trim().parse::<f64>() {
                Ok(risk) => {
                    let formatted = format_risk(risk);
                    if let Some(current) = state.current_patient.as_mut() {
                        current.readmission_risk = formatted.parse().ok();
                    }
                    state.prediction = Some(formatted);
                    state.error = None;
                }
                Err(_) => {
                    state.error = Some(format!("Unreadable risk value {}", result.readmission_risk));
                }
            }
            if let Some(stored) = &result.patient {
                upsert(&mut state.records, stored.clone());
            }
        }
        Action::RecordsLoaded(records) => {
            state.loading = false;
            state.records = records.clone();
            state.error = None;
        }
        Action::RecordSaved(patient) => {
            state.loading = false;
            upsert(&mut state.records, patient.clone());
            state.error = None;
        }
        Action::RecordRemoved(id) => {
            state.loading = false;
            state.records.retain(|p| p.id != *id);
            state.error = None;
        }
        Action::ApprovalUpdated(updated) => {
            state.loading = false;
            if let Some(current) = state
                .current_patient
                .as_mut()
                .filter(|c| same_record(c, &updated.id))
            {
                current.approval = updated.approval.clone();
            }
            if let Some(record) = state.records.iter_mut().find(|p| same_record(p, &updated.id)) {
                record.approval = updated.approval.clone();
                record.updated_at = updated.updated_at;
            }
            let unapproved = state.records.iter().filter(|p| !p.is_approved()).count();
            if let Some(stats) = state.weekly_stats.as_mut() {
                stats.current_week.unapproved_assessments = unapproved;
            }
            state.error = None;
        }
        Action::StatsLoaded(stats) => {
            state.loading = false;
            state.trend_data = stats.trend_data.clone();
            state.weekly_stats = Some(stats.clone());
            state.error = None;
        }
        Action::RecommendationsLoaded(recommendations) => {
            state.loading = false;
            state.recommendations = recommendations.clone();
            state.error = None;
        }
        _ => {}
    }
    state
}

fn upsert(records: &mut Vec<Patient>, patient: Patient) {
    match records.iter_mut().find(|p| p.id == patient.id) {
        Some(existing) => *existing = patient,
        None => records.push(patient),
    }
}

/// Logout resets the auth slice only; patient data stays in place.
pub fn reduce(state: ClientState, action: &Action) -> ClientState {
    ClientState {
        auth: reduce_auth(state.auth, action),
        patient: reduce_patient(state.patient, action),
    }
}

pub struct Store<S: SessionStorage> {
    state: ClientState,
    storage: S,
}

impl<S: SessionStorage> Store<S> {
    /// Starts from the persisted session, if any.
    pub fn new(storage: S) -> Self {
        let auth = match storage.load() {
            Ok(Some(session)) => AuthState::from_session(session),
            Ok(None) => AuthState::default(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable session");
                AuthState::default()
            }
        };

        Self {
            state: ClientState {
                auth,
                patient: PatientState::default(),
            },
            storage,
        }
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn dispatch(&mut self, action: Action) {
        let state = std::mem::take(&mut self.state);
        self.state = reduce(state, &action);
        self.persist(&action);
    }

    fn persist(&self, action: &Action) {
        let result = match action {
            Action::LoggedIn { .. } | Action::Verified(_) | Action::ProfileUpdated(_) => {
                match (&self.state.auth.token, &self.state.auth.hospital) {
                    (Some(token), Some(hospital)) => self.storage.save(&Session {
                        token: token.clone(),
                        hospital_info: hospital.clone(),
                    }),
                    _ => Ok(()),
                }
            }
            Action::Logout => self.storage.clear(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!(error = %e, "session storage failed");
        }
    }

    fn client_for(&self, client: &ApiClient) -> ApiClient {
        let mut client = client.clone();
        client.set_token(self.state.auth.token.clone());
        client
    }

    pub async fn login(&mut self, client: &ApiClient, email: &str, password: &str) -> Result<(), ClientError> {
        self.dispatch(Action::AuthRequested);
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        match client.login(&request).await {
            Ok(reply) => {
                info!(hospital_id = %reply.hospital_info.id, "logged in");
                self.dispatch(Action::LoggedIn {
                    token: reply.token,
                    hospital: reply.hospital_info,
                });
                Ok(())
            }
            Err(e) => {
                self.dispatch(Action::AuthFailed(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.dispatch(Action::Logout);
    }

    /// A failed verification ends the session.
    pub async fn verify(&mut self, client: &ApiClient) -> Result<Hospital, ClientError> {
        if !self.state.auth.is_authenticated() {
            let message = "No token found".to_string();
            self.dispatch(Action::AuthFailed(message.clone()));
            return Err(ClientError::Config(anyhow::anyhow!(message)));
        }

        self.dispatch(Action::AuthRequested);
        match self.client_for(client).verify().await {
            Ok(reply) => {
                self.dispatch(Action::Verified(reply.hospital.clone()));
                Ok(reply.hospital)
            }
            Err(e) => {
                self.dispatch(Action::Logout);
                self.dispatch(Action::AuthFailed("Token invalid or expired".to_string()));
                Err(e)
            }
        }
    }

    pub async fn load_patients(&mut self, client: &ApiClient) -> Result<&[Patient], ClientError> {
        self.dispatch(Action::PatientRequested);
        match self.client_for(client).list_patients().await {
            Ok(records) => {
                self.dispatch(Action::RecordsLoaded(records));
                Ok(&self.state.patient.records)
            }
            Err(e) => {
                self.dispatch(Action::PatientFailed(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn load_stats(&mut self, client: &ApiClient) -> Result<&WeeklyStats, ClientError> {
        self.dispatch(Action::PatientRequested);
        match self.client_for(client).weekly_stats().await {
            Ok(stats) => {
                self.dispatch(Action::StatsLoaded(stats));
                self.state
                    .patient
                    .weekly_stats
                    .as_ref()
                    .ok_or_else(|| ClientError::Config(anyhow::anyhow!("weekly stats missing after load")))
            }
            Err(e) => {
                self.dispatch(Action::PatientFailed(e.to_string()));
                Err(e)
            }
        }
    }
}
