//! Domain models shared by the server handlers and the client.

pub mod hospital;
pub mod patient;
pub mod prediction;
pub mod recommendation;
pub mod stats;

pub use hospital::{Hospital, LoginRequest, ProfileUpdate, RegisterRequest};
pub use patient::{Approval, Gender, Patient, PatientDocument, PatientDraft, PatientInput, PatientPatch};
pub use stats::{TrendPoint, WeekOverWeek, WeeklySnapshot, WeeklyStats};
