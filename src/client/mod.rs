//! Client-side pieces of ReAdmit: a typed REST client, an explicit state
//! store with pure reducers and token persistence behind an injected
//! storage interface.

pub mod api;
pub mod session;
pub mod store;

pub use api::{ApiClient, ClientError};
pub use session::{FileSessionStorage, MemorySessionStorage, Session, SessionStorage};
pub use store::{Action, AuthState, ClientState, PatientState, Store};
