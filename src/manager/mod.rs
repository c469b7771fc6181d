mod manager;
mod types;
mod worker;

pub use manager::SessionManager;
pub use types::{BusyPolicy, InferError, InitError, InitReport, SessionState};
pub use worker::ModelSource;
