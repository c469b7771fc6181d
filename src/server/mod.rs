mod routes;
mod server;
mod types;

pub use routes::AppState;
pub use server::ApiServer;
pub use types::{ApiError, ApiResponse, InferRequest, StatusResponse};
