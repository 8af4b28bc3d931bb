pub mod errors;
pub mod http_server;
pub mod request;

pub use errors::{ApiError, ErrorResponse};
pub use http_server::{AppState, router, start_server};
pub use request::InferenceRequest;
