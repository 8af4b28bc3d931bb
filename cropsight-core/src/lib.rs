pub mod analysis;
pub mod api;
pub mod config;
pub mod consts;
pub mod detection;
pub mod error;
pub mod inference;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use api::{AppState, router};
pub use detection::{Classification, Detection};
pub use error::CropsightError;
pub use pipeline::{BatchRunner, BatchSettings, ImageReport, InferenceJob};
