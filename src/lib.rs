pub mod config;
pub mod core;
pub mod errors;
pub mod utils;

// Re-export commonly used items for convenience
pub use config::PipelineConfig;
pub use crate::core::*;
pub use errors::{PipelineError, PipelineResult};
