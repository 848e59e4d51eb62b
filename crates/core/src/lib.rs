//! docsage core library
//!
//! Foundational pieces shared by every docsage crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging setup
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use logging::LogFormat;
