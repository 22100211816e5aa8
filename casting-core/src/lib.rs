pub mod config;
pub mod error;
pub mod layers;

pub use config::{AppConfig, ConfigError};
pub use error::{error_response, HttpError};
pub use layers::init_tracing;
