//! Configuration module for the Quill runtime.
//!
//! Layered loading (defaults, files, environment) with figment, plus the
//! schema and validation for the `logging`, `dispatch` and `plugins` sections.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    DispatchConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, QuillConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
