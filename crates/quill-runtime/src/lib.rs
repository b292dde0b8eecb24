//! Quill Runtime: configuration, logging and the serve loop.
//!
//! This crate provides:
//! - Layered configuration with figment ([`config`])
//! - Tracing subscriber setup ([`logging`])
//! - Plugin bootstrap and concurrent dispatch ([`QuillRuntime`])
//! - The built-in `help` script ([`help`])
//!
//! ```ignore
//! use quill_runtime::QuillRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = QuillRuntime::new();
//!     runtime.register_configured::<CommandPlugin>().await?;
//!
//!     let (tx, rx) = runtime.inbound_channel();
//!     let (sink, replies) = ChannelSink::new();
//!     // feed `tx` from a transport, drain `replies` into it
//!     runtime.serve(rx, Arc::new(sink)).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod help;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, QuillConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{QuillRuntime, RuntimeBuilder};

// Re-export tracing for use by plugins
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for plugin authors.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
