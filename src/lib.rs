/// Error types for the collection agent
pub mod error;

/// Normalized event model
pub mod events;

/// Configuration loading and validation
pub mod config;

/// Shared cancellation signal
pub mod shutdown;

/// Event collectors for logs, files, commands and registries
pub mod collectors;

/// Output sinks for collected events
pub mod sinks;

/// Pipeline orchestration: collectors fan out to sinks
pub mod pipeline;

// Re-export commonly used types
pub use error::{CollectorError, ConfigError, SinkError};
pub use events::LogEvent;
