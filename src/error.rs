//! Error types for the sticker bot.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

/// Chat transport errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Media file not found: {0}")]
    MediaNotFound(String),

    #[error("Channel {name} request {method} failed: {reason}")]
    RequestFailed {
        name: String,
        method: String,
        reason: String,
    },

    #[error("Invalid response from {name}: {reason}")]
    InvalidResponse { name: String, reason: String },
}

/// Identity directory errors.
///
/// A handle that does not exist is *not* an error; see
/// [`crate::directory::Lookup::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("Directory client is not configured: {0}")]
    NotConfigured(String),

    #[error("Credential request failed: {0}")]
    CredentialFailed(String),

    #[error("Directory request failed: {0}")]
    RequestFailed(String),

    #[error("Directory returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Invalid directory response: {0}")]
    InvalidResponse(String),
}
