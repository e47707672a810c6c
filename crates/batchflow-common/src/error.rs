//! Common error types used throughout batchflow.
//!
//! Every failure a stage can hit maps onto one variant here. All of them are
//! fatal for the current invocation except [`Error::AuditWrite`], which is
//! collected and reported alongside an otherwise successful stage.

/// Common error type for batchflow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A workload parameter is missing, malformed or out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The job-submission collaborator rejected or failed a request.
    #[error("Submission of {target} job failed: {message}")]
    Submission { target: String, message: String },

    /// The stage name does not match any known stage.
    #[error("Unknown stage '{given}', expected one of: {expected}")]
    UnknownStage { given: String, expected: String },

    /// An audit record could not be written.
    #[error("Audit write failed: {0}")]
    AuditWrite(String),

    /// A required runtime value is missing or malformed.
    #[error("Runtime context error: {0}")]
    Context(String),

    /// A unit of render work failed.
    #[error("Render failed: {0}")]
    Render(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),
}

impl Error {
    /// Create a new Validation error.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new Submission error for the given target stage.
    pub fn submission<T: Into<String>, S: Into<String>>(target: T, msg: S) -> Self {
        Self::Submission {
            target: target.into(),
            message: msg.into(),
        }
    }

    /// Create a new AuditWrite error.
    pub fn audit_write<S: Into<String>>(msg: S) -> Self {
        Self::AuditWrite(msg.into())
    }

    /// Create a new Context error.
    pub fn context<S: Into<String>>(msg: S) -> Self {
        Self::Context(msg.into())
    }

    /// Create a new Render error.
    pub fn render<S: Into<String>>(msg: S) -> Self {
        Self::Render(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Whether this error must terminate the stage.
    ///
    /// Audit write failures are best-effort and never abort work that has
    /// already been done.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::AuditWrite(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
