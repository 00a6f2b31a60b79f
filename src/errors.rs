use std::fmt;

/// Application-specific error types.
#[derive(Debug)]
pub enum AppError {
    /// A required credential or setting is missing or malformed. Fatal at startup.
    ConfigurationError(String),
    /// The places provider could not be reached or answered with a non-2xx status.
    ProviderError(String),
    /// A website page could not be fetched.
    FetchError(String),
    /// The referenced import job does not exist in the job store.
    JobNotFound(String),
    /// The job record exists but one of its documents does not decode.
    InvalidJob {
        job_id: String,
        reason: String,
    },
    /// Job store I/O failed.
    DatabaseError(sqlx::Error),
    /// A run for this job id is already active in this process.
    AlreadyRunning(String),
    /// Anything else that escaped the per-job bookkeeping.
    UnexpectedError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Strips context wrappers and returns the innermost error.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::ConfigurationError(msg) => write!(f, "Configuration error: {}", msg),
            AppError::ProviderError(msg) => write!(f, "Places provider error: {}", msg),
            AppError::FetchError(msg) => write!(f, "Fetch error: {}", msg),
            AppError::JobNotFound(id) => write!(f, "Job not found: {}", id),
            AppError::InvalidJob { job_id, reason } => {
                write!(f, "Invalid job record {}: {}", job_id, reason)
            }
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::AlreadyRunning(id) => write!(f, "Job {} is already being processed", id),
            AppError::UnexpectedError(msg) => write!(f, "Unexpected error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::DatabaseError(e) => Some(e),
            AppError::WithContext { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    ///
    /// Callers fetching website pages map to `FetchError` explicitly; everything else
    /// that goes over reqwest talks to the places provider.
    fn from(err: reqwest::Error) -> Self {
        AppError::ProviderError(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    ///
    /// # Arguments
    ///
    /// * `context` - The context message to add.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

/// Extension for sqlx::Error to add context
impl<T> ResultExt<T> for Result<T, sqlx::Error> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(AppError::DatabaseError(e)),
            context: f(),
        })
    }
}
