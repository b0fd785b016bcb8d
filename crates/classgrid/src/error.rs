//! Error types for the schedule builder.

use serde::Serialize;
use thiserror::Error;

/// A meeting whose interval cannot be placed on a weekly grid.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    /// Day index outside 0 (Sunday) ..= 6 (Saturday)
    #[error("day {day} is not a day of the week")]
    DayOutOfRange { day: u8 },

    /// Start is not strictly before end (zero-length or inverted)
    #[error("meeting starts at minute {start} but ends at minute {end}")]
    EmptyInterval { start: i32, end: i32 },

    /// Interval extends outside of a single day
    #[error("meeting {start}..{end} falls outside 0..=1440")]
    OutsideDay { start: i32, end: i32 },
}

/// Errors from the catalog collaborators (search and sections-by-course).
#[derive(Debug, Error, Clone)]
pub enum LookupError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// Catalog answered with a non-success status
    #[error("Catalog returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Could not decode catalog response: {message}")]
    Decode { message: String },

    /// URL construction failed
    #[error("URL error: {message}")]
    UrlError { message: String },
}

impl LookupError {
    /// Returns true if re-issuing the same lookup might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LookupError::Network { .. } => true,
            LookupError::Status { status, .. } => *status >= 500 || *status == 429,
            LookupError::Decode { .. } | LookupError::UrlError { .. } => false,
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            LookupError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            LookupError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<url::ParseError> for LookupError {
    fn from(err: url::ParseError) -> Self {
        LookupError::UrlError {
            message: err.to_string(),
        }
    }
}

/// Rejections raised by the selection workflow.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// The pending section is already part of the schedule
    #[error("Section {section_id} is already in your schedule")]
    DuplicateSection { section_id: String },

    /// `commit` was called with no section picked
    #[error("No section has been chosen")]
    NoSectionChosen,

    /// The requested section is not among the loaded sections
    #[error("Section {section_id} is not offered for the chosen course")]
    UnknownSection { section_id: String },
}

/// Errors from schedule persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors while importing catalog data from Banner.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// The search page carried no synchronizer token
    #[error("No synchronizer token found on the class search page")]
    MissingToken,

    /// Banner answered with a non-success status
    #[error("Banner returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Banner answered with a body that is not the expected JSON
    #[error("Could not decode Banner response: {message}")]
    Decode { message: String },

    /// Retries were exhausted
    #[error("Gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ImportError {
    /// Returns true if this error is potentially transient and retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ImportError::Network { .. } => true,
            ImportError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ImportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ImportError::Decode {
                message: err.to_string(),
            }
        } else if let Some(status) = err.status() {
            ImportError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ImportError::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Errors while loading the application config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// An environment override could not be parsed
    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: String, value: String },

    #[error("Invalid config: {message}")]
    Invalid { message: String },
}

/// Errors from schedule generation.
#[derive(Debug, Error, Clone)]
pub enum GenerateError {
    #[error("Too many courses selected ({count}, at most {max})")]
    TooManyCourses { count: usize, max: usize },

    #[error("Could not load sections for {course_id}: {source}")]
    Lookup {
        course_id: String,
        #[source]
        source: LookupError,
    },
}
