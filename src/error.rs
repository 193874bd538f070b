//! Error types for the GPU collector.
//!
//! Two layers live here:
//!
//! - [`Status`]: the status code a device-access call returns when it does not
//!   succeed. Its `Display` form is the human-readable driver error string.
//! - [`CollectorError`]: the error a poll, a config load or a registry lookup
//!   surfaces to the host.

use thiserror::Error;

/// Non-success status of a single device-access call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Status {
    /// The library has not been initialized.
    #[error("Uninitialized")]
    Uninitialized,

    /// A supplied argument is invalid.
    #[error("Invalid Argument")]
    InvalidArgument,

    /// The device or driver does not implement the requested query.
    #[error("Not Supported")]
    NotSupported,

    /// The caller lacks permission for the operation.
    #[error("Insufficient Permissions")]
    NoPermission,

    /// The requested object was not found.
    #[error("Not Found")]
    NotFound,

    /// The kernel driver is not loaded.
    #[error("Driver Not Loaded")]
    DriverNotLoaded,

    /// The shared library could not be found or loaded.
    #[error("NVML Shared Library Not Found")]
    LibraryNotFound,

    /// The device fell off the bus or is otherwise inaccessible.
    #[error("GPU is lost")]
    GpuLost,

    /// The device did not respond in time.
    #[error("Timeout")]
    Timeout,

    /// An internal driver error.
    #[error("Unknown Error")]
    Unknown,

    /// Any other failure, carrying the library's own description.
    #[error("{0}")]
    Other(String),
}

impl Status {
    /// Returns true if the status signals a missing capability rather than a failure.
    #[must_use]
    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }
}

/// Error type for collector operations.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The device-access library could not be initialized.
    #[error("unable to initialize NVML: {0}")]
    Init(Status),

    /// Device count or handle resolution failed.
    #[error("unable to enumerate devices: {message}")]
    Enumeration {
        /// What failed, including the driver status.
        message: String,
    },

    /// A metric query failed for a reason other than a missing capability.
    #[error("unable to get {what}: {status}")]
    Query {
        /// The query that failed, e.g. `GPU 0 UUID`.
        what: String,
        /// Driver status returned by the query.
        status: Status,
    },

    /// The device or driver does not implement a query.
    #[error("{what} is not supported")]
    UnsupportedCapability {
        /// The query that is unsupported.
        what: String,
    },

    /// Tearing down the device-access session failed.
    #[error("unable to shutdown NVML: {0}")]
    Release(Status),

    /// An observation did not carry exactly the labels its family declares.
    #[error("metric '{metric}' expects {expected} label values, got {actual}")]
    LabelCardinality {
        /// Fully qualified metric name.
        metric: String,
        /// Number of declared labels.
        expected: usize,
        /// Number of label values supplied.
        actual: usize,
    },

    /// Configuration parsing error with line number.
    #[error("configuration error at line {line}: {message}")]
    ConfigParse {
        /// Line number where the error occurred (1-indexed, 0 if unknown).
        line: usize,
        /// Error message describing the issue.
        message: String,
    },

    /// Configuration file not found.
    #[error("configuration file not found: {0}")]
    ConfigNotFound(String),

    /// No collector is registered under the requested name.
    #[error("collector '{0}' is not registered")]
    UnknownCollector(String),

    /// Building or encoding exposition output failed.
    #[error("exposition error: {0}")]
    Exposition(String),
}

impl CollectorError {
    /// Classifies a failed query: a missing capability becomes
    /// [`CollectorError::UnsupportedCapability`], anything else a hard
    /// [`CollectorError::Query`].
    pub fn from_query(what: impl Into<String>, status: Status) -> Self {
        let what = what.into();
        if status.is_not_supported() {
            Self::UnsupportedCapability { what }
        } else {
            Self::Query { what, status }
        }
    }

    /// Returns true for the soft-skip signal.
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedCapability { .. })
    }
}

impl From<prometheus::Error> for CollectorError {
    fn from(err: prometheus::Error) -> Self {
        Self::Exposition(err.to_string())
    }
}

/// Result type alias for collector operations.
pub type Result<T> = std::result::Result<T, CollectorError>;
