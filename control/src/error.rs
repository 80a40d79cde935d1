use crate::device::DeviceStatus;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Broad class of an [`Error`], used by callers to pick a response code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed breakpoints or settings. Never silently corrected.
    Configuration,
    /// A collaborator read or write failed.
    Storage,
    /// The request contradicts the current device state.
    BusinessRule,
    /// Outbound notice delivery failed.
    Transport,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid term {label}: breakpoints ({a}, {b}, {c}) are not ordered")]
    InvalidTerm { label: String, a: f64, b: f64, c: f64 },

    #[error("Invalid range for {name}: [{min}, {max}]")]
    InvalidRange { name: String, min: f64, max: f64 },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Device is already {0}")]
    AlreadyInState(DeviceStatus),

    #[error("State is not active")]
    NotActive,

    #[error("Notice error: {0}")]
    Notice(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidTerm { .. }
            | Error::InvalidRange { .. }
            | Error::InvalidParameters(_) => ErrorKind::Configuration,
            Error::Storage(_) => ErrorKind::Storage,
            Error::AlreadyInState(_) | Error::NotActive => ErrorKind::BusinessRule,
            Error::Notice(_) => ErrorKind::Transport,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Storage(format!("{err:#}"))
    }
}
