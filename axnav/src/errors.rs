use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavigationError {
    /// The provider did not answer within the deadline. The call may still be
    /// running on the provider side, so its outcome is unknown.
    #[error("Operation timed out after {after:?}: {operation}")]
    Timeout { operation: String, after: Duration },

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Index {index} is out of range ({len} candidates)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Accessibility access is not authorized: {0}")]
    Unauthorized(String),

    #[error("Accessibility provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Coarse classification used for fallback decisions and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    Provider,
    NotFound,
    InvalidSelector,
    Validation,
    InvalidState,
    Unavailable,
}

impl NavigationError {
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        NavigationError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            NavigationError::Timeout { .. } => ErrorKind::Timeout,
            NavigationError::ProviderError(_) => ErrorKind::Provider,
            NavigationError::NotFound(_) | NavigationError::IndexOutOfRange { .. } => {
                ErrorKind::NotFound
            }
            NavigationError::InvalidSelector(_) => ErrorKind::InvalidSelector,
            NavigationError::Validation(_) => ErrorKind::Validation,
            NavigationError::InvalidState(_) => ErrorKind::InvalidState,
            NavigationError::Unauthorized(_) | NavigationError::ProviderUnavailable(_) => {
                ErrorKind::Unavailable
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// One-line suggestion printed under the error message.
    pub fn hint(&self) -> &'static str {
        match self {
            NavigationError::Timeout { .. } => {
                "the application may be busy; retry, `refresh`, or raise --timeout"
            }
            NavigationError::ProviderError(_) => {
                "the element may have gone away; try `refresh` or `back`"
            }
            NavigationError::NotFound(_) => "use `ls`, `windows` or `tree` to see what is available",
            NavigationError::IndexOutOfRange { .. } => {
                "use `ls` to see valid indices or `tree` to see valid #ids"
            }
            NavigationError::InvalidSelector(_) => {
                "selectors look like `3`, `#12` or `window[Main]/button[OK]`"
            }
            NavigationError::Validation(_) => "check the command-line flags and AXNAV_* variables",
            NavigationError::InvalidState(_) => "use `app` and `window` to set the context first",
            NavigationError::Unauthorized(_) => {
                "grant accessibility access in System Settings > Privacy & Security"
            }
            NavigationError::ProviderUnavailable(_) => "pass --snapshot <file> to load a tree snapshot",
        }
    }
}
