//! Error types for the resource system.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::kind::ResourceKind;

/// Errors that can occur during resource operations.
///
/// Absence of a resource is normally reported through the return value
/// (an invalid [`Resource`](crate::Resource) or an empty listing). The
/// variants here are for the cases where the caller asked for something
/// that had to exist, or where the environment itself failed.
///
/// The enum is `Clone` so a single runner outcome can be handed to every
/// caller awaiting it.
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// The requested resource was not found by the provider.
    NotFound {
        /// The path of the resource.
        path: String,
    },

    /// Reading from the backing storage failed.
    Io {
        /// The path that failed to load.
        path: PathBuf,
        /// The underlying IO error.
        source: Arc<std::io::Error>,
    },

    /// Raw data was found but could not be turned into a payload.
    Decode {
        /// The path being decoded.
        path: String,
        /// Description of the error.
        message: String,
    },

    /// A backend reported a fault (service unavailable, malformed response).
    Backend {
        /// Name of the backend.
        provider: String,
        /// Description of the error.
        message: String,
    },

    /// The provider cannot handle this payload kind.
    UnsupportedKind {
        /// The requested kind.
        kind: ResourceKind,
    },

    /// A payload was accessed under a kind it was not loaded as.
    TypeMismatch {
        /// The path of the resource.
        path: String,
        /// The requested kind.
        expected: ResourceKind,
        /// The kind the payload actually has.
        actual: ResourceKind,
    },

    /// The operation was canceled before it completed.
    Canceled {
        /// The path of the canceled operation.
        path: String,
    },

    /// A loader configuration referenced a provider that is not registered.
    UnknownProvider {
        /// The provider name.
        name: String,
    },
}

impl ResourceError {
    /// Build an [`ResourceError::Io`] from a path and an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ResourceError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Build a [`ResourceError::Backend`].
    pub fn backend(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ResourceError::Backend {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error is a cancellation rather than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, ResourceError::Canceled { .. })
    }

    /// Returns `true` if this error reports a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound { .. })
    }
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { path } => {
                write!(f, "Resource not found: {}", path)
            }
            ResourceError::Io { path, source } => {
                write!(f, "IO error loading '{}': {}", path.display(), source)
            }
            ResourceError::Decode { path, message } => {
                write!(f, "Failed to decode '{}': {}", path, message)
            }
            ResourceError::Backend { provider, message } => {
                write!(f, "Backend '{}' failed: {}", provider, message)
            }
            ResourceError::UnsupportedKind { kind } => {
                write!(f, "Unsupported resource kind: {}", kind)
            }
            ResourceError::TypeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Type mismatch for '{}': expected {}, found {}",
                    path, expected, actual
                )
            }
            ResourceError::Canceled { path } => {
                write!(f, "Operation on '{}' was canceled", path)
            }
            ResourceError::UnknownProvider { name } => {
                write!(f, "No provider registered under the name '{}'", name)
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Io { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        ResourceError::io(PathBuf::new(), err)
    }
}

/// Result type alias for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;
