use crate::cdn::CdnError;
use crate::service::paths::PathError;
use serde::Serialize;
use thiserror::Error;

/// Machine-stable error categories. Transport codes are assigned at the
/// HTTP boundary, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NoClaimsPresent,
    ResourceNotFound,
    Unauthorized,
    BadRequest,
    InternalError,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NoClaimsPresent => "no_claims_present",
            ErrorKind::ResourceNotFound => "resource_not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::InternalError => "internal_error",
        }
    }
}

#[derive(Debug, Error)]
pub enum InvalidationError {
    #[error("no claims present")]
    NoClaimsPresent,

    #[error("distribution {0} not found")]
    ResourceNotFound(String),

    #[error("distribution {0} unauthorized")]
    Unauthorized(String),

    #[error("paths outside distribution {distribution} prefix: {}", .paths.join(", "))]
    PathsOutOfScope {
        distribution: String,
        paths: Vec<String>,
    },

    #[error("no paths supplied")]
    NoPaths,

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath {
        path: String,
        #[source]
        reason: PathError,
    },

    #[error("cdn {operation} failed")]
    Cdn {
        operation: &'static str,
        #[source]
        source: CdnError,
    },
}

impl InvalidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            InvalidationError::NoClaimsPresent => ErrorKind::NoClaimsPresent,
            InvalidationError::ResourceNotFound(_) => ErrorKind::ResourceNotFound,
            InvalidationError::Unauthorized(_) | InvalidationError::PathsOutOfScope { .. } => {
                ErrorKind::Unauthorized
            }
            InvalidationError::NoPaths | InvalidationError::InvalidPath { .. } => {
                ErrorKind::BadRequest
            }
            InvalidationError::Cdn { .. } => ErrorKind::InternalError,
        }
    }

    /// Caller-facing reason. Diagnostics such as the offending path list stay
    /// in the `Display` form, which is only logged.
    pub fn reason(&self) -> String {
        match self {
            InvalidationError::NoClaimsPresent => "No claims present in request".to_string(),
            InvalidationError::ResourceNotFound(name) => format!("Resource not found: {name}"),
            InvalidationError::Unauthorized(name) => {
                format!("User is not entitled to invalidate distribution: {name}")
            }
            InvalidationError::PathsOutOfScope { distribution, .. } => format!(
                "User is not entitled to invalidate the requested paths on distribution: {distribution}"
            ),
            InvalidationError::NoPaths => "Bad request: paths must not be empty".to_string(),
            InvalidationError::InvalidPath { path, reason } => {
                format!("Bad request: invalid path {path:?}: {reason}")
            }
            InvalidationError::Cdn { .. } => "Internal error".to_string(),
        }
    }
}
