use axum::http::StatusCode;
use thiserror::Error;

/// Authentication failures raised before a request reaches a handler.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ClaimError {
    #[error("No {0} found")]
    MissingToken(String),

    #[error("Token is empty")]
    EmptyToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Not entitled to this service")]
    NotEntitled,
}

impl ClaimError {
    /// Missing credentials are 401, anything present but unusable is 403.
    pub fn to_err_code(&self) -> StatusCode {
        match self {
            ClaimError::MissingToken(_) | ClaimError::EmptyToken => StatusCode::UNAUTHORIZED,
            ClaimError::MalformedToken(_) | ClaimError::NotEntitled => StatusCode::FORBIDDEN,
        }
    }

    /// Reason returned to the caller; never includes token material.
    pub fn public_reason(&self) -> &'static str {
        match self {
            ClaimError::MissingToken(_) | ClaimError::EmptyToken => "unauthorized",
            ClaimError::MalformedToken(_) => "invalid token",
            ClaimError::NotEntitled => "forbidden",
        }
    }
}
