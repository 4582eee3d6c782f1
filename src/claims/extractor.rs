use crate::claims::error::ClaimError;
use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};

/// Where the bearer token is read from. Chosen at deployment time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenSource {
    /// `Authorization: Bearer <token>`, or the named cookie when the header is absent.
    Bearer { cookie: String },
    /// A custom header carrying the raw token.
    Header(String),
    /// Only the named cookie.
    Cookie(String),
}

impl TokenSource {
    pub fn extract(&self, headers: &HeaderMap) -> Result<String, ClaimError> {
        let token = match self {
            TokenSource::Bearer { cookie } => match headers.get(AUTHORIZATION) {
                Some(value) => {
                    let value = value.to_str().map_err(|_| {
                        ClaimError::MalformedToken("Authorization header is not ASCII".to_string())
                    })?;
                    strip_bearer(value).to_string()
                }
                None => cookie_value(headers, cookie)?,
            },
            TokenSource::Header(name) => headers
                .get(name.as_str())
                .ok_or_else(|| ClaimError::MissingToken(format!("{name} header")))?
                .to_str()
                .map_err(|_| ClaimError::MalformedToken(format!("{name} header is not ASCII")))?
                .to_string(),
            TokenSource::Cookie(name) => cookie_value(headers, name)?,
        };

        let token = token.trim();
        if token.is_empty() {
            return Err(ClaimError::EmptyToken);
        }
        Ok(token.to_string())
    }
}

fn strip_bearer(value: &str) -> &str {
    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token,
        _ if value.eq_ignore_ascii_case("bearer") => "",
        _ => value,
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Result<String, ClaimError> {
    for header in headers.get_all(COOKIE) {
        let Ok(header) = header.to_str() else {
            continue;
        };
        for cookie in header.split(';') {
            if let Some((key, value)) = cookie.trim().split_once('=')
                && key.trim() == name
            {
                return Ok(value.trim().trim_matches('"').to_string());
            }
        }
    }

    Err(ClaimError::MissingToken(format!("{name} cookie")))
}
