//! Path normalisation and prefix confinement for invalidation batches.
//!
//! Caller paths are relative to the distribution root. Literal `.` and `..`
//! segments are collapsed; a `..` that would climb above the root cannot be
//! resolved and fails the request. Percent-encoded separators or dot
//! segments are never collapsed: they only serve to escape the prefix, so the
//! path is reported as out of scope. Segments are decoded exactly once, and
//! anything still encoded afterwards is treated the same way.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("malformed percent-encoding")]
    MalformedEncoding,

    #[error("decoded path is not valid UTF-8")]
    InvalidUtf8,

    #[error("control character in path")]
    ControlCharacter,

    #[error("path climbs above the distribution root")]
    AboveRoot,

    #[error("percent-encoded traversal sequence")]
    EncodedTraversal,

    #[error("nested percent-encoding")]
    NestedEncoding,

    #[error("percent-encoded wildcard")]
    EncodedWildcard,
}

impl PathError {
    /// Errors that can only be explained as an attempt to leave the prefix.
    fn is_escape(&self) -> bool {
        matches!(self, PathError::EncodedTraversal | PathError::NestedEncoding)
    }
}

/// Why a batch was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A path could not be resolved unambiguously.
    Invalid { path: String, reason: PathError },
    /// Paths that resolve outside the prefix, as the caller sent them.
    Escapes(Vec<String>),
}

/// Resolve `raw` to a canonical absolute path under the distribution root.
pub fn normalize(raw: &str) -> Result<String, PathError> {
    let mut segments: Vec<String> = Vec::new();

    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop().ok_or(PathError::AboveRoot)?;
                continue;
            }
            _ => {}
        }

        let decoded = decode_segment(segment)?;
        if decoded == "." || decoded == ".." || decoded.contains(['/', '\\']) {
            return Err(PathError::EncodedTraversal);
        }
        segments.push(decoded);
    }

    let mut path = format!("/{}", segments.join("/"));
    if raw.ends_with('/') && !segments.is_empty() {
        path.push('/');
    }
    Ok(path)
}

fn decode_segment(segment: &str) -> Result<String, PathError> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escaped = escaped_byte(&bytes[i..]).ok_or(PathError::MalformedEncoding)?;
            // A literal `*` widens the invalidation, so it must be sent as `*`.
            if escaped == b'*' {
                return Err(PathError::EncodedWildcard);
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let decoded = urlencoding::decode(segment).map_err(|_| PathError::InvalidUtf8)?;
    if decoded.chars().any(char::is_control) {
        return Err(PathError::ControlCharacter);
    }
    if decoded
        .as_bytes()
        .windows(3)
        .any(|window| escaped_byte(window).is_some())
    {
        return Err(PathError::NestedEncoding);
    }
    Ok(decoded.into_owned())
}

/// Value of a `%XX` escape at the start of `bytes`.
fn escaped_byte(bytes: &[u8]) -> Option<u8> {
    match bytes {
        [b'%', high, low, ..] => {
            let high = (*high as char).to_digit(16)?;
            let low = (*low as char).to_digit(16)?;
            Some((high * 16 + low) as u8)
        }
        _ => None,
    }
}

/// Place a normalised path under `prefix`.
pub fn join(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    match (prefix.is_empty(), path) {
        (true, _) => path.to_string(),
        (false, "/") => prefix.to_string(),
        (false, _) => format!("{prefix}{path}"),
    }
}

/// Whether `path` is `prefix` itself or below it, on a segment boundary.
pub fn is_within(prefix: &str, path: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.starts_with('/');
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Normalise a whole batch under `prefix`. All or nothing: any unresolvable
/// path rejects the batch as invalid, otherwise every escaping path is listed.
pub fn confine_paths(prefix: &str, paths: &[String]) -> Result<Vec<String>, Rejection> {
    let mut resolved = Vec::with_capacity(paths.len());
    let mut escapes = Vec::new();

    for raw in paths {
        match normalize(raw) {
            Ok(path) => {
                let full = join(prefix, &path);
                if is_within(prefix, &full) {
                    resolved.push(full);
                } else {
                    escapes.push(raw.clone());
                }
            }
            Err(reason) if reason.is_escape() => escapes.push(raw.clone()),
            Err(reason) => {
                return Err(Rejection::Invalid {
                    path: raw.clone(),
                    reason,
                });
            }
        }
    }

    if escapes.is_empty() {
        Ok(resolved)
    } else {
        Err(Rejection::Escapes(escapes))
    }
}
