//! Claim decoding for bearer JWTs.
//!
//! Signatures are NOT verified here. Tokens reach this service through an
//! ingress or identity proxy that has already authenticated them; this module
//! only reads the groups and scopes they carry.

use crate::claims::error::ClaimError;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// The subset of token claims used for entitlement matching.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default, deserialize_with = "groups")]
    pub groups: Vec<String>,

    #[serde(default, rename = "scp", deserialize_with = "scopes")]
    pub scopes: Vec<String>,
}

impl TokenClaims {
    /// Groups followed by scopes, as one flat list. Duplicates are kept.
    pub fn into_claims(self) -> Vec<String> {
        let mut claims = self.groups;
        claims.extend(self.scopes);
        claims
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    List(Vec<String>),
    Single(String),
}

// A lone string is a single group name.
fn groups<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        Some(StringOrList::List(values)) => values,
        Some(StringOrList::Single(value)) => vec![value],
        None => Vec::new(),
    })
}

// A lone string is an OAuth space-delimited scope list.
fn scopes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match Option::<StringOrList>::deserialize(deserializer)? {
        Some(StringOrList::List(values)) => values,
        Some(StringOrList::Single(value)) => {
            value.split_whitespace().map(str::to_string).collect()
        }
        None => Vec::new(),
    })
}

/// Decode the claims of a compact JWS without checking its signature.
pub fn decode_unverified(token: &str) -> Result<TokenClaims, ClaimError> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ClaimError::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let header: Value = decode_segment(header, "header")?;
    if !header.get("alg").is_some_and(Value::is_string) {
        return Err(ClaimError::MalformedToken("header has no alg".to_string()));
    }

    decode_segment(payload, "payload")
}

fn decode_segment<T: DeserializeOwned>(segment: &str, what: &str) -> Result<T, ClaimError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|_| ClaimError::MalformedToken(format!("{what} is not base64url")))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| ClaimError::MalformedToken(format!("{what}: {err}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Build an unsigned-looking token around an arbitrary payload.
    pub(crate) fn token(payload: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": "RS256", "typ": "JWT"}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{payload}.c2lnbmF0dXJl")
    }

    #[test]
    fn test_decode_groups_and_scopes() {
        let claims = decode_unverified(&token(json!({
            "sub": "user",
            "groups": ["grp1", "grp2"],
            "scp": ["cdn.read"]
        })))
        .unwrap();

        assert_eq!(claims.groups, vec!["grp1", "grp2"]);
        assert_eq!(claims.scopes, vec!["cdn.read"]);
        assert_eq!(claims.into_claims(), vec!["grp1", "grp2", "cdn.read"]);
    }

    #[test]
    fn test_decode_string_forms() {
        let claims = decode_unverified(&token(json!({
            "groups": "Domain Admins",
            "scp": "cdn.read cdn.write"
        })))
        .unwrap();

        assert_eq!(claims.groups, vec!["Domain Admins"]);
        assert_eq!(claims.scopes, vec!["cdn.read", "cdn.write"]);
    }

    #[test]
    fn test_decode_missing_and_null_claims() {
        let claims = decode_unverified(&token(json!({"sub": "user", "scp": null}))).unwrap();
        assert!(claims.into_claims().is_empty());
    }

    #[test]
    fn test_duplicates_are_kept() {
        let claims = decode_unverified(&token(json!({"groups": ["a"], "scp": ["a"]}))).unwrap();
        assert_eq!(claims.into_claims(), vec!["a", "a"]);
    }

    #[test]
    fn test_malformed_tokens() {
        let cases = [
            "not-a-token".to_string(),
            "a.b".to_string(),
            "a.b.c.d".to_string(),
            "!!!.e30.sig".to_string(),
            format!("{}.e30.sig", URL_SAFE_NO_PAD.encode("{}")),
            format!("{}.bm90IGpzb24.sig", URL_SAFE_NO_PAD.encode(r#"{"alg":"none"}"#)),
            token(json!({"groups": [1, 2]})),
        ];

        for case in cases {
            let result = decode_unverified(&case);
            assert!(
                matches!(result, Err(ClaimError::MalformedToken(_))),
                "{case} decoded to {result:?}"
            );
        }
    }
}
