use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or watching the distribution configuration.
///
/// A failed load never touches the live configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration document is empty")]
    Empty,

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("error parsing configuration: distribution value duplicated id:{id} prefix:{prefix} ({first}, {second})")]
    DuplicateDistribution {
        id: String,
        prefix: String,
        first: String,
        second: String,
    },

    #[error("error parsing configuration: distribution {distribution} in entitlement {claim} is not configured")]
    UnknownDistribution { claim: String, distribution: String },

    #[error("error parsing configuration: distribution {name} {reason}")]
    InvalidDistribution { name: String, reason: &'static str },

    #[error("failed to watch configuration {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// A vanity distribution: a provider distribution confined to a path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Distribution {
    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub provider_id: String,
    #[serde(rename = "pathPrefix")]
    pub path_prefix: String,
}

#[derive(Debug, Deserialize)]
struct DistributionEntry {
    id: String,
    prefix: String,
}

/// On-disk shape of the configuration document.
///
/// ```yaml
/// distributions:
///   dis1: { id: "123", prefix: "/foo" }
/// entitlements:
///   grp1: [dis1]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Document {
    distributions: BTreeMap<String, DistributionEntry>,
    entitlements: BTreeMap<String, Vec<String>>,
}

/// A fully validated configuration, swapped into the store as a unit.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub(crate) distributions: HashMap<String, Distribution>,
    pub(crate) entitlements: HashMap<String, Vec<String>>,
}

/// Parse and validate a candidate document without touching any live state.
pub(crate) fn parse(bytes: &[u8]) -> Result<Snapshot, ConfigError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ConfigError::Empty);
    }

    let document: Document = serde_yaml::from_slice(bytes)?;
    validate_distributions(&document.distributions)?;
    validate_entitlements(&document.entitlements, &document.distributions)?;

    let distributions = document
        .distributions
        .into_iter()
        .map(|(name, entry)| {
            let distribution = Distribution {
                name: name.clone(),
                provider_id: entry.id,
                path_prefix: entry.prefix,
            };
            (name, distribution)
        })
        .collect();

    Ok(Snapshot {
        distributions,
        entitlements: document.entitlements.into_iter().collect(),
    })
}

/// Every `(id, prefix)` pair must be unique, otherwise two vanity names would
/// be indistinguishable on the provider side.
fn validate_distributions(
    distributions: &BTreeMap<String, DistributionEntry>,
) -> Result<(), ConfigError> {
    let mut seen: HashMap<(&str, &str), &str> = HashMap::with_capacity(distributions.len());

    for (name, entry) in distributions {
        if entry.id.is_empty() {
            return Err(ConfigError::InvalidDistribution {
                name: name.clone(),
                reason: "has an empty id",
            });
        }
        if !entry.prefix.starts_with('/') {
            return Err(ConfigError::InvalidDistribution {
                name: name.clone(),
                reason: "prefix must be an absolute path",
            });
        }
        if entry.prefix.split('/').any(|segment| segment == "." || segment == "..") {
            return Err(ConfigError::InvalidDistribution {
                name: name.clone(),
                reason: "prefix must not contain dot segments",
            });
        }

        if let Some(first) = seen.insert((&entry.id, &entry.prefix), name) {
            return Err(ConfigError::DuplicateDistribution {
                id: entry.id.clone(),
                prefix: entry.prefix.clone(),
                first: first.to_string(),
                second: name.clone(),
            });
        }
    }

    Ok(())
}

fn validate_entitlements(
    entitlements: &BTreeMap<String, Vec<String>>,
    distributions: &BTreeMap<String, DistributionEntry>,
) -> Result<(), ConfigError> {
    for (claim, names) in entitlements {
        if let Some(missing) = names.iter().find(|name| !distributions.contains_key(*name)) {
            return Err(ConfigError::UnknownDistribution {
                claim: claim.clone(),
                distribution: missing.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"---
distributions:
  dis1:
    id: "123"
    prefix: "/foo"
  dis2:
    id: "456"
    prefix: "/bar"
entitlements:
  grp1:
    - dis1
    - dis2
  grp2:
    - dis2
"#;

    #[test]
    fn test_parse_valid_document() {
        let snapshot = parse(VALID.as_bytes()).unwrap();

        let dis1 = &snapshot.distributions["dis1"];
        assert_eq!(dis1.name, "dis1");
        assert_eq!(dis1.provider_id, "123");
        assert_eq!(dis1.path_prefix, "/foo");
        assert_eq!(snapshot.entitlements["grp1"], vec!["dis1", "dis2"]);
        assert_eq!(snapshot.entitlements["grp2"], vec!["dis2"]);
    }

    #[test]
    fn test_duplicate_id_and_prefix_rejected() {
        let doc = r#"
distributions:
  dis1: { id: "123", prefix: "/foo" }
  repeated: { id: "123", prefix: "/foo" }
"#;
        let err = parse(doc.as_bytes()).unwrap_err();
        match err {
            ConfigError::DuplicateDistribution {
                id,
                prefix,
                first,
                second,
            } => {
                assert_eq!(id, "123");
                assert_eq!(prefix, "/foo");
                assert_eq!(first, "dis1");
                assert_eq!(second, "repeated");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_same_id_different_prefix_allowed() {
        let doc = r#"
distributions:
  dis1: { id: "123", prefix: "/foo" }
  dis2: { id: "123", prefix: "/bar" }
"#;
        assert!(parse(doc.as_bytes()).is_ok());
    }

    #[test]
    fn test_dangling_entitlement_rejected() {
        let doc = r#"
distributions:
  dis1: { id: "123", prefix: "/foo" }
  dis2: { id: "456", prefix: "/bar" }
entitlements:
  grp1: [dis1, dis2]
  grp2: [dis3]
"#;
        let err = parse(doc.as_bytes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error parsing configuration: distribution dis3 in entitlement grp2 is not configured"
        );
    }

    #[test]
    fn test_relative_prefix_rejected() {
        let doc = r#"
distributions:
  dis1: { id: "123", prefix: "foo" }
"#;
        assert!(matches!(
            parse(doc.as_bytes()),
            Err(ConfigError::InvalidDistribution { .. })
        ));

        let doc = r#"
distributions:
  dis1: { id: "123", prefix: "/foo/../bar" }
"#;
        assert!(matches!(
            parse(doc.as_bytes()),
            Err(ConfigError::InvalidDistribution { .. })
        ));
    }

    #[test]
    fn test_empty_and_garbage_documents() {
        assert!(matches!(parse(b""), Err(ConfigError::Empty)));
        assert!(matches!(parse(b"  \n"), Err(ConfigError::Empty)));
        assert!(matches!(
            parse(b"distributions: [1, 2"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_sections_are_optional() {
        let snapshot = parse(b"distributions: {}\n").unwrap();
        assert!(snapshot.distributions.is_empty());
        assert!(snapshot.entitlements.is_empty());
    }
}
