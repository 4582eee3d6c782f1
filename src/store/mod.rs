pub mod document;
pub mod watch;

pub use document::{ConfigError, Distribution};
pub use watch::WatchHandle;

use document::Snapshot;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Outcome of resolving a distribution name for a set of claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// No distribution by that name is configured.
    Unknown,
    /// Configured, but none of the claims grant it.
    NotEntitled(Distribution),
    Entitled(Distribution),
}

/// Hot-reloadable mapping of vanity distributions and claim entitlements.
///
/// Readers take the lock only long enough to clone the current snapshot, and
/// a reload swaps in a fully validated snapshot, so a lookup never observes a
/// half-applied document.
#[derive(Debug, Default)]
pub struct ConfigStore {
    current: RwLock<Arc<Snapshot>>,
}

impl ConfigStore {
    /// Create an empty store. Nothing is entitled until the first `load`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse, validate and atomically install a configuration document.
    ///
    /// On error the previously loaded configuration stays authoritative.
    pub fn load(&self, bytes: &[u8]) -> Result<(), ConfigError> {
        let snapshot = document::parse(bytes)?;
        let distributions = snapshot.distributions.len();
        let entitlements = snapshot.entitlements.len();

        *self.current.write() = Arc::new(snapshot);

        info!(distributions, entitlements, "Distribution configuration loaded");
        Ok(())
    }

    /// Read `path` and `load` it.
    pub async fn load_file(&self, path: &Path) -> Result<(), ConfigError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        self.load(&bytes)
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }

    /// Union of the distributions granted by `claims`, deduplicated.
    /// Unknown claims contribute nothing.
    pub fn distributions_for_claims<S: AsRef<str>>(&self, claims: &[S]) -> BTreeSet<String> {
        let snapshot = self.snapshot();

        claims
            .iter()
            .filter_map(|claim| snapshot.entitlements.get(claim.as_ref()))
            .flatten()
            .filter(|name| snapshot.distributions.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    /// Point lookup. The returned value is a copy, not a view into the store.
    pub fn distribution(&self, name: &str) -> Option<Distribution> {
        self.snapshot().distributions.get(name).cloned()
    }

    /// Granted distributions with their details, read from one snapshot.
    pub fn entitled_distributions<S: AsRef<str>>(
        &self,
        claims: &[S],
    ) -> BTreeMap<String, Distribution> {
        let snapshot = self.snapshot();

        claims
            .iter()
            .filter_map(|claim| snapshot.entitlements.get(claim.as_ref()))
            .flatten()
            .filter_map(|name| snapshot.distributions.get(name))
            .map(|distribution| (distribution.name.clone(), distribution.clone()))
            .collect()
    }

    /// Resolve `name` against the claims' entitlements in one snapshot, so a
    /// concurrent reload cannot mix old entitlements with new distributions.
    pub fn lookup<S: AsRef<str>>(&self, claims: &[S], name: &str) -> Lookup {
        let snapshot = self.snapshot();

        let Some(distribution) = snapshot.distributions.get(name) else {
            return Lookup::Unknown;
        };

        let granted = claims
            .iter()
            .filter_map(|claim| snapshot.entitlements.get(claim.as_ref()))
            .flatten()
            .any(|granted| granted == name);

        if granted {
            Lookup::Entitled(distribution.clone())
        } else {
            Lookup::NotEntitled(distribution.clone())
        }
    }

    /// All configured distribution names, sorted.
    pub fn distribution_names(&self) -> Vec<String> {
        let snapshot = self.snapshot();
        let mut names: Vec<String> = snapshot.distributions.keys().cloned().collect();
        names.sort();
        names
    }
}
