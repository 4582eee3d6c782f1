pub mod error;
pub mod paths;

pub use error::{ErrorKind, InvalidationError};
pub use paths::{PathError, Rejection};

use crate::cdn::{CdnClient, Invalidation};
use crate::claims::Principal;
use crate::store::{ConfigStore, Distribution, Lookup};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// How to answer for a distribution that exists but is not granted to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExistencePolicy {
    /// Report `Unauthorized`: the distribution exists but access is denied.
    #[default]
    Reveal,
    /// Report `ResourceNotFound`, exactly as for an unknown name.
    Hide,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub existence_policy: ExistencePolicy,
}

/// Authorizes invalidation requests against the configured entitlements and
/// hands approved, prefix-confined batches to the CDN provider.
///
/// Every decision is made from the [`ConfigStore`] and the caller's claims;
/// the provider is only called once a request is fully authorized.
pub struct DistributionService {
    store: Arc<ConfigStore>,
    cdn: Arc<dyn CdnClient>,
    options: ServiceOptions,
}

impl DistributionService {
    pub fn new(store: Arc<ConfigStore>, cdn: Arc<dyn CdnClient>, options: ServiceOptions) -> Self {
        Self {
            store,
            cdn,
            options,
        }
    }

    /// Names of the distributions the principal may invalidate. An empty set
    /// is a valid answer; a principal without claims is not.
    pub fn list(&self, principal: &Principal) -> Result<BTreeSet<String>, InvalidationError> {
        if !principal.has_claims() {
            return Err(InvalidationError::NoClaimsPresent);
        }
        Ok(self.store.distributions_for_claims(principal.claims()))
    }

    /// Like [`list`](Self::list), with each distribution's details.
    pub fn list_distributions(
        &self,
        principal: &Principal,
    ) -> Result<BTreeMap<String, Distribution>, InvalidationError> {
        if !principal.has_claims() {
            return Err(InvalidationError::NoClaimsPresent);
        }
        Ok(self.store.entitled_distributions(principal.claims()))
    }

    fn resolve_authorized_distribution(
        &self,
        principal: &Principal,
        name: &str,
    ) -> Result<Distribution, InvalidationError> {
        if !principal.has_claims() {
            return Err(InvalidationError::NoClaimsPresent);
        }

        match self.store.lookup(principal.claims(), name) {
            Lookup::Entitled(distribution) => Ok(distribution),
            Lookup::Unknown => {
                warn!(distribution = name, "Distribution not found");
                Err(InvalidationError::ResourceNotFound(name.to_string()))
            }
            Lookup::NotEntitled(_) => {
                warn!(distribution = name, "Distribution not entitled to caller");
                match self.options.existence_policy {
                    ExistencePolicy::Reveal => {
                        Err(InvalidationError::Unauthorized(name.to_string()))
                    }
                    ExistencePolicy::Hide => {
                        Err(InvalidationError::ResourceNotFound(name.to_string()))
                    }
                }
            }
        }
    }

    /// Submit `paths`, relative to the distribution's prefix, for invalidation.
    ///
    /// The batch is all or nothing: one unresolvable path fails it as a bad
    /// request, and any path outside the prefix fails it as unauthorized.
    pub async fn create_invalidation(
        &self,
        principal: &Principal,
        distribution_name: &str,
        paths: &[String],
    ) -> Result<Invalidation, InvalidationError> {
        if paths.is_empty() {
            return Err(InvalidationError::NoPaths);
        }

        let distribution = self.resolve_authorized_distribution(principal, distribution_name)?;

        let confined = paths::confine_paths(&distribution.path_prefix, paths).map_err(|rejection| {
            match rejection {
                Rejection::Invalid { path, reason } => {
                    warn!(distribution = distribution_name, path, %reason, "Invalid invalidation path");
                    InvalidationError::InvalidPath { path, reason }
                }
                Rejection::Escapes(escapes) => {
                    warn!(
                        distribution = distribution_name,
                        paths = ?escapes,
                        "Invalidation paths escape distribution prefix"
                    );
                    InvalidationError::PathsOutOfScope {
                        distribution: distribution_name.to_string(),
                        paths: escapes,
                    }
                }
            }
        })?;

        let invalidation = self
            .cdn
            .create_invalidation(&distribution.provider_id, &confined)
            .await
            .map_err(|source| {
                error!(distribution = distribution_name, error = %source, "CreateInvalidation failed");
                InvalidationError::Cdn {
                    operation: "CreateInvalidation",
                    source,
                }
            })?;

        info!(
            distribution = distribution_name,
            invalidation_id = %invalidation.id,
            paths = confined.len(),
            "Invalidation submitted"
        );
        Ok(invalidation)
    }

    /// Status of an earlier invalidation on a distribution the principal may use.
    pub async fn get_invalidation_status(
        &self,
        principal: &Principal,
        distribution_name: &str,
        invalidation_id: &str,
    ) -> Result<Invalidation, InvalidationError> {
        let distribution = self.resolve_authorized_distribution(principal, distribution_name)?;

        self.cdn
            .get_invalidation(&distribution.provider_id, invalidation_id)
            .await
            .map_err(|source| {
                error!(
                    distribution = distribution_name,
                    invalidation_id,
                    error = %source,
                    "GetInvalidation failed"
                );
                InvalidationError::Cdn {
                    operation: "GetInvalidation",
                    source,
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::{CdnError, MemoryCdn};
    use crate::store::tests::sample_store;
    use async_trait::async_trait;

    fn principal(claims: &[&str]) -> Principal {
        Principal::new(claims.iter().map(|claim| claim.to_string()).collect())
    }

    fn paths(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn service_with(policy: ExistencePolicy) -> (DistributionService, Arc<MemoryCdn>) {
        let cdn = Arc::new(MemoryCdn::new());
        let service = DistributionService::new(
            Arc::new(sample_store()),
            cdn.clone(),
            ServiceOptions {
                existence_policy: policy,
            },
        );
        (service, cdn)
    }

    fn service() -> (DistributionService, Arc<MemoryCdn>) {
        service_with(ExistencePolicy::Reveal)
    }

    struct FailingCdn;

    #[async_trait]
    impl CdnClient for FailingCdn {
        async fn create_invalidation(
            &self,
            _distribution_id: &str,
            _paths: &[String],
        ) -> Result<Invalidation, CdnError> {
            Err(CdnError::Provider("TooManyInvalidationsInProgress".to_string()))
        }

        async fn get_invalidation(
            &self,
            distribution_id: &str,
            invalidation_id: &str,
        ) -> Result<Invalidation, CdnError> {
            Err(CdnError::NotFound {
                distribution_id: distribution_id.to_string(),
                id: invalidation_id.to_string(),
            })
        }
    }

    #[test]
    fn test_list() {
        let (service, _) = service();

        let names = service.list(&principal(&["grp1"])).unwrap();
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["dis1", "dis2"]);

        assert!(service.list(&principal(&["nobody"])).unwrap().is_empty());
        assert!(matches!(
            service.list(&principal(&[])),
            Err(InvalidationError::NoClaimsPresent)
        ));
    }

    #[test]
    fn test_list_distributions_details() {
        let (service, _) = service();

        let distributions = service.list_distributions(&principal(&["grp2"])).unwrap();
        assert_eq!(distributions.len(), 1);
        assert_eq!(distributions["dis2"].path_prefix, "/bar");
        assert!(matches!(
            service.list_distributions(&principal(&[])),
            Err(InvalidationError::NoClaimsPresent)
        ));
    }

    #[tokio::test]
    async fn test_unentitled_distribution_is_unauthorized() {
        let (service, cdn) = service();

        let err = service
            .create_invalidation(&principal(&["grp2"]), "dis1", &paths(&["/*"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(matches!(err, InvalidationError::Unauthorized(name) if name == "dis1"));
        assert_eq!(cdn.submissions(), 0);
    }

    #[tokio::test]
    async fn test_hide_policy_reports_not_found() {
        let (service, cdn) = service_with(ExistencePolicy::Hide);

        let err = service
            .create_invalidation(&principal(&["grp2"]), "dis1", &paths(&["/*"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
        assert_eq!(cdn.submissions(), 0);
    }

    #[tokio::test]
    async fn test_create_invalidation_prefixes_paths() {
        let (service, cdn) = service();

        let invalidation = service
            .create_invalidation(&principal(&["grp1"]), "dis1", &paths(&["/*", "/a/*"]))
            .await
            .unwrap();

        assert_eq!(invalidation.paths, paths(&["/foo/*", "/foo/a/*"]));
        assert_eq!(cdn.submissions(), 1);

        // The invalidation lives under dis1's provider id.
        let status = service
            .get_invalidation_status(&principal(&["grp1"]), "dis1", &invalidation.id)
            .await
            .unwrap();
        assert_eq!(status.id, invalidation.id);
    }

    #[tokio::test]
    async fn test_traversal_above_root_is_bad_request() {
        let (service, cdn) = service();

        let err = service
            .create_invalidation(&principal(&["grp1"]), "dis1", &paths(&["/a/../../*"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(cdn.submissions(), 0);
    }

    #[tokio::test]
    async fn test_encoded_traversal_rejects_whole_batch() {
        let (service, cdn) = service();

        let err = service
            .create_invalidation(
                &principal(&["grp1"]),
                "dis1",
                &paths(&["/ok/*", "/%2e%2e%2fbar/*", "/also-ok"]),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        match err {
            InvalidationError::PathsOutOfScope {
                distribution,
                paths: offending,
            } => {
                assert_eq!(distribution, "dis1");
                assert_eq!(offending, paths(&["/%2e%2e%2fbar/*"]));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cdn.submissions(), 0);
    }

    #[tokio::test]
    async fn test_malformed_encoding_is_bad_request() {
        let (service, cdn) = service();

        let err = service
            .create_invalidation(&principal(&["grp1"]), "dis1", &paths(&["/a/%zz"]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvalidationError::InvalidPath {
                reason: PathError::MalformedEncoding,
                ..
            }
        ));
        assert_eq!(cdn.submissions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_distribution_is_not_found() {
        let (service, _) = service();

        let err = service
            .create_invalidation(&principal(&["grp1"]), "dis3", &paths(&["/*"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);

        let err = service
            .get_invalidation_status(&principal(&["grp1"]), "dis3", "I123")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    }

    #[tokio::test]
    async fn test_empty_paths_checked_first() {
        let (service, _) = service();

        let err = service
            .create_invalidation(&principal(&[]), "dis1", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, InvalidationError::NoPaths));

        let err = service
            .create_invalidation(&principal(&[]), "dis1", &paths(&["/*"]))
            .await
            .unwrap_err();
        assert!(matches!(err, InvalidationError::NoClaimsPresent));
    }

    #[tokio::test]
    async fn test_status_requires_entitlement() {
        let (service, _) = service();

        let created = service
            .create_invalidation(&principal(&["grp1"]), "dis1", &paths(&["/*"]))
            .await
            .unwrap();

        let err = service
            .get_invalidation_status(&principal(&["grp2"]), "dis1", &created.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_cdn_failures_are_internal() {
        let service = DistributionService::new(
            Arc::new(sample_store()),
            Arc::new(FailingCdn),
            ServiceOptions::default(),
        );

        let err = service
            .create_invalidation(&principal(&["grp1"]), "dis1", &paths(&["/*"]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(err.reason(), "Internal error");

        let err = service
            .get_invalidation_status(&principal(&["grp1"]), "dis2", "I404")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InvalidationError::Cdn {
                operation: "GetInvalidation",
                ..
            }
        ));
    }
}
