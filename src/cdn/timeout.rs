use super::{CdnClient, CdnError, Invalidation};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Bounds every provider call by a fixed deadline.
pub struct TimeoutCdn<C> {
    inner: C,
    deadline: Duration,
}

impl<C> TimeoutCdn<C> {
    pub fn new(inner: C, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait]
impl<C: CdnClient> CdnClient for TimeoutCdn<C> {
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<Invalidation, CdnError> {
        timeout(
            self.deadline,
            self.inner.create_invalidation(distribution_id, paths),
        )
        .await
        .unwrap_or_else(|_| {
            warn!(distribution_id, deadline = ?self.deadline, "CreateInvalidation timed out");
            Err(CdnError::Timeout(self.deadline))
        })
    }

    async fn get_invalidation(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<Invalidation, CdnError> {
        timeout(
            self.deadline,
            self.inner.get_invalidation(distribution_id, invalidation_id),
        )
        .await
        .unwrap_or_else(|_| {
            warn!(distribution_id, invalidation_id, deadline = ?self.deadline, "GetInvalidation timed out");
            Err(CdnError::Timeout(self.deadline))
        })
    }
}
