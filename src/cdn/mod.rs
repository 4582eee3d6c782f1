//! The CDN provider as seen by this service: two calls, submit an
//! invalidation and look one up. Provider specifics (credentials, retries,
//! rate limits) live behind [`CdnClient`].

pub mod memory;
pub mod timeout;

pub use memory::MemoryCdn;
pub use timeout::TimeoutCdn;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;

/// Provider view of a single invalidation batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    pub id: String,
    pub status: String,
    pub create_time: DateTime<Utc>,
    pub paths: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CdnError {
    #[error("cdn call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalidation {id} not found on distribution {distribution_id}")]
    NotFound { distribution_id: String, id: String },

    #[error("cdn provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait CdnClient: Send + Sync {
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<Invalidation, CdnError>;

    async fn get_invalidation(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<Invalidation, CdnError>;
}

/// Provider caller reference: UTC time to the second. Identical batches
/// submitted within the same second collapse into one invalidation.
pub fn caller_reference(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_caller_reference_format() {
        let at = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(caller_reference(at), "20060102150405");
    }
}
