use super::{CdnClient, CdnError, Invalidation, caller_reference};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const IN_PROGRESS: &str = "InProgress";
const COMPLETED: &str = "Completed";

#[derive(Default)]
struct MemoryState {
    // (distribution id, invalidation id)
    invalidations: HashMap<(String, String), Invalidation>,
    // (distribution id, caller reference, paths) -> invalidation id
    references: HashMap<(String, String, Vec<String>), String>,
    submissions: usize,
}

/// In-process stand-in for a CDN provider.
///
/// Follows the provider's batch semantics: the same distribution and paths
/// submitted within one second return the invalidation already created, and
/// an invalidation reports `Completed` once `completion_delay` has passed.
pub struct MemoryCdn {
    state: Mutex<MemoryState>,
    completion_delay: Duration,
}

impl MemoryCdn {
    pub fn new() -> Self {
        Self::with_completion_delay(Duration::from_secs(60))
    }

    pub fn with_completion_delay(completion_delay: Duration) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            completion_delay,
        }
    }

    /// Number of create calls received, including deduplicated ones.
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    /// Number of distinct invalidations held.
    pub fn invalidations(&self) -> usize {
        self.state.lock().invalidations.len()
    }
}

impl Default for MemoryCdn {
    fn default() -> Self {
        Self::new()
    }
}

fn new_invalidation_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string().to_uppercase();
    id.truncate(13);
    format!("I{id}")
}

#[async_trait]
impl CdnClient for MemoryCdn {
    async fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
    ) -> Result<Invalidation, CdnError> {
        if paths.is_empty() {
            return Err(CdnError::Provider("invalidation batch has no paths".to_string()));
        }

        let now = Utc::now();
        let reference = (
            distribution_id.to_string(),
            caller_reference(now),
            paths.to_vec(),
        );

        let mut state = self.state.lock();
        state.submissions += 1;

        if let Some(id) = state.references.get(&reference)
            && let Some(existing) = state
                .invalidations
                .get(&(distribution_id.to_string(), id.clone()))
        {
            return Ok(existing.clone());
        }

        let invalidation = Invalidation {
            id: new_invalidation_id(),
            status: IN_PROGRESS.to_string(),
            create_time: now,
            paths: paths.to_vec(),
        };
        state
            .references
            .insert(reference, invalidation.id.clone());
        state.invalidations.insert(
            (distribution_id.to_string(), invalidation.id.clone()),
            invalidation.clone(),
        );

        info!(distribution_id, invalidation_id = %invalidation.id, paths = paths.len(), "Invalidation created");
        Ok(invalidation)
    }

    async fn get_invalidation(
        &self,
        distribution_id: &str,
        invalidation_id: &str,
    ) -> Result<Invalidation, CdnError> {
        let state = self.state.lock();
        let mut invalidation = state
            .invalidations
            .get(&(distribution_id.to_string(), invalidation_id.to_string()))
            .cloned()
            .ok_or_else(|| CdnError::NotFound {
                distribution_id: distribution_id.to_string(),
                id: invalidation_id.to_string(),
            })?;

        let age = Utc::now().signed_duration_since(invalidation.create_time);
        if age.to_std().is_ok_and(|age| age >= self.completion_delay) {
            invalidation.status = COMPLETED.to_string();
        }
        Ok(invalidation)
    }
}
