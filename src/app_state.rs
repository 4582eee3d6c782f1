use crate::Config;
use crate::cdn::{CdnClient, MemoryCdn, TimeoutCdn};
use crate::claims::{ClaimState, TokenSource};
use crate::config::CdnBackend;
use crate::metrics::HttpMetrics;
use crate::service::{DistributionService, ServiceOptions};
use crate::store::{ConfigStore, WatchHandle};
use anyhow::Context;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DistributionService>,
    pub store: Arc<ConfigStore>,
    pub claim_state: ClaimState,
    pub metrics: Arc<HttpMetrics>,
    // Reload task lives as long as any clone of the state.
    _watch: Option<Arc<WatchHandle>>,
}

impl AppState {
    /// Load and watch the entitlements file, then wire the service.
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let path = config
            .entitlements_file
            .clone()
            .context("an entitlements file is required")?;

        let store = Arc::new(ConfigStore::new());
        let watch = store
            .watch(path)
            .await
            .context("failed to load distribution configuration")?;

        let cdn: Arc<dyn CdnClient> = match config.cdn_backend {
            CdnBackend::Memory => {
                info!(timeout = ?config.cdn_timeout(), "Using in-memory CDN backend");
                Arc::new(TimeoutCdn::new(MemoryCdn::new(), config.cdn_timeout()))
            }
        };

        let options = ServiceOptions {
            existence_policy: config.existence_policy,
        };

        let mut state = Self::from_parts(store, cdn, options, config.token_source())?;
        state._watch = Some(Arc::new(watch));

        info!(
            distributions = ?state.store.distribution_names(),
            policy = ?config.existence_policy,
            "Application state ready"
        );
        Ok(state)
    }

    /// Wire an already loaded store and a CDN client, without a file watch.
    pub fn from_parts(
        store: Arc<ConfigStore>,
        cdn: Arc<dyn CdnClient>,
        options: ServiceOptions,
        source: TokenSource,
    ) -> anyhow::Result<Self> {
        let service = Arc::new(DistributionService::new(store.clone(), cdn, options));
        let metrics = HttpMetrics::new().context("failed to register request metrics")?;

        Ok(Self {
            service,
            store,
            claim_state: ClaimState::new(source),
            metrics: Arc::new(metrics),
            _watch: None,
        })
    }
}
