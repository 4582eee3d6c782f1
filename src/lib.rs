pub mod api;
pub mod app_state;
pub mod cdn;
pub mod claims;
pub mod config;
pub mod metrics;
pub mod middleware;
pub mod service;
pub mod store;

use anyhow::Context;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

//
// Re-export
//
pub use api::router;
pub use app_state::AppState;
pub use cdn::{CdnClient, CdnError, Invalidation, MemoryCdn, TimeoutCdn};
pub use claims::{ClaimError, ClaimState, Principal, TokenSource, claim_auth_middleware};
pub use config::{AuthMode, CdnBackend, Config};
pub use metrics::HttpMetrics;
pub use service::{
    DistributionService, ErrorKind, ExistencePolicy, InvalidationError, ServiceOptions,
};
pub use store::{ConfigError, ConfigStore, Distribution, WatchHandle};

pub async fn run(config: Config) -> anyhow::Result<()> {
    let state = AppState::new(&config).await?;
    let app = router(state);

    info!("Listening on {}", config.listen_address);
    let listener = TcpListener::bind(&config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
