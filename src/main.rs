use cdn_validator::Config;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    init_tracing(&config.log_level);

    if let Err(err) = cdn_validator::run(config).await {
        error!(error = ?err, "Server exited with error");
        return Err(err);
    }

    Ok(())
}
