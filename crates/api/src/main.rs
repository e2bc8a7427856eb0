use std::sync::Arc;

use anyhow::Context;

use splitfund_api::app::{build_app, services::AppServices};
use splitfund_infra::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    splitfund_observability::init(config.log_format);

    let services = AppServices::from_config(&config).context("failed to initialise ledger services")?;
    let app = build_app(Arc::new(services));

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, journal = ?config.journal_path, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
