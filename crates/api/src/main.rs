use std::sync::Arc;

use anyhow::Context;

use warden_api::app::{AppContext, build_app};
use warden_infra::{AppConfig, LogFormat};
use warden_observability::LogOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    warden_observability::init_with(&LogOptions::new(
        config.log.level.clone(),
        config.log.format == LogFormat::Json,
    ));

    let addr = config.server_addr();
    let ctx = Arc::new(AppContext::connect(config).await?);
    let app = build_app(ctx);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
