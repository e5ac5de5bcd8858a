use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use minirag_cli::{init_tracing, router};
use minirag_core::config::Config;
use minirag_rag::AppContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Config::load()?.into_settings();
    init_tracing(settings.app.debug);
    info!(app = %settings.app.name, "starting");

    let addr = settings.server.bind_addr();
    let ctx = Arc::new(AppContext::initialize(settings).await);
    let app = router(ctx.clone());

    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    ctx.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
    }
}
