use anyhow::Context;
use calcd::{app, config::AppConfig, shutdown, state::AppState, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("calcd=debug,axum=info,tower_http=info");

    let config = AppConfig::from_env()?;
    let addr = config.listen_addr()?;
    let grace = config.shutdown_grace;

    let shutdown = shutdown::install_shutdown_handler();
    let state = AppState::init(config).await?;

    state
        .jobs
        .recover_pending()
        .await
        .context("recover pending jobs")?;

    let router = app::build_app(state.clone());
    app::serve(router, addr, shutdown).await?;

    if !state.jobs.shutdown(grace).await {
        tracing::warn!("some evaluations did not finish; they stay pending until next start");
    }
    state.store.close().await;
    tracing::info!("server stopped");
    Ok(())
}
