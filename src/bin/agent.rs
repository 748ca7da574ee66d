use calcd::{config::AgentConfig, grpc::AgentServer, shutdown, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("calcd=debug,tower_http=info");

    let config = AgentConfig::from_env()?;
    let listener = tokio::net::TcpListener::bind(config.listen_addr()?).await?;
    let shutdown = shutdown::install_shutdown_handler();

    AgentServer::new(&config).run(listener, shutdown).await?;
    tracing::info!("agent stopped");
    Ok(())
}
