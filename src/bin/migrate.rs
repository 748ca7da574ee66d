use anyhow::Context;
use calcd::{db, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("calcd=info,sqlx=warn");

    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = db::connect(&database_url).await?;
    let applied = db::run_migrations(&pool).await?;

    if applied.is_empty() {
        tracing::info!("schema is up to date");
    } else {
        tracing::info!(?applied, "migrations applied");
    }
    pool.close().await;
    Ok(())
}
