use std::collections::BTreeSet;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, Executor, PgPool};
use tracing::{debug, info};

/// One step of the schema history.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub name: &'static str,
    pub sql: &'static str,
}

/// The schema history, in the order it must be applied.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        sql: include_str!("../migrations/0001_create_users.sql"),
    },
    Migration {
        version: 2,
        name: "create_expressions",
        sql: include_str!("../migrations/0002_create_expressions.sql"),
    },
    Migration {
        version: 3,
        name: "index_pending_expressions",
        sql: include_str!("../migrations/0003_index_pending_expressions.sql"),
    },
];

pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("connect to database")
}

/// Versions must be positive and strictly ascending.
pub fn check_ordering(migrations: &[Migration]) -> anyhow::Result<()> {
    let mut last = 0;
    for m in migrations {
        anyhow::ensure!(
            m.version > last,
            "migration {} ({}) is out of order after version {}",
            m.version,
            m.name,
            last
        );
        last = m.version;
    }
    Ok(())
}

/// Migrations not yet recorded in the ledger, in application order.
pub fn pending<'a>(migrations: &'a [Migration], applied: &BTreeSet<i64>) -> Vec<&'a Migration> {
    migrations
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect()
}

/// Brings the schema up to date and returns the versions applied by this call.
///
/// Every migration runs in its own transaction together with its ledger row in
/// `schema_migrations`, so a failed step leaves no trace and re-running is a
/// no-op for everything already recorded.
pub async fn run_migrations(db: &PgPool) -> anyhow::Result<Vec<i64>> {
    check_ordering(MIGRATIONS)?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version    BIGINT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(db)
    .await
    .context("create schema_migrations")?;

    let applied: BTreeSet<i64> =
        sqlx::query_scalar::<_, i64>("SELECT version FROM schema_migrations ORDER BY version")
            .fetch_all(db)
            .await
            .context("read applied migrations")?
            .into_iter()
            .collect();
    debug!(?applied, "migration ledger loaded");

    let mut newly_applied = Vec::new();
    for m in pending(MIGRATIONS, &applied) {
        let mut tx = db.begin().await?;
        // Plain string execution uses the simple protocol, which allows
        // several statements per file.
        (&mut *tx)
            .execute(m.sql)
            .await
            .with_context(|| format!("apply migration {} ({})", m.version, m.name))?;
        sqlx::query("INSERT INTO schema_migrations (version) VALUES ($1) ON CONFLICT DO NOTHING")
            .bind(m.version)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("record migration {}", m.version))?;
        tx.commit().await?;

        info!(version = m.version, name = m.name, "migration applied");
        newly_applied.push(m.version);
    }

    Ok(newly_applied)
}
