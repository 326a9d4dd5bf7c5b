//! PostgreSQL integration: pool construction from settings, the migration
//! runner for module-contributed migrations, and the `db` core module.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use bookshelf_kernel::settings::DatabaseSettings;
use bookshelf_kernel::{InitCtx, Migration, Module};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};

/// Build connection options from settings without touching the network.
pub fn connect_options(settings: &DatabaseSettings) -> anyhow::Result<PgConnectOptions> {
    let ssl_mode = PgSslMode::from_str(&settings.ssl_mode)
        .with_context(|| format!("invalid database ssl_mode '{}'", settings.ssl_mode))?;

    Ok(PgConnectOptions::new()
        .host(&settings.host)
        .port(settings.port)
        .username(&settings.user)
        .password(&settings.password)
        .database(&settings.name)
        .ssl_mode(ssl_mode))
}

/// Pool bounds derived from settings. At most `max_idle_connections` are kept
/// warm; connections idle beyond `idle_timeout_secs` are closed.
pub fn pool_options(settings: &DatabaseSettings) -> PgPoolOptions {
    let max_connections = settings.max_connections.max(1);

    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(settings.max_idle_connections.min(max_connections))
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .idle_timeout(Some(Duration::from_secs(settings.idle_timeout_secs)))
}

/// Open a connection pool and verify the server is reachable.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<PgPool> {
    tracing::info!(
        target: "bookshelf-db",
        host = %settings.host,
        port = settings.port,
        database = %settings.name,
        max_connections = settings.max_connections,
        "connecting to PostgreSQL"
    );

    let pool = pool_options(settings)
        .connect_with(connect_options(settings)?)
        .await
        .with_context(|| {
            format!(
                "failed to connect to PostgreSQL at {}:{}",
                settings.host, settings.port
            )
        })?;

    Ok(pool)
}

const MIGRATION_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (module, id)
    )
"#;

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row. Returns the number of migrations applied.
pub async fn run_migrations(
    pool: &PgPool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::query(MIGRATION_TABLE)
        .execute(pool)
        .await
        .context("failed to create schema_migrations table")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already_applied: Option<(String,)> =
            sqlx::query_as("SELECT id FROM schema_migrations WHERE module = $1 AND id = $2")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .with_context(|| format!("failed to inspect migration {module}/{}", migration.id))?;

        if already_applied.is_some() {
            tracing::debug!(target: "bookshelf-db", %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open migration transaction")?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration {module}/{} failed", migration.id))?;

        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES ($1, $2)")
            .bind(module)
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to record migration {module}/{}", migration.id))?;

        tx.commit()
            .await
            .with_context(|| format!("failed to commit migration {module}/{}", migration.id))?;

        tracing::info!(target: "bookshelf-db", %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

/// Core module owning the connection pool's lifecycle.
pub struct DatabaseModule {
    pool: PgPool,
}

impl DatabaseModule {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Module for DatabaseModule {
    fn name(&self) -> &'static str {
        "db"
    }

    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("database ping failed")?;
        tracing::info!(target: "bookshelf-db", "database reachable");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.pool.close().await;
        tracing::info!(target: "bookshelf-db", "connection pool closed");
        Ok(())
    }
}

/// Create the `db` core module for the registry
pub fn create_module(pool: PgPool) -> Arc<dyn Module> {
    Arc::new(DatabaseModule::new(pool))
}
