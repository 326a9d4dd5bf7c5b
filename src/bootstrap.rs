//! Process lifecycle: connect, register modules, migrate, serve, stop.

use anyhow::Context;
use bookshelf_kernel::{InitCtx, ModuleRegistry, Settings};
use sqlx::PgPool;

use crate::modules;

/// Registry with the `db` core module and every application module.
pub fn build_registry(pool: &PgPool) -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register_core(bookshelf_db::create_module(pool.clone()));
    modules::register_all(&mut registry, pool);

    tracing::info!(
        core = registry.core_module_count(),
        custom = registry.custom_module_count(),
        "modules registered"
    );
    registry
}

/// Apply pending migrations and return how many ran.
pub async fn migrate(settings: &Settings) -> anyhow::Result<usize> {
    let pool = bookshelf_db::connect(&settings.database).await?;
    let registry = build_registry(&pool);

    let applied = apply_migrations(&registry, &pool).await;
    pool.close().await;
    applied
}

async fn apply_migrations(registry: &ModuleRegistry, pool: &PgPool) -> anyhow::Result<usize> {
    let migrations = registry.collect_migrations();
    let applied = bookshelf_db::run_migrations(pool, &migrations)
        .await
        .context("failed to apply migrations")?;

    tracing::info!(applied, known = migrations.len(), "migrations complete");
    Ok(applied)
}

/// Run the service until a shutdown signal arrives.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(
        environment = ?settings.environment,
        db_host = %settings.database.host,
        db_name = %settings.database.name,
        "bookshelf bootstrap starting"
    );

    let pool = bookshelf_db::connect(&settings.database).await?;
    let registry = build_registry(&pool);
    let ctx = InitCtx {
        settings: &settings,
    };

    registry
        .init_modules(&ctx)
        .await
        .context("module initialization failed")?;
    apply_migrations(&registry, &pool).await?;
    registry
        .start_modules(&ctx)
        .await
        .context("module start failed")?;

    let served = bookshelf_http::start_server(&registry, &settings).await;

    // Stop modules even when the server failed, then report the first error.
    let stopped = registry.stop_modules().await;
    served?;
    stopped.context("module shutdown failed")?;

    tracing::info!("bookshelf stopped");
    Ok(())
}
