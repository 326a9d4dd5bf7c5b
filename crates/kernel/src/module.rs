//! The unit of composition: each feature registers a [`Module`] with the
//! [`ModuleRegistry`](crate::ModuleRegistry), which drives it through
//! `init`, the shared migration run, `start`, serving, and `stop`.

use async_trait::async_trait;
use axum::Router;

/// Read-only view of the loaded settings handed to lifecycle hooks.
pub struct InitCtx<'a> {
    pub settings: &'a crate::settings::Settings,
}

/// One idempotent SQL script, recorded in `schema_migrations` under
/// `(module name, id)` once applied.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

#[async_trait]
pub trait Module: Sync + Send {
    /// Registry key; also the `module` column of `schema_migrations`.
    fn name(&self) -> &'static str;

    /// First hook at boot. Runs before any migration, so the schema may
    /// not exist yet. An error aborts startup.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Routes mounted both at the root and under `api.base_path`, each
    /// copy behind the body limit, rate limit, and API-key guards.
    fn routes(&self) -> Router {
        Router::new()
    }

    /// `paths` and `components` merged into `/api-docs/openapi.json`.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Applied once per database, ordered by module name then `id`.
    fn migrations(&self) -> Vec<Migration> {
        vec![]
    }

    /// Runs once every migration has been applied, before the listener
    /// binds.
    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the server drains, in reverse registration order. Called
    /// even when serving failed.
    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
