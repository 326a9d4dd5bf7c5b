//! HTTP server facade for the bookshelf service: Axum router assembly,
//! request-scoped middleware, the shared error shape, and OpenAPI docs.

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use bookshelf_authz::ApiKeyGuard;
use bookshelf_kernel::{ModuleRegistry, Settings};

pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod router;

pub use error::{AppError, ErrorBody};

use rate_limit::{RateLimiter, RateLimiterConfig};
use router::{RouteGuards, RouterBuilder};

/// Start the HTTP server with the given module registry.
///
/// Returns once a shutdown signal arrives and in-flight requests drain.
pub async fn start_server(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<()> {
    let app = build_router(registry, settings).context("failed to build HTTP router")?;

    let address = settings.server.address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind to {address}"))?;

    tracing::info!(
        address = %address,
        environment = ?settings.environment,
        docs = settings.api.enable_docs,
        "HTTP server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

/// Build the main HTTP router with all module routes mounted
pub fn build_router(registry: &ModuleRegistry, settings: &Settings) -> anyhow::Result<Router> {
    let guards = route_guards(settings);

    let mut router_builder = RouterBuilder::new().route("/health", get(health_check));

    // Core modules own resources, not routes.
    for module in registry.custom_modules() {
        tracing::info!(
            module = module.name(),
            base_path = %settings.api.base_path,
            "mounting module routes"
        );
        router_builder =
            router_builder.mount_module(&settings.api.base_path, guards.apply(module.routes()));
    }

    if settings.api.enable_docs {
        router_builder = router_builder.with_openapi(registry, &settings.api);
    }

    let router = router_builder
        .with_timeout(settings.server.request_timeout_ms)
        .with_catch_panic()
        .with_error_normalization()
        .with_security_headers()
        .with_cors(&settings.cors)?
        .with_tracing()
        .with_request_id()
        .build();

    Ok(router)
}

fn route_guards(settings: &Settings) -> RouteGuards {
    let security = &settings.security;

    let rate_limiter = security.enable_rate_limit.then(|| {
        tracing::info!(
            rps = security.rate_limit_rps,
            burst = security.rate_limit_burst,
            "rate limiting enabled"
        );
        Arc::new(RateLimiter::new(RateLimiterConfig::new(
            security.rate_limit_rps,
            security.rate_limit_burst,
        )))
    });

    let api_key = security.enable_api_key.then(|| {
        tracing::info!(header = %security.api_key_header, "API key authentication enabled");
        Arc::new(ApiKeyGuard::from_settings(security))
    });

    RouteGuards {
        rate_limiter,
        api_key,
    }
}

/// Health check endpoint
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, draining connections");
}
