//! Router builder for the bookshelf HTTP server
//!
//! Routes must be added before layers: a layer only wraps the routes that
//! exist when it is applied. Layers are applied inside-out, so the last
//! `with_*` call is the outermost.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, MethodRouter},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::{DefaultOnResponse, TraceLayer},
};
use uuid::Uuid;

use bookshelf_authz::ApiKeyGuard;
use bookshelf_kernel::settings::{ApiSettings, CorsSettings};
use bookshelf_kernel::ModuleRegistry;

use crate::middleware::{self, REQUEST_ID_HEADER};
use crate::rate_limit::RateLimiter;

/// Largest request body accepted by module routes
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Request ID generator producing time-ordered UUID v7 values
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = Uuid::now_v7().to_string().parse::<HeaderValue>().ok()?;
        Some(RequestId::new(request_id))
    }
}

/// Guards wrapped around every module router. `/health` and the docs are
/// mounted outside them.
#[derive(Clone, Default)]
pub struct RouteGuards {
    pub rate_limiter: Option<Arc<RateLimiter>>,
    pub api_key: Option<Arc<ApiKeyGuard>>,
}

impl RouteGuards {
    /// Wrap a module router. The rate limit runs before the key check so
    /// rejected keys still spend tokens.
    pub fn apply(&self, router: Router) -> Router {
        let mut router = router.layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

        if let Some(guard) = self.api_key.as_ref().filter(|guard| guard.is_enabled()) {
            router = router.layer(from_fn_with_state(
                Arc::clone(guard),
                middleware::require_api_key,
            ));
        }
        if let Some(limiter) = &self.rate_limiter {
            router = router.layer(from_fn_with_state(
                Arc::clone(limiter),
                middleware::enforce_rate_limit,
            ));
        }
        router
    }
}

/// Builder for constructing the main HTTP router
pub struct RouterBuilder {
    router: Router,
}

impl RouterBuilder {
    /// Create a new router builder
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Add a route to the router
    pub fn route(mut self, path: &str, route: MethodRouter) -> Self {
        self.router = self.router.route(path, route);
        self
    }

    /// Mount a module's router at the root and again under `base_path`
    pub fn mount_module(mut self, base_path: &str, module_router: Router) -> Self {
        self.router = self.router.merge(module_router.clone());
        if let Some(prefix) = normalize_base_path(base_path) {
            self.router = self.router.nest(&prefix, module_router);
        }
        self
    }

    /// Add timeout middleware
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.router = self
            .router
            .layer(TimeoutLayer::new(Duration::from_millis(timeout_ms)));
        self
    }

    /// Turn handler panics into 500 responses
    pub fn with_catch_panic(mut self) -> Self {
        self.router = self
            .router
            .layer(CatchPanicLayer::custom(middleware::handle_panic));
        self
    }

    /// Render every error response in the shared JSON shape
    pub fn with_error_normalization(mut self) -> Self {
        self.router = self.router.layer(from_fn(middleware::normalize_errors));
        self
    }

    /// Add the fixed set of security response headers
    pub fn with_security_headers(mut self) -> Self {
        self.router = self
            .router
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::X_FRAME_OPTIONS,
                HeaderValue::from_static("DENY"),
            ))
            .layer(SetResponseHeaderLayer::if_not_present(
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ));
        self
    }

    /// Add CORS middleware configured from settings
    pub fn with_cors(mut self, settings: &CorsSettings) -> anyhow::Result<Self> {
        self.router = self.router.layer(cors_layer(settings)?);
        Ok(self)
    }

    /// Add tracing middleware; the request span carries the request id
    pub fn with_tracing(mut self) -> Self {
        self.router = self.router.layer(
            TraceLayer::new_for_http()
                .make_span_with(middleware::make_request_span)
                .on_response(DefaultOnResponse::new().level(tracing::Level::INFO)),
        );
        self
    }

    /// Assign (or keep) `X-Request-ID` and echo it on the response
    pub fn with_request_id(mut self) -> Self {
        let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
        self.router = self
            .router
            .layer(PropagateRequestIdLayer::new(header_name.clone()))
            .layer(SetRequestIdLayer::new(header_name, MakeRequestUuidV7));
        self
    }

    /// Add OpenAPI documentation by collecting specs from all modules
    pub fn with_openapi(mut self, registry: &ModuleRegistry, api: &ApiSettings) -> Self {
        let openapi_spec = merged_openapi(registry, api);

        // Deserialize our JSON spec into a proper utoipa OpenApi object
        // so SwaggerUI can serve it
        let openapi_obj: utoipa::openapi::OpenApi = serde_json::from_value(openapi_spec)
            .unwrap_or_else(|error| {
                tracing::warn!(%error, "merged OpenAPI document is invalid; serving a bare one");
                utoipa::openapi::OpenApiBuilder::new()
                    .info(
                        utoipa::openapi::InfoBuilder::new()
                            .title("Bookshelf API")
                            .version(env!("CARGO_PKG_VERSION"))
                            .build(),
                    )
                    .build()
            });

        self.router = self.router.merge(
            utoipa_swagger_ui::SwaggerUi::new(api.docs_path.clone())
                .url("/api-docs/openapi.json", openapi_obj),
        );
        self.with_docs_redirect(&api.docs_path)
    }

    /// `GET /docs` answers 302 to the Swagger UI index
    fn with_docs_redirect(mut self, docs_path: &str) -> Self {
        let target = format!("{}/", docs_path.trim_end_matches('/'));
        if target == "/docs/" {
            return self;
        }
        let location = match HeaderValue::from_str(&target) {
            Ok(location) => location,
            Err(error) => {
                tracing::warn!(%error, docs_path, "docs path is not a valid Location; skipping /docs redirect");
                return self;
            }
        };

        self.router = self.router.route(
            "/docs",
            get(move || {
                let location = location.clone();
                async move { (StatusCode::FOUND, [(header::LOCATION, location)]) }
            }),
        );
        self
    }

    /// Build the final router
    pub fn build(self) -> Router {
        self.router
    }
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `/api/v1/` → `/api/v1`; empty and `/` mean "root only".
fn normalize_base_path(base_path: &str) -> Option<String> {
    let trimmed = base_path.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('/') {
        Some(trimmed.to_string())
    } else {
        Some(format!("/{trimmed}"))
    }
}

fn cors_layer(settings: &CorsSettings) -> anyhow::Result<CorsLayer> {
    let wildcard = |values: &[String]| values.iter().any(|value| value.trim() == "*");

    let origins = if wildcard(&settings.allowed_origins) {
        AllowOrigin::any()
    } else {
        let origins = settings
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .with_context(|| format!("invalid CORS origin '{origin}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    let methods = if wildcard(&settings.allowed_methods) {
        AllowMethods::any()
    } else {
        let methods = settings
            .allowed_methods
            .iter()
            .map(|method| {
                Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
                    .with_context(|| format!("invalid CORS method '{method}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowMethods::list(methods)
    };

    let headers = if wildcard(&settings.allowed_headers) {
        AllowHeaders::any()
    } else {
        let headers = settings
            .allowed_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.trim().as_bytes())
                    .with_context(|| format!("invalid CORS header '{name}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowHeaders::list(headers)
    };

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(methods)
        .allow_headers(headers)
        .expose_headers([HeaderName::from_static(REQUEST_ID_HEADER)]))
}

fn merged_openapi(registry: &ModuleRegistry, api: &ApiSettings) -> serde_json::Value {
    let prefix = normalize_base_path(&api.base_path).unwrap_or_default();

    let mut openapi_spec = serde_json::json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Bookshelf API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "CRUD service for a catalogue of books"
        },
        "paths": {},
        "components": {
            "schemas": {}
        }
    });

    openapi_spec["components"]["schemas"]["ErrorResponse"] = serde_json::json!({
        "type": "object",
        "properties": {
            "error": { "type": "string", "example": "VALIDATION_ERROR" },
            "message": { "type": "string" },
            "request_id": { "type": "string" },
            "code": { "type": "integer" }
        },
        "required": ["error", "message", "request_id", "code"]
    });

    openapi_spec["paths"]["/health"] = serde_json::json!({
        "get": {
            "summary": "Health check",
            "responses": {
                "200": {
                    "description": "Service is up",
                    "content": {
                        "application/json": {
                            "schema": {
                                "type": "object",
                                "properties": { "status": { "type": "string", "example": "OK" } }
                            }
                        }
                    }
                }
            }
        }
    });

    for module in registry.modules() {
        let Some(module_spec) = module.openapi() else {
            continue;
        };

        if let Some(paths) = module_spec.get("paths").and_then(|paths| paths.as_object()) {
            for (path, path_item) in paths {
                openapi_spec["paths"][format!("{prefix}{path}")] = path_item.clone();
            }
        }

        if let Some(schemas) = module_spec
            .get("components")
            .and_then(|components| components.get("schemas"))
            .and_then(|schemas| schemas.as_object())
        {
            for (schema_name, schema_def) in schemas {
                openapi_spec["components"]["schemas"][schema_name] = schema_def.clone();
            }
        }
    }

    openapi_spec
}
