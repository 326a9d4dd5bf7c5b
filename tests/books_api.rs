//! End-to-end HTTP tests against the fully layered router, with the books
//! module backed by the in-memory repository.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use bookshelf_app::books::{self, BookUseCase, InMemoryBookRepository};
use bookshelf_kernel::{ModuleRegistry, Settings};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    repository: Arc<InMemoryBookRepository>,
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

impl TestApp {
    fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    fn with_settings(settings: Settings) -> Self {
        let repository = Arc::new(InMemoryBookRepository::new());
        let service = Arc::new(BookUseCase::new(Arc::clone(&repository)));

        let mut registry = ModuleRegistry::new();
        registry.register_custom(books::create_module(service));

        let router = bookshelf_http::build_router(&registry, &settings).unwrap();
        Self { router, repository }
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        TestResponse {
            status,
            headers,
            body,
        }
    }

    async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
        self.send(request(method, uri, body)).await
    }
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn assert_error(response: &TestResponse, status: StatusCode, kind: &str) {
    assert_eq!(response.status, status, "body: {}", response.body);
    assert_eq!(response.body["error"], kind, "body: {}", response.body);
    assert_eq!(response.body["code"], status.as_u16());

    let request_id = response.headers["x-request-id"].to_str().unwrap();
    assert!(!request_id.is_empty());
    assert_eq!(response.body["request_id"], request_id);
}

#[tokio::test]
async fn book_lifecycle() {
    let app = TestApp::new();

    let created = app
        .call(
            Method::POST,
            "/books",
            Some(json!({ "title": "Clean Code", "author": "Robert C. Martin", "year": 2008 })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_str().unwrap().to_string();
    assert_eq!(created.body["title"], "Clean Code");
    assert_eq!(created.body["created_at"], created.body["updated_at"]);

    let fetched = app.call(Method::GET, &format!("/books/{id}"), None).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body, created.body);

    let updated = app
        .call(
            Method::PUT,
            &format!("/books/{id}"),
            Some(json!({ "title": "Clean Code (2nd ed)", "author": "Robert C. Martin", "year": 2024 })),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["id"], id.as_str());
    assert_eq!(updated.body["title"], "Clean Code (2nd ed)");
    assert_eq!(updated.body["year"], 2024);
    assert_eq!(updated.body["created_at"], created.body["created_at"]);
    assert_ne!(updated.body["updated_at"], created.body["updated_at"]);

    let deleted = app.call(Method::DELETE, &format!("/books/{id}"), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body, json!({ "message": "Book deleted successfully" }));

    let gone = app.call(Method::GET, &format!("/books/{id}"), None).await;
    assert_error(&gone, StatusCode::NOT_FOUND, "NOT_FOUND");
    assert_eq!(gone.body["message"], "The requested book could not be found");
}

#[tokio::test]
async fn routes_are_also_served_under_base_path() {
    let app = TestApp::new();

    let created = app
        .call(
            Method::POST,
            "/api/v1/books",
            Some(json!({ "title": "Dune", "author": "Frank Herbert", "year": 1965 })),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);

    let listed = app.call(Method::GET, "/books", None).await;
    assert_eq!(listed.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn list_is_newest_first() {
    let app = TestApp::new();
    assert_eq!(app.call(Method::GET, "/books", None).await.body, json!([]));

    for title in ["first", "second", "third"] {
        let response = app
            .call(
                Method::POST,
                "/books",
                Some(json!({ "title": title, "author": "A", "year": 2000 })),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED);
    }

    let listed = app.call(Method::GET, "/books", None).await;
    let titles: Vec<&str> = listed
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["third", "second", "first"]);
}

#[tokio::test]
async fn empty_title_is_rejected_without_storing() {
    let app = TestApp::new();

    let response = app
        .call(
            Method::POST,
            "/books",
            Some(json!({ "title": "", "author": "X", "year": 2000 })),
        )
        .await;

    assert_error(&response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    assert_eq!(
        response.body["message"],
        "Book title is required and cannot be empty"
    );
    assert!(app.repository.is_empty());
}

#[tokio::test]
async fn validation_messages_follow_field_order() {
    let app = TestApp::new();

    let cases = [
        (json!({ "author": "X", "year": 2000 }), "Book title is required and cannot be empty"),
        (json!({ "title": "T", "author": "  ", "year": 2000 }), "Book author is required and cannot be empty"),
        (json!({ "title": "T", "author": "A", "year": 999 }), "Publication year must be between 1000 and 2034"),
        (json!({ "title": "T", "author": "A", "year": 2035 }), "Publication year must be between 1000 and 2034"),
    ];

    for (body, message) in cases {
        let response = app.call(Method::POST, "/books", Some(body)).await;
        assert_error(&response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
        assert_eq!(response.body["message"], message);
    }
    assert!(app.repository.is_empty());
}

#[tokio::test]
async fn years_beyond_i32_are_validation_errors() {
    let app = TestApp::new();
    let body = json!({ "title": "T", "author": "A", "year": 3000000000_i64 });

    let created = app.call(Method::POST, "/books", Some(body.clone())).await;
    assert_error(&created, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    assert_eq!(created.body["message"], "Publication year must be between 1000 and 2034");
    assert!(app.repository.is_empty());

    let book = app
        .call(
            Method::POST,
            "/books",
            Some(json!({ "title": "Dune", "author": "Frank Herbert", "year": 1965 })),
        )
        .await;
    assert_eq!(book.status, StatusCode::CREATED);
    let id = book.body["id"].as_str().unwrap();

    let updated = app.call(Method::PUT, &format!("/books/{id}"), Some(body)).await;
    assert_error(&updated, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
    assert_eq!(updated.body["message"], "Publication year must be between 1000 and 2034");

    let stored = app.call(Method::GET, &format!("/books/{id}"), None).await;
    assert_eq!(stored.body["year"], 1965);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let app = TestApp::new();

    let broken_json = Request::builder()
        .method(Method::POST)
        .uri("/books")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    assert_error(&app.send(broken_json).await, StatusCode::BAD_REQUEST, "BAD_REQUEST");

    let wrong_type = app
        .call(
            Method::POST,
            "/books",
            Some(json!({ "title": "T", "author": "A", "year": "nineteen" })),
        )
        .await;
    assert_error(&wrong_type, StatusCode::BAD_REQUEST, "BAD_REQUEST");

    let no_content_type = Request::builder()
        .method(Method::POST)
        .uri("/books")
        .body(Body::from(json!({ "title": "T", "author": "A", "year": 2000 }).to_string()))
        .unwrap();
    assert_error(&app.send(no_content_type).await, StatusCode::BAD_REQUEST, "BAD_REQUEST");

    assert!(app.repository.is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = TestApp::new();
    let huge_title = "x".repeat(2 * 1024 * 1024);

    let response = app
        .call(
            Method::POST,
            "/books",
            Some(json!({ "title": huge_title, "author": "A", "year": 2000 })),
        )
        .await;
    assert!(response.status.is_client_error());
    assert!(app.repository.is_empty());
}

#[tokio::test]
async fn malformed_ids_are_validation_errors() {
    let app = TestApp::new();

    for uri in ["/books/not-a-uuid", "/books/123", "/books/0191c7f2b1e47a3c9d5e8f0a1b2c3d4e"] {
        for method in [Method::GET, Method::DELETE] {
            let response = app.call(method.clone(), uri, None).await;
            assert_error(&response, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
            assert_eq!(response.body["message"], "Invalid UUID format provided");
        }
    }

    let update = app
        .call(
            Method::PUT,
            "/books/not-a-uuid",
            Some(json!({ "title": "T", "author": "A", "year": 2000 })),
        )
        .await;
    assert_error(&update, StatusCode::BAD_REQUEST, "VALIDATION_ERROR");
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = TestApp::new();
    let id = uuid::Uuid::now_v7();

    let update = app
        .call(
            Method::PUT,
            &format!("/books/{id}"),
            Some(json!({ "title": "T", "author": "A", "year": 2000 })),
        )
        .await;
    assert_error(&update, StatusCode::NOT_FOUND, "NOT_FOUND");

    let delete = app.call(Method::DELETE, &format!("/books/{id}"), None).await;
    assert_error(&delete, StatusCode::NOT_FOUND, "NOT_FOUND");
}

#[tokio::test]
async fn request_id_is_echoed_into_errors() {
    let app = TestApp::new();

    let request = Request::builder()
        .uri(format!("/books/{}", uuid::Uuid::now_v7()))
        .header("X-Request-ID", "trace-me-123")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.headers["x-request-id"], "trace-me-123");
    assert_eq!(response.body["request_id"], "trace-me-123");
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let app = TestApp::new();
    let response = app.call(Method::GET, "/books", None).await;

    let request_id = response.headers["x-request-id"].to_str().unwrap();
    assert_eq!(uuid::Uuid::parse_str(request_id).unwrap().get_version_num(), 7);
}

#[tokio::test]
async fn framework_errors_share_the_error_shape() {
    let app = TestApp::new();

    let missing = app.call(Method::GET, "/no/such/route", None).await;
    assert_error(&missing, StatusCode::NOT_FOUND, "HTTP_ERROR");

    let not_allowed = app.call(Method::PATCH, "/books", None).await;
    assert_error(&not_allowed, StatusCode::METHOD_NOT_ALLOWED, "HTTP_ERROR");
}

#[tokio::test]
async fn health_reports_ok_with_security_headers() {
    let app = TestApp::new();
    let response = app.call(Method::GET, "/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "status": "OK" }));
    assert_eq!(response.headers["x-content-type-options"], "nosniff");
    assert_eq!(response.headers["x-frame-options"], "DENY");
    assert_eq!(
        response.headers["referrer-policy"],
        "strict-origin-when-cross-origin"
    );
}

#[tokio::test]
async fn api_key_guards_module_routes_only() {
    let mut settings = Settings::default();
    settings.security.enable_api_key = true;
    settings.security.allowed_api_keys = vec!["letmein-0123456789".to_string()];
    let app = TestApp::with_settings(settings);

    let missing = app.call(Method::GET, "/books", None).await;
    assert_error(&missing, StatusCode::UNAUTHORIZED, "UNAUTHORIZED");
    assert_eq!(missing.body["message"], "API key required");

    let wrong = Request::builder()
        .uri("/api/v1/books")
        .header("X-API-Key", "guess")
        .body(Body::empty())
        .unwrap();
    let wrong = app.send(wrong).await;
    assert_error(&wrong, StatusCode::UNAUTHORIZED, "UNAUTHORIZED");
    assert_eq!(wrong.body["message"], "Invalid API key");

    let allowed = Request::builder()
        .uri("/books")
        .header("X-API-Key", "letmein-0123456789")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(allowed).await.status, StatusCode::OK);

    let health = app.call(Method::GET, "/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_rejects_after_burst() {
    let mut settings = Settings::default();
    settings.security.rate_limit_rps = 0;
    settings.security.rate_limit_burst = 2;
    let app = TestApp::with_settings(settings);

    for _ in 0..2 {
        assert_eq!(app.call(Method::GET, "/books", None).await.status, StatusCode::OK);
    }

    let limited = app.call(Method::GET, "/books", None).await;
    assert_error(&limited, StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED");
    assert!(limited.headers.contains_key(header::RETRY_AFTER));

    let health = app.call(Method::GET, "/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn rate_limit_can_be_disabled() {
    let mut settings = Settings::default();
    settings.security.enable_rate_limit = false;
    settings.security.rate_limit_rps = 0;
    settings.security.rate_limit_burst = 1;
    let app = TestApp::with_settings(settings);

    for _ in 0..5 {
        assert_eq!(app.call(Method::GET, "/books", None).await.status, StatusCode::OK);
    }
}

#[tokio::test]
async fn openapi_document_lists_book_routes() {
    let app = TestApp::new();
    let response = app.call(Method::GET, "/api-docs/openapi.json", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["paths"]["/api/v1/books"].is_object());
    assert!(response.body["paths"]["/api/v1/books/{id}"].is_object());
    assert!(response.body["paths"]["/health"].is_object());
    assert!(response.body["components"]["schemas"]["Book"].is_object());
}

#[tokio::test]
async fn docs_can_be_disabled() {
    let mut settings = Settings::default();
    settings.api.enable_docs = false;
    let app = TestApp::with_settings(settings);

    let response = app.call(Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let redirect = app.call(Method::GET, "/docs", None).await;
    assert_eq!(redirect.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn docs_shortcut_redirects_to_swagger_ui() {
    let app = TestApp::new();
    let response = app.call(Method::GET, "/docs", None).await;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(response.headers[header::LOCATION], "/swagger-ui/");
}
