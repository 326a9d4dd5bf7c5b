//! Books module: a CRUD catalogue of books backed by PostgreSQL.

pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod repository;
pub mod service;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use bookshelf_kernel::{InitCtx, Migration, Module};
use sqlx::PgPool;

pub use error::{BookError, BookErrorKind};
pub use memory::InMemoryBookRepository;
pub use models::{Book, BookChanges, CreateBook, NewBook, UpdateBook};
pub use repository::{BookRepository, PgBookRepository};
pub use service::{BookService, BookUseCase};

use handlers::SharedBookService;

/// Books module wiring the HTTP handlers to a [`BookService`].
pub struct BooksModule {
    service: SharedBookService,
}

impl BooksModule {
    pub fn new(service: SharedBookService) -> Self {
        Self { service }
    }

    /// Module backed by the PostgreSQL repository
    pub fn with_postgres(pool: PgPool) -> Self {
        Self::new(Arc::new(BookUseCase::new(PgBookRepository::new(pool))))
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route(
                "/books",
                get(handlers::list_books).post(handlers::create_book),
            )
            .route(
                "/books/{id}",
                get(handlers::get_book)
                    .put(handlers::update_book)
                    .delete(handlers::delete_book),
            )
            .with_state(Arc::clone(&self.service))
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        Some(openapi_fragment())
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE IF NOT EXISTS books (
                    id         UUID PRIMARY KEY,
                    title      VARCHAR(255) NOT NULL CHECK (btrim(title) <> ''),
                    author     VARCHAR(255) NOT NULL CHECK (btrim(author) <> ''),
                    year       INTEGER NOT NULL CHECK (year BETWEEN 1000 AND 2034),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS books_created_at_idx ON books (created_at DESC);
                "#,
        }]
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

fn error_responses(codes: &[(&str, &str)]) -> serde_json::Map<String, serde_json::Value> {
    codes
        .iter()
        .map(|(code, description)| {
            (
                (*code).to_string(),
                serde_json::json!({
                    "description": description,
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/ErrorResponse" }
                        }
                    }
                }),
            )
        })
        .collect()
}

fn with_errors(
    mut responses: serde_json::Value,
    codes: &[(&str, &str)],
) -> serde_json::Value {
    if let Some(map) = responses.as_object_mut() {
        map.extend(error_responses(codes));
    }
    responses
}

fn openapi_fragment() -> serde_json::Value {
    let book_response = |description: &str| {
        serde_json::json!({
            "description": description,
            "content": {
                "application/json": {
                    "schema": { "$ref": "#/components/schemas/Book" }
                }
            }
        })
    };
    let book_body = serde_json::json!({
        "required": true,
        "content": {
            "application/json": {
                "schema": { "$ref": "#/components/schemas/CreateBook" }
            }
        }
    });
    let id_parameter = serde_json::json!([{
        "name": "id",
        "in": "path",
        "required": true,
        "schema": { "type": "string", "format": "uuid" }
    }]);

    serde_json::json!({
        "paths": {
            "/books": {
                "get": {
                    "summary": "List books, newest first",
                    "tags": ["Books"],
                    "responses": with_errors(
                        serde_json::json!({
                            "200": {
                                "description": "All books",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/Book" }
                                        }
                                    }
                                }
                            }
                        }),
                        &[("500", "Internal server error")],
                    )
                },
                "post": {
                    "summary": "Create a book",
                    "tags": ["Books"],
                    "requestBody": book_body.clone(),
                    "responses": with_errors(
                        serde_json::json!({ "201": book_response("Book created") }),
                        &[("400", "Invalid request"), ("500", "Internal server error")],
                    )
                }
            },
            "/books/{id}": {
                "get": {
                    "summary": "Get a book by id",
                    "tags": ["Books"],
                    "parameters": id_parameter.clone(),
                    "responses": with_errors(
                        serde_json::json!({ "200": book_response("The book") }),
                        &[("400", "Invalid id"), ("404", "Book not found"), ("500", "Internal server error")],
                    )
                },
                "put": {
                    "summary": "Replace a book's title, author and year",
                    "tags": ["Books"],
                    "parameters": id_parameter.clone(),
                    "requestBody": book_body,
                    "responses": with_errors(
                        serde_json::json!({ "200": book_response("Book updated") }),
                        &[("400", "Invalid request"), ("404", "Book not found"), ("500", "Internal server error")],
                    )
                },
                "delete": {
                    "summary": "Delete a book",
                    "tags": ["Books"],
                    "parameters": id_parameter,
                    "responses": with_errors(
                        serde_json::json!({
                            "200": {
                                "description": "Book deleted",
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "object",
                                            "properties": { "message": { "type": "string" } },
                                            "required": ["message"]
                                        }
                                    }
                                }
                            }
                        }),
                        &[("400", "Invalid id"), ("404", "Book not found"), ("500", "Internal server error")],
                    )
                }
            }
        },
        "components": {
            "schemas": {
                "Book": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string", "format": "uuid" },
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "year": { "type": "integer", "minimum": models::MIN_YEAR, "maximum": models::MAX_YEAR },
                        "created_at": { "type": "string", "format": "date-time" },
                        "updated_at": { "type": "string", "format": "date-time" }
                    },
                    "required": ["id", "title", "author", "year", "created_at", "updated_at"]
                },
                "CreateBook": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "author": { "type": "string" },
                        "year": { "type": "integer", "minimum": models::MIN_YEAR, "maximum": models::MAX_YEAR }
                    },
                    "required": ["title", "author", "year"]
                }
            }
        }
    })
}

/// Create a new instance of the books module
pub fn create_module(service: SharedBookService) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(service))
}
