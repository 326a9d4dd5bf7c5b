use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use bookshelf_http::AppError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::BookError;
use super::models::{Book, CreateBook, UpdateBook};
use super::service::BookService;

/// Handler state: the use cases behind a trait object.
pub type SharedBookService = Arc<dyn BookService>;

/// Body returned by a successful delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Accept only the 36-character hyphenated UUID form.
pub fn parse_book_id(raw: &str) -> Result<Uuid, BookError> {
    if raw.len() != 36 {
        return Err(BookError::InvalidIdentifier);
    }
    Uuid::try_parse(raw).map_err(|_| BookError::InvalidIdentifier)
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

pub async fn list_books(
    State(service): State<SharedBookService>,
) -> Result<Json<Vec<Book>>, AppError> {
    let books = service.list_books().await?;
    Ok(Json(books))
}

pub async fn create_book(
    State(service): State<SharedBookService>,
    payload: Result<Json<CreateBook>, JsonRejection>,
) -> Result<(StatusCode, Json<Book>), AppError> {
    let request = body(payload)?;
    let book = service.create_book(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn get_book(
    State(service): State<SharedBookService>,
    Path(id): Path<String>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&id)?;
    let book = service.get_book(id).await?;
    Ok(Json(book))
}

pub async fn update_book(
    State(service): State<SharedBookService>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateBook>, JsonRejection>,
) -> Result<Json<Book>, AppError> {
    let id = parse_book_id(&id)?;
    let request = body(payload)?;
    let book = service.update_book(id, request).await?;
    Ok(Json(book))
}

pub async fn delete_book(
    State(service): State<SharedBookService>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let id = parse_book_id(&id)?;
    service.delete_book(id).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted successfully".to_string(),
    }))
}
