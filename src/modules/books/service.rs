//! Book use cases: validation in front of the repository, plus the
//! operation log.

use async_trait::async_trait;
use uuid::Uuid;

use super::error::{BookError, BookErrorKind};
use super::models::{Book, CreateBook, UpdateBook};
use super::repository::BookRepository;

/// Application-level book operations consumed by the HTTP handlers.
#[async_trait]
pub trait BookService: Send + Sync {
    async fn create_book(&self, request: CreateBook) -> Result<Book, BookError>;

    async fn get_book(&self, id: Uuid) -> Result<Book, BookError>;

    /// Every book, newest first.
    async fn list_books(&self) -> Result<Vec<Book>, BookError>;

    async fn update_book(&self, id: Uuid, request: UpdateBook) -> Result<Book, BookError>;

    async fn delete_book(&self, id: Uuid) -> Result<(), BookError>;
}

/// [`BookService`] over any [`BookRepository`].
pub struct BookUseCase<R> {
    repository: R,
}

impl<R: BookRepository> BookUseCase<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

/// Log a failed operation at a level matching how surprising it is.
fn log_failure(operation: &'static str, id: Option<Uuid>, error: &BookError) {
    match error.kind() {
        BookErrorKind::Database => {
            tracing::error!(operation, book_id = ?id, error = ?error, "book operation failed");
        }
        BookErrorKind::BookNotFound => {
            tracing::warn!(operation, book_id = ?id, "book not found");
        }
        _ => {
            tracing::warn!(operation, book_id = ?id, reason = %error, "book request rejected");
        }
    }
}

#[async_trait]
impl<R: BookRepository> BookService for BookUseCase<R> {
    async fn create_book(&self, request: CreateBook) -> Result<Book, BookError> {
        if let Err(error) = request.validate() {
            log_failure("create_book", None, &error);
            return Err(error);
        }

        let book = self
            .repository
            .create(request.to_entity())
            .await
            .inspect_err(|error| log_failure("create_book", None, error))?;

        tracing::info!(book_id = %book.id, title = %book.title, "book created");
        Ok(book)
    }

    async fn get_book(&self, id: Uuid) -> Result<Book, BookError> {
        let book = self
            .repository
            .find_by_id(id)
            .await
            .inspect_err(|error| log_failure("get_book", Some(id), error))?;

        tracing::debug!(book_id = %id, "book retrieved");
        Ok(book)
    }

    async fn list_books(&self) -> Result<Vec<Book>, BookError> {
        let books = self
            .repository
            .find_all()
            .await
            .inspect_err(|error| log_failure("list_books", None, error))?;

        tracing::debug!(count = books.len(), "books listed");
        Ok(books)
    }

    async fn update_book(&self, id: Uuid, request: UpdateBook) -> Result<Book, BookError> {
        if let Err(error) = request.validate() {
            log_failure("update_book", Some(id), &error);
            return Err(error);
        }

        let book = self
            .repository
            .update(id, request.trimmed())
            .await
            .inspect_err(|error| log_failure("update_book", Some(id), error))?;

        tracing::info!(book_id = %id, "book updated");
        Ok(book)
    }

    async fn delete_book(&self, id: Uuid) -> Result<(), BookError> {
        self.repository
            .delete(id)
            .await
            .inspect_err(|error| log_failure("delete_book", Some(id), error))?;

        tracing::info!(book_id = %id, "book deleted");
        Ok(())
    }
}
