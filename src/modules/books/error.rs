//! Book domain errors and their mapping onto HTTP responses.

use bookshelf_http::AppError;
use thiserror::Error;

/// Failures surfaced by the books use cases.
///
/// Equality compares kinds only: two `Database` errors are equal whatever
/// their underlying cause.
#[derive(Debug, Error)]
pub enum BookError {
    #[error("Book title is required and cannot be empty")]
    InvalidTitle,

    #[error("Book author is required and cannot be empty")]
    InvalidAuthor,

    #[error("Publication year must be between 1000 and 2034")]
    InvalidYear,

    #[error("Invalid UUID format provided")]
    InvalidIdentifier,

    #[error("The requested book could not be found")]
    BookNotFound,

    #[error("book storage operation failed")]
    Database(#[source] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BookErrorKind {
    InvalidTitle,
    InvalidAuthor,
    InvalidYear,
    InvalidIdentifier,
    BookNotFound,
    Database,
}

impl BookError {
    pub fn kind(&self) -> BookErrorKind {
        match self {
            BookError::InvalidTitle => BookErrorKind::InvalidTitle,
            BookError::InvalidAuthor => BookErrorKind::InvalidAuthor,
            BookError::InvalidYear => BookErrorKind::InvalidYear,
            BookError::InvalidIdentifier => BookErrorKind::InvalidIdentifier,
            BookError::BookNotFound => BookErrorKind::BookNotFound,
            BookError::Database(_) => BookErrorKind::Database,
        }
    }

    /// Input was rejected before reaching storage
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            BookErrorKind::InvalidTitle
                | BookErrorKind::InvalidAuthor
                | BookErrorKind::InvalidYear
                | BookErrorKind::InvalidIdentifier
        )
    }
}

impl PartialEq for BookError {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for BookError {}

impl From<sqlx::Error> for BookError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => BookError::BookNotFound,
            other => BookError::Database(anyhow::Error::new(other)),
        }
    }
}

impl From<BookError> for AppError {
    fn from(error: BookError) -> Self {
        match error {
            BookError::InvalidTitle
            | BookError::InvalidAuthor
            | BookError::InvalidYear
            | BookError::InvalidIdentifier => AppError::validation(error.to_string()),
            BookError::BookNotFound => AppError::not_found(error.to_string()),
            BookError::Database(source) => {
                AppError::Internal(source.context("book storage operation failed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn equality_compares_kinds() {
        assert_eq!(BookError::InvalidTitle, BookError::InvalidTitle);
        assert_ne!(BookError::InvalidTitle, BookError::InvalidAuthor);
        assert_eq!(
            BookError::Database(anyhow::anyhow!("connection reset")),
            BookError::Database(anyhow::anyhow!("disk full")),
        );
    }

    #[test]
    fn row_not_found_means_book_not_found() {
        assert_eq!(BookError::from(sqlx::Error::RowNotFound), BookError::BookNotFound);
        assert_eq!(
            BookError::from(sqlx::Error::PoolTimedOut).kind(),
            BookErrorKind::Database
        );
    }

    #[test]
    fn maps_onto_http_errors() {
        let cases = [
            (BookError::InvalidTitle, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (BookError::InvalidYear, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (BookError::InvalidIdentifier, StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (BookError::BookNotFound, StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                BookError::Database(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (error, status, kind) in cases {
            let app_error = AppError::from(error);
            assert_eq!(app_error.status(), status);
            assert_eq!(app_error.kind(), kind);
        }
    }

    #[test]
    fn validation_classification() {
        assert!(BookError::InvalidIdentifier.is_validation());
        assert!(!BookError::BookNotFound.is_validation());
        assert!(!BookError::Database(anyhow::anyhow!("x")).is_validation());
    }
}
