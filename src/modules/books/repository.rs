//! Storage access for books.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::error::BookError;
use super::models::{Book, BookChanges, NewBook};

/// Persistence gateway for books. Every write is a single statement.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Insert a new book; the store assigns both timestamps.
    async fn create(&self, book: NewBook) -> Result<Book, BookError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Book, BookError>;

    /// All books, newest first.
    async fn find_all(&self) -> Result<Vec<Book>, BookError>;

    /// Replace title, author and year, refreshing `updated_at`.
    async fn update(&self, id: Uuid, changes: BookChanges) -> Result<Book, BookError>;

    async fn delete(&self, id: Uuid) -> Result<(), BookError>;
}

#[async_trait]
impl<T: BookRepository + ?Sized> BookRepository for Arc<T> {
    async fn create(&self, book: NewBook) -> Result<Book, BookError> {
        (**self).create(book).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Book, BookError> {
        (**self).find_by_id(id).await
    }

    async fn find_all(&self) -> Result<Vec<Book>, BookError> {
        (**self).find_all().await
    }

    async fn update(&self, id: Uuid, changes: BookChanges) -> Result<Book, BookError> {
        (**self).update(id, changes).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookError> {
        (**self).delete(id).await
    }
}

/// PostgreSQL-backed repository over the `books` table.
#[derive(Clone)]
pub struct PgBookRepository {
    pool: PgPool,
}

impl PgBookRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn create(&self, book: NewBook) -> Result<Book, BookError> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (id, title, author, year)
            VALUES ($1, $2, $3, $4)
            RETURNING id, title, author, year, created_at, updated_at
            "#,
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| BookError::Database(anyhow::Error::new(error)))?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Book, BookError> {
        sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, year, created_at, updated_at
            FROM books
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BookError::BookNotFound)
    }

    async fn find_all(&self) -> Result<Vec<Book>, BookError> {
        let books = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, year, created_at, updated_at
            FROM books
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn update(&self, id: Uuid, changes: BookChanges) -> Result<Book, BookError> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET title = $2, author = $3, year = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, title, author, year, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.author)
        .bind(changes.year)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BookError::BookNotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookError> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookError::BookNotFound);
        }
        Ok(())
    }
}
