//! In-process book store with the same observable behaviour as the
//! PostgreSQL repository.

use async_trait::async_trait;
use parking_lot::RwLock;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use super::error::BookError;
use super::models::{Book, BookChanges, NewBook};
use super::repository::BookRepository;

/// Books kept in insertion order behind a read-write lock.
#[derive(Debug, Default)]
pub struct InMemoryBookRepository {
    books: RwLock<Vec<Book>>,
}

impl InMemoryBookRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.books.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.read().is_empty()
    }
}

#[async_trait]
impl BookRepository for InMemoryBookRepository {
    async fn create(&self, book: NewBook) -> Result<Book, BookError> {
        let now = OffsetDateTime::now_utc();
        let stored = Book {
            id: book.id,
            title: book.title,
            author: book.author,
            year: book.year,
            created_at: now,
            updated_at: now,
        };

        let mut books = self.books.write();
        if books.iter().any(|existing| existing.id == stored.id) {
            return Err(BookError::Database(anyhow::anyhow!(
                "duplicate book id {}",
                stored.id
            )));
        }
        books.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Book, BookError> {
        self.books
            .read()
            .iter()
            .find(|book| book.id == id)
            .cloned()
            .ok_or(BookError::BookNotFound)
    }

    async fn find_all(&self) -> Result<Vec<Book>, BookError> {
        // Latest insertion first, so equal timestamps keep newest-first order.
        let mut books: Vec<Book> = self.books.read().iter().rev().cloned().collect();
        books.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(books)
    }

    async fn update(&self, id: Uuid, changes: BookChanges) -> Result<Book, BookError> {
        let mut books = self.books.write();
        let book = books
            .iter_mut()
            .find(|book| book.id == id)
            .ok_or(BookError::BookNotFound)?;

        // updated_at must move forward even when the clock has not ticked.
        let now = OffsetDateTime::now_utc();
        let floor = book.updated_at + Duration::microseconds(1);

        book.title = changes.title;
        book.author = changes.author;
        book.year = changes.year;
        book.updated_at = now.max(floor);
        Ok(book.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookError> {
        let mut books = self.books.write();
        let before = books.len();
        books.retain(|book| book.id != id);

        if books.len() == before {
            return Err(BookError::BookNotFound);
        }
        Ok(())
    }
}
