use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::BookError;

/// Earliest accepted publication year
pub const MIN_YEAR: i32 = 1000;
/// Latest accepted publication year
pub const MAX_YEAR: i32 = 2034;

/// A stored book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Book {
    /// Unique identifier for the book, assigned at creation
    pub id: Uuid,
    /// Title of the book
    pub title: String,
    /// Author of the book
    pub author: String,
    /// Publication year
    pub year: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Request model for creating a new book.
///
/// Missing fields deserialize to empty values so they are reported by
/// [`CreateBook::validate`] rather than by the JSON parser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateBook {
    pub title: String,
    pub author: String,
    /// Wider than the stored column so out-of-range numbers reach validation
    pub year: i64,
}

/// Request model for replacing a book's fields. Same shape and rules as
/// [`CreateBook`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateBook {
    pub title: String,
    pub author: String,
    pub year: i64,
}

/// A validated book ready to be inserted. Timestamps are assigned by the
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub year: i32,
}

/// Validated replacement values for an existing book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookChanges {
    pub title: String,
    pub author: String,
    pub year: i32,
}

/// Title, then author, then year; the first failure wins.
fn validate_fields(title: &str, author: &str, year: i64) -> Result<(), BookError> {
    if title.trim().is_empty() {
        return Err(BookError::InvalidTitle);
    }
    if author.trim().is_empty() {
        return Err(BookError::InvalidAuthor);
    }
    if !(i64::from(MIN_YEAR)..=i64::from(MAX_YEAR)).contains(&year) {
        return Err(BookError::InvalidYear);
    }
    Ok(())
}

/// Narrow a validated year to the stored width. Lossless inside
/// `MIN_YEAR..=MAX_YEAR`.
fn stored_year(year: i64) -> i32 {
    year.clamp(i64::from(MIN_YEAR), i64::from(MAX_YEAR)) as i32
}

impl CreateBook {
    pub fn validate(&self) -> Result<(), BookError> {
        validate_fields(&self.title, &self.author, self.year)
    }

    /// Convert into an insertable record with a fresh time-ordered id.
    pub fn to_entity(&self) -> NewBook {
        NewBook {
            id: Uuid::now_v7(),
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            year: stored_year(self.year),
        }
    }
}

impl UpdateBook {
    pub fn validate(&self) -> Result<(), BookError> {
        validate_fields(&self.title, &self.author, self.year)
    }

    /// Changes with surrounding whitespace removed from title and author.
    /// Call after [`UpdateBook::validate`].
    pub fn trimmed(&self) -> BookChanges {
        BookChanges {
            title: self.title.trim().to_string(),
            author: self.author.trim().to_string(),
            year: stored_year(self.year),
        }
    }
}
