//! Bookshelf application library
//!
//! Wires the book catalogue module onto the kernel, database and HTTP
//! crates. The `bookshelf` binary and `bookshelf-cli` both start here.

pub mod bootstrap;
pub mod modules;

pub use bootstrap::{build_registry, migrate, run};
pub use modules::books;
