//! HTTP server for Bookshelf.
//!
//! Exposes the per-owner book catalog over JSON:
//!
//! - `GET  /api/{owner}/books`     list the owner's books
//! - `POST /api/{owner}/books`     add a book (`{"name", "author"}`)
//! - `GET  /api/{owner}/allbooks`  list every owner's books
//! - `GET  /api/{owner}/reset`     drop the owner's books
//!
//! All responses carry permissive CORS headers.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod handler;
pub mod response;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use dispatch::{Action, Dispatcher, Target};
pub use error::{ServerError, ServerResult};
pub use response::{ApiError, ApiResponse};
pub use server::BookshelfServer;
