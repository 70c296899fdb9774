//! Foundation types for Bookshelf.
//!
//! This crate provides the data model shared by the storage backends, the
//! actors, and the HTTP server. Every other Bookshelf crate depends on
//! `bookshelf-types`.
//!
//! # Key Types
//!
//! - [`Book`] -- A catalog entry owned by exactly one owner
//! - [`NewBook`] -- Validated `name`/`author` pair for an add request
//! - [`OwnerId`] -- Email-shaped identity that partitions per-owner storage
//! - [`InstanceId`] -- Deterministic actor address derived from a name

pub mod book;
pub mod error;
pub mod instance;
pub mod owner;

pub use book::{Book, BookId, NewBook};
pub use error::TypeError;
pub use instance::InstanceId;
pub use owner::OwnerId;
