//! Request dispatch.
//!
//! The dispatcher holds no state of its own. It validates the owner segment
//! of the path, picks the action from the remainder, and forwards to the
//! owner's record store or to the catalog index.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use tracing::debug;

use bookshelf_actors::{ActorSystem, ErrorKind};
use bookshelf_types::OwnerId;

use crate::response::{ApiError, ApiResponse, MSG_INVALID_BOOK};

/// What a request under `/api/{owner}/` asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// `books`: list (GET) or add (POST) the owner's books.
    Books,
    /// `allbooks`: list every owner's books.
    AllBooks,
    /// `reset`: drop the owner's books.
    Reset,
}

impl Action {
    /// Parse the path tail after the owner segment. Surrounding slashes are
    /// ignored.
    pub fn parse(tail: &str) -> Option<Self> {
        match tail.trim_matches('/') {
            "books" => Some(Self::Books),
            "allbooks" => Some(Self::AllBooks),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// A parsed `/api/{owner}/{action}` path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Target {
    pub owner: OwnerId,
    pub action: Option<Action>,
}

impl Target {
    /// Resolve an already percent-decoded owner segment and path tail.
    ///
    /// An empty tail is not a route at all. Otherwise the owner is validated
    /// before the action is looked at, so a bad owner is always a 400.
    pub fn resolve(owner: &str, tail: &str) -> Result<Self, ApiError> {
        if tail.trim_matches('/').is_empty() {
            return Err(ApiError::route_not_found());
        }
        let owner = OwnerId::parse(owner).map_err(|_| ApiError::invalid_owner())?;
        Ok(Self {
            owner,
            action: Action::parse(tail),
        })
    }
}

/// Routes requests to actors.
#[derive(Clone, Debug)]
pub struct Dispatcher {
    system: Arc<ActorSystem>,
}

impl Dispatcher {
    pub fn new(system: Arc<ActorSystem>) -> Self {
        Self { system }
    }

    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Forward a request to the actor responsible for it.
    ///
    /// `body` is only read for adds; unparseable JSON is treated like a body
    /// without `name` and `author`.
    pub async fn dispatch(
        &self,
        method: &Method,
        target: Target,
        body: &[u8],
    ) -> Result<Response, ApiError> {
        let Some(action) = target.action else {
            return Err(ApiError::route_not_found());
        };
        debug!(owner = %target.owner, ?action, %method, "dispatch");

        match (method, action) {
            (&Method::GET, Action::Books) => {
                let books = self.system.list_books(&target.owner).await?;
                Ok(ApiResponse::ok(books).into_response())
            }
            (&Method::POST, Action::Books) => {
                let payload = serde_json::from_slice::<Value>(body).unwrap_or(Value::Null);
                match self.system.add_book(&target.owner, payload).await {
                    Ok(book) => Ok(ApiResponse::ok(book).with_status(StatusCode::CREATED)),
                    Err(e) if e.kind() == ErrorKind::InvalidArgument => {
                        Err(ApiError::bad_request(MSG_INVALID_BOOK))
                    }
                    Err(e) => Err(e.into()),
                }
            }
            (&Method::GET, Action::AllBooks) => {
                let books = self.system.catalog_index().list().await?;
                Ok(ApiResponse::ok(books).into_response())
            }
            (&Method::GET, Action::Reset) => {
                let summary = self.system.reset_owner(&target.owner).await?;
                Ok(ApiResponse::ok(summary).into_response())
            }
            _ => Err(ApiError::route_not_found()),
        }
    }
}
