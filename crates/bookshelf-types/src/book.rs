use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::owner::OwnerId;

/// Per-owner book identifier. Starts at 1 and is never reused within a
/// sequence epoch of a record store.
pub type BookId = u64;

/// A catalog entry.
///
/// Books are created only by a record store's add operation and are never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub book_id: BookId,
    pub name: String,
    pub author: String,
    pub owner_id: OwnerId,
}

impl Book {
    pub fn new(book_id: BookId, details: NewBook, owner_id: OwnerId) -> Self {
        Self {
            book_id,
            name: details.name,
            author: details.author,
            owner_id,
        }
    }
}

/// The client-supplied part of a book: a non-empty name and author.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewBook {
    name: String,
    author: String,
}

impl NewBook {
    /// Validate a name/author pair. Both must be non-empty.
    pub fn new(name: impl Into<String>, author: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let author = author.into();
        if name.is_empty() {
            return Err(TypeError::MissingField("name"));
        }
        if author.is_empty() {
            return Err(TypeError::MissingField("author"));
        }
        Ok(Self { name, author })
    }

    /// Extract a `NewBook` from a JSON request body.
    ///
    /// `name` and `author` are coerced to text: strings are taken as-is,
    /// numbers and `true` use their display form. Falsy values (null,
    /// missing, `""`, `0`, `false`) and arrays or objects count as absent.
    pub fn from_json(body: &Value) -> Result<Self, TypeError> {
        let name = coerce_text(body.get("name")).ok_or(TypeError::MissingField("name"))?;
        let author = coerce_text(body.get("author")).ok_or(TypeError::MissingField("author"))?;
        Self::new(name, author)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn author(&self) -> &str {
        &self.author
    }
}

fn coerce_text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.as_f64() == Some(0.0) => return None,
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "true".to_owned(),
        Value::Null | Value::Bool(false) | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}
