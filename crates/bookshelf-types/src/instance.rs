use std::fmt;

use serde::{Deserialize, Serialize};

use crate::owner::OwnerId;

/// Name of the single catalog index instance.
pub const CATALOG_INDEX_NAME: &str = "global";

/// Address of an actor instance.
///
/// An `InstanceId` is derived deterministically from a name using BLAKE3, so
/// the same name always resolves to the same instance. Record stores are
/// named after their owner; the catalog index uses [`CATALOG_INDEX_NAME`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId([u8; 32]);

impl InstanceId {
    /// Derive an `InstanceId` from an arbitrary name.
    pub fn from_name(name: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"bookshelf-instance-v1:");
        hasher.update(name.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    /// The record store address for an owner.
    pub fn for_owner(owner: &OwnerId) -> Self {
        Self::from_name(owner.as_str())
    }

    /// The well-known catalog index address.
    pub fn catalog_index() -> Self {
        Self::from_name(CATALOG_INDEX_NAME)
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_id(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.short_id())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
