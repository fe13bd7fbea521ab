//! Document store contract.
//!
//! DESIGN
//! ======
//! The store is a thin get/set-by-key surface over collections of JSON
//! documents. `set_merge` has merge semantics: top-level fields in the
//! written document replace their counterparts, untouched fields survive.
//! That is the only write primitive this system needs — profile updates are
//! whole-field replacements and user records are created with merge so a
//! partial record never clobbers an existing one.

use async_trait::async_trait;

/// Collection holding notification profiles, keyed by identity id.
pub const PROFILES_COLLECTION: &str = "profiles";

/// Collection holding user metadata records, keyed by identity id.
pub const USERS_COLLECTION: &str = "users";

/// A stored document: a flat JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Errors produced by document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored document could not be decoded into the expected shape.
    #[error("document decode failed: {0}")]
    Decode(String),
}

/// Get/set access to collections of JSON documents. Implemented by the
/// Firestore REST adapter and by the in-memory store used in tests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by collection and key. `Ok(None)` when absent.
    async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError>;

    /// Write a document by collection and key with merge semantics:
    /// top-level fields present in `fields` are replaced, others are kept.
    /// Creates the document if it does not exist.
    async fn set_merge(&self, collection: &str, key: &str, fields: Document) -> Result<(), StoreError>;
}
