//! Error types for trie mutations
use thiserror::Error;

/// Failures reported by [`PositionalTrie::insert`](crate::PositionalTrie::insert)
/// and [`PositionalTrie::remove`](crate::PositionalTrie::remove).
///
/// Both variants carry the key after case folding, which is the form the
/// trie stores and compares.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrieError {
    #[error("Duplicate key: {key}")]
    DuplicateKey { key: String },

    #[error("Key not found: {key}")]
    NotFound { key: String },
}

impl TrieError {
    /// The folded key the failed operation was called with.
    pub fn key(&self) -> &str {
        match self {
            TrieError::DuplicateKey { key } | TrieError::NotFound { key } => key,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrieError>;
