//! Domain models and value objects

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Platform post identifier.
///
/// Post ids are assigned by the platform in monotonically increasing order,
/// which is what makes the watermark comparison in the collector sound.
/// Adapters parse the platform's decimal string ids at the boundary.
pub type PostId = u64;

/// Per-account access credentials stored at authorization time.
///
/// `key` is the user-context access token; `secret` is the matching token
/// secret, kept for platforms that sign requests.
#[derive(Clone)]
pub struct Credentials {
    pub key: SecretString,
    pub secret: SecretString,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// An account's active reshare criterion.
///
/// At most one exists per account. Absence is modeled by the store
/// returning no row; an empty `term` or `list_id` is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Owning account handle
    pub handle: String,
    /// Keyword pattern matched against post text (case-insensitive regex)
    pub term: String,
    /// Identifier of the followed-accounts list to scan
    pub list_id: String,
}

/// A post from a list timeline. Sourced per cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    /// Author handle
    pub author: String,
    /// Post text content
    pub text: String,
}

/// Outcome of one account's collection cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Total posts seen, matched or not
    pub seen: usize,
    /// Post ids a reshare was issued for, in encounter order
    pub reshared: Vec<PostId>,
    /// Matching posts skipped by the first-run backfill guard
    pub suppressed: usize,
    /// Watermark persisted at the end of the cycle, if it advanced
    pub new_watermark: Option<PostId>,
}
