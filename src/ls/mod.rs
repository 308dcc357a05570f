//! Contains the structs and traits that define a `locksystem` backend.
//!
//! Locks are exclusive write locks, keyed by service path. A lock is either
//! active or not; an active lock with an expiration stops being active once
//! the expiration has passed. Expiry is evaluated lazily, on access.
//!
//! Lock tokens are opaque strings. On the wire they are sent as
//! `opaquelocktoken:<uuid>`, but the locksystem only sees the bare token.
use std::error::Error;
use std::fmt::{self, Debug};
use std::time::{Duration, SystemTime};

pub mod memls;

/// Errors of the locksystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// `acquire` on a path that already has an active lock.
    AlreadyLocked,
    /// `release` on a path without an active lock.
    NotLocked,
    /// None of the presented tokens matches the lock.
    InvalidLockToken,
}

impl Error for LockError {}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LockError::AlreadyLocked => write!(f, "ALREADY_LOCKED"),
            LockError::NotLocked => write!(f, "NOT_LOCKED"),
            LockError::InvalidLockToken => write!(f, "INVALID_LOCK_TOKEN"),
        }
    }
}

/// The trait that defines a locksystem.
///
/// All operations on one path must be atomic with respect to each other:
/// "check active, then acquire" may not interleave with another acquire.
pub trait DavLockSystem: Debug + Sync + Send {
    /// Lock a path. Generates a fresh token unless `token` is given.
    /// Without a timeout the lock never expires.
    fn acquire(
        &self,
        path: &str,
        timeout: Option<Duration>,
        token: Option<&str>,
    ) -> Result<String, LockError>;

    /// Is there an active lock on this path. Clears an expired lock.
    fn is_active(&self, path: &str) -> bool;

    /// Release the lock if one of `tokens` matches.
    fn release(&self, path: &str, tokens: &[String]) -> Result<(), LockError>;

    /// Release the lock, whatever the token.
    fn force_release(&self, path: &str);

    /// Release every lock at or below `path`, whatever the token.
    fn force_release_tree(&self, path: &str);

    /// Would `release` with these tokens succeed.
    fn can_release(&self, path: &str, tokens: &[String]) -> bool;

    /// Release every active lock strictly below `path` that carries `token`.
    /// Returns the number of locks released.
    fn release_descendants(&self, path: &str, token: &str) -> usize;

    /// Token of the active lock, if any.
    fn token(&self, path: &str) -> Option<String>;

    /// Expiration of the active lock, if it has one.
    fn expiration(&self, path: &str) -> Option<SystemTime>;

    /// Timeout the active lock was acquired with, if any.
    fn timeout(&self, path: &str) -> Option<Duration>;
}

/// Strip `<>` and the `opaquelocktoken:` scheme from a presented token.
pub fn bare_token(token: &str) -> &str {
    let token = token.trim();
    let token = token.strip_prefix('<').unwrap_or(token);
    let token = token.strip_suffix('>').unwrap_or(token);
    token.strip_prefix("opaquelocktoken:").unwrap_or(token)
}

/// Format a token the way it goes on the wire.
pub fn token_uri(token: &str) -> String {
    format!("opaquelocktoken:{token}")
}
