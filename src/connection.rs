//! Per-identity admission control.
//!
//! Every request is counted against the identity that sent it (the Basic
//! auth user name, or the anonymous identity). Once an identity has
//! `max_connections` requests in flight, further requests are refused
//! until one of them completes.
use std::collections::HashMap;
use std::sync::Arc;

use headers::{authorization::Basic, Authorization, HeaderMapExt};
use http::HeaderMap;
use parking_lot::Mutex;

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// No (or no parseable) `Authorization: Basic` header.
    Anonymous,
    /// The user name from the `Authorization: Basic` header.
    User(String),
}

impl Identity {
    /// Extract the identity from the request headers.
    pub fn from_headers(headers: &HeaderMap) -> Identity {
        match headers.typed_get::<Authorization<Basic>>() {
            Some(Authorization(basic)) => Identity::User(basic.username().to_string()),
            None => Identity::Anonymous,
        }
    }
}

/// Counts in-flight requests per identity.
#[derive(Debug)]
pub struct ConnectionManager {
    max_connections: usize,
    table: Mutex<HashMap<Identity, usize>>,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Arc<ConnectionManager> {
        Arc::new(ConnectionManager {
            max_connections,
            table: Mutex::new(HashMap::new()),
        })
    }

    /// Count a new request. Returns `false` if the identity is at its limit.
    pub fn admit(&self, identity: &Identity) -> bool {
        let mut table = self.table.lock();
        let count = table.entry(identity.clone()).or_insert(0);
        if *count >= self.max_connections {
            return false;
        }
        *count += 1;
        true
    }

    /// A request completed. The count never drops below zero.
    pub fn release(&self, identity: &Identity) {
        let mut table = self.table.lock();
        let count = table.entry(identity.clone()).or_insert(0);
        *count = count.saturating_sub(1);
        if *count == 0 {
            table.remove(identity);
        }
    }

    /// Number of requests in flight for this identity.
    pub fn count(&self, identity: &Identity) -> usize {
        self.table.lock().get(identity).copied().unwrap_or(0)
    }

    /// Admit and return a slot that releases itself when dropped.
    pub fn slot(self: &Arc<Self>, identity: Identity) -> Option<ConnectionSlot> {
        if self.admit(&identity) {
            Some(ConnectionSlot {
                manager: self.clone(),
                identity,
            })
        } else {
            None
        }
    }
}

/// An admitted request. Dropping it gives the slot back.
#[derive(Debug)]
pub struct ConnectionSlot {
    manager: Arc<ConnectionManager>,
    identity: Identity,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.manager.release(&self.identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> Identity {
        Identity::User(name.to_string())
    }

    #[test]
    fn limit_per_identity() {
        let cm = ConnectionManager::new(2);
        assert!(cm.admit(&user("a")));
        assert!(cm.admit(&user("a")));
        assert!(!cm.admit(&user("a")));
        // other identities are unaffected.
        assert!(cm.admit(&user("b")));
        assert!(cm.admit(&Identity::Anonymous));
        cm.release(&user("a"));
        assert!(cm.admit(&user("a")));
        assert_eq!(cm.count(&user("a")), 2);
    }

    #[test]
    fn release_never_below_zero() {
        let cm = ConnectionManager::new(1);
        cm.release(&user("a"));
        cm.release(&user("a"));
        assert_eq!(cm.count(&user("a")), 0);
        assert!(cm.admit(&user("a")));
        assert!(!cm.admit(&user("a")));
    }

    #[test]
    fn slot_releases_on_drop() {
        let cm = ConnectionManager::new(1);
        let slot = cm.slot(user("a")).unwrap();
        assert!(cm.slot(user("a")).is_none());
        drop(slot);
        assert!(cm.slot(user("a")).is_some());
    }

    #[test]
    fn identity_from_headers() {
        let mut h = HeaderMap::new();
        assert_eq!(Identity::from_headers(&h), Identity::Anonymous);
        // "alice:secret"
        h.insert("authorization", "Basic YWxpY2U6c2VjcmV0".parse().unwrap());
        assert_eq!(Identity::from_headers(&h), user("alice"));
        h.insert("authorization", "Basic !!!".parse().unwrap());
        assert_eq!(Identity::from_headers(&h), Identity::Anonymous);
        h.insert("authorization", "Bearer abc".parse().unwrap());
        assert_eq!(Identity::from_headers(&h), Identity::Anonymous);
    }
}
