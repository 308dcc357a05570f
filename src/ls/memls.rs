//! Simple in-memory locksystem.
//!
//! Lock state lives only as long as the process. All records sit in one
//! table behind one mutex, which makes every check-then-modify sequence
//! on a path atomic.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::ls::*;
use crate::resolver::is_child_path;

#[derive(Debug, Clone, Default)]
struct LockRecord {
    locked: bool,
    token: Option<String>,
    expiration: Option<SystemTime>,
    timeout: Option<Duration>,
}

impl LockRecord {
    fn clear(&mut self) {
        self.locked = false;
        self.token = None;
        self.expiration = None;
        self.timeout = None;
    }

    // A lock without expiration never expires. One with an expiration
    // is expired once `now` is strictly past it.
    fn check_active(&mut self, now: SystemTime) -> bool {
        if !self.locked {
            return false;
        }
        match self.expiration {
            Some(exp) if now > exp => {
                self.clear();
                false
            }
            _ => true,
        }
    }

    fn matches(&self, tokens: &[String]) -> bool {
        match self.token {
            Some(ref t) => tokens.iter().any(|c| bare_token(c) == t.as_str()),
            None => false,
        }
    }
}

/// Ephemeral in-memory locksystem.
#[derive(Debug, Default)]
pub struct MemLs {
    table: Mutex<HashMap<String, LockRecord>>,
}

impl MemLs {
    /// Create a new "memls" locksystem.
    pub fn new() -> Arc<MemLs> {
        Arc::new(MemLs::default())
    }

    // run `f` on the record of `path`, after lazy expiry.
    fn with_active<F, R>(&self, path: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut LockRecord) -> R,
    {
        let mut table = self.table.lock();
        let rec = table.get_mut(path)?;
        if rec.check_active(SystemTime::now()) {
            Some(f(rec))
        } else {
            None
        }
    }
}

impl DavLockSystem for MemLs {
    fn acquire(
        &self,
        path: &str,
        timeout: Option<Duration>,
        token: Option<&str>,
    ) -> Result<String, LockError> {
        let now = SystemTime::now();
        let mut table = self.table.lock();
        let rec = table.entry(path.to_string()).or_default();
        if rec.check_active(now) {
            return Err(LockError::AlreadyLocked);
        }
        let token = match token {
            Some(t) => bare_token(t).to_string(),
            None => Uuid::new_v4().to_string(),
        };
        rec.locked = true;
        rec.token = Some(token.clone());
        match timeout.filter(|t| !t.is_zero()) {
            Some(t) => {
                rec.expiration = Some(now + t);
                rec.timeout = Some(t);
            }
            None => {
                rec.expiration = None;
                rec.timeout = None;
            }
        }
        trace!("lock {path}: acquired {token} timeout {:?}", rec.timeout);
        Ok(token)
    }

    fn is_active(&self, path: &str) -> bool {
        self.with_active(path, |_| ()).is_some()
    }

    fn release(&self, path: &str, tokens: &[String]) -> Result<(), LockError> {
        self.with_active(path, |rec| {
            if !rec.matches(tokens) {
                return Err(LockError::InvalidLockToken);
            }
            rec.clear();
            Ok(())
        })
        .unwrap_or(Err(LockError::NotLocked))
    }

    fn force_release(&self, path: &str) {
        if let Some(rec) = self.table.lock().get_mut(path) {
            rec.clear();
        }
    }

    fn force_release_tree(&self, path: &str) {
        let mut table = self.table.lock();
        table.retain(|p, _| !is_child_path(path, p));
    }

    fn can_release(&self, path: &str, tokens: &[String]) -> bool {
        self.with_active(path, |rec| rec.matches(tokens))
            .unwrap_or(false)
    }

    fn release_descendants(&self, path: &str, token: &str) -> usize {
        let now = SystemTime::now();
        let token = bare_token(token);
        let mut count = 0;
        for (p, rec) in self.table.lock().iter_mut() {
            if p.as_str() == path || !is_child_path(path, p) || !rec.check_active(now) {
                continue;
            }
            if rec.token.as_deref() == Some(token) {
                rec.clear();
                count += 1;
            }
        }
        count
    }

    fn token(&self, path: &str) -> Option<String> {
        self.with_active(path, |rec| rec.token.clone()).flatten()
    }

    fn expiration(&self, path: &str) -> Option<SystemTime> {
        self.with_active(path, |rec| rec.expiration).flatten()
    }

    fn timeout(&self, path: &str) -> Option<Duration> {
        self.with_active(path, |rec| rec.timeout).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn tokens(t: &str) -> Vec<String> {
        vec![t.to_string()]
    }

    #[test]
    fn acquire_release() {
        let ls = MemLs::new();
        assert!(!ls.is_active("/dav/a"));
        let t = ls.acquire("/dav/a", None, None).unwrap();
        assert!(ls.is_active("/dav/a"));
        assert_eq!(ls.token("/dav/a"), Some(t.clone()));
        assert_eq!(ls.expiration("/dav/a"), None);
        assert_eq!(
            ls.acquire("/dav/a", None, None),
            Err(LockError::AlreadyLocked)
        );
        ls.release("/dav/a", &tokens(&t)).unwrap();
        assert!(!ls.is_active("/dav/a"));
        assert_eq!(ls.token("/dav/a"), None);
        assert_eq!(ls.release("/dav/a", &tokens(&t)), Err(LockError::NotLocked));
        // record is reusable.
        ls.acquire("/dav/a", None, None).unwrap();
    }

    #[test]
    fn wrong_token_keeps_lock() {
        let ls = MemLs::new();
        let t = ls.acquire("/dav/a", None, None).unwrap();
        assert_eq!(
            ls.release("/dav/a", &tokens("nope")),
            Err(LockError::InvalidLockToken)
        );
        assert!(ls.is_active("/dav/a"));
        assert!(!ls.can_release("/dav/a", &[]));
        let set = vec!["x".to_string(), format!("<opaquelocktoken:{t}>")];
        assert!(ls.can_release("/dav/a", &set));
        ls.release("/dav/a", &set).unwrap();
    }

    #[test]
    fn supplied_token() {
        let ls = MemLs::new();
        let t = ls
            .acquire("/dav/b", None, Some("opaquelocktoken:abc"))
            .unwrap();
        assert_eq!(t, "abc");
        assert!(ls.can_release("/dav/b", &tokens("abc")));
    }

    #[test]
    fn expiry() {
        let ls = MemLs::new();
        let timeout = Duration::from_millis(50);
        ls.acquire("/dav/c", Some(timeout), None).unwrap();
        assert_eq!(ls.timeout("/dav/c"), Some(timeout));
        assert!(ls.expiration("/dav/c").is_some());
        assert!(ls.is_active("/dav/c"));
        thread::sleep(Duration::from_millis(120));
        assert!(!ls.is_active("/dav/c"));
        assert_eq!(ls.timeout("/dav/c"), None);
        assert!(ls.acquire("/dav/c", None, None).is_ok());
    }

    #[test]
    fn zero_timeout_never_expires() {
        let ls = MemLs::new();
        ls.acquire("/dav/z", Some(Duration::ZERO), None).unwrap();
        assert_eq!(ls.expiration("/dav/z"), None);
        assert!(ls.is_active("/dav/z"));
    }

    #[test]
    fn force_release() {
        let ls = MemLs::new();
        ls.force_release("/dav/none");
        ls.acquire("/dav/d", None, None).unwrap();
        ls.force_release("/dav/d");
        assert!(!ls.is_active("/dav/d"));
    }

    #[test]
    fn force_release_tree() {
        let ls = MemLs::new();
        let t = ls.acquire("/dav/dir", None, None).unwrap();
        ls.acquire("/dav/dir/a", None, Some(t.as_str())).unwrap();
        ls.acquire("/dav/dir/b/c", None, None).unwrap();
        ls.acquire("/dav/dirx", None, None).unwrap();
        ls.force_release_tree("/dav/dir");
        assert!(!ls.is_active("/dav/dir"));
        assert!(!ls.is_active("/dav/dir/a"));
        assert!(!ls.is_active("/dav/dir/b/c"));
        assert!(ls.is_active("/dav/dirx"));
    }

    #[test]
    fn descendants() {
        let ls = MemLs::new();
        let t = ls.acquire("/dav/dir", None, None).unwrap();
        ls.acquire("/dav/dir/a", None, Some(t.as_str())).unwrap();
        ls.acquire("/dav/dir/b/c", None, Some(t.as_str())).unwrap();
        ls.acquire("/dav/dir/other", None, None).unwrap();
        ls.acquire("/dav/dirx", None, Some(t.as_str())).unwrap();
        assert_eq!(ls.release_descendants("/dav/dir", &t), 2);
        assert!(ls.is_active("/dav/dir"));
        assert!(ls.is_active("/dav/dir/other"));
        assert!(ls.is_active("/dav/dirx"));
        assert!(!ls.is_active("/dav/dir/b/c"));
    }

    #[test]
    fn concurrent_acquire() {
        let ls = MemLs::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ls = ls.clone();
                thread::spawn(move || ls.acquire("/dav/race", None, None).is_ok())
            })
            .collect();
        let won = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(won, 1);
    }
}
