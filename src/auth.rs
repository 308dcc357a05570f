//! User registry and Basic authentication.
//!
//! The registry is pluggable through [`DavAuth`]; [`MemAuth`] keeps users
//! in memory. [`BasicAuth`] is a middleware that refuses requests whose
//! Basic credentials do not log in.
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Debug};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_util::{future, FutureExt};
use headers::{authorization::Basic, Authorization, HeaderMapExt};
use http::{Request, Response, StatusCode};
use parking_lot::Mutex;

use crate::body::Body;
use crate::middleware::{DavMiddleware, MiddlewareFuture};

/// Errors of the user registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    AlreadyRegistered,
    NotRegistered,
}

impl Error for AuthError {}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AuthError::AlreadyRegistered => write!(f, "ALREADY_REGISTERED"),
            AuthError::NotRegistered => write!(f, "NOT_REGISTERED"),
        }
    }
}

/// Future returned by the [`DavAuth`] methods.
pub type AuthFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AuthError>> + Send + 'a>>;

/// A user registry.
pub trait DavAuth: Debug + Send + Sync {
    fn is_registered<'a>(&'a self, user: &'a str) -> AuthFuture<'a, bool>;

    /// Fails with `AlreadyRegistered` if the user exists.
    fn register<'a>(&'a self, user: &'a str, password: &'a str) -> AuthFuture<'a, ()>;

    /// Fails with `NotRegistered` if the user does not exist.
    fn change_password<'a>(&'a self, user: &'a str, password: &'a str) -> AuthFuture<'a, ()>;

    /// Fails with `NotRegistered` if the user does not exist.
    fn delete_user<'a>(&'a self, user: &'a str) -> AuthFuture<'a, ()>;

    /// `false` for unknown users and wrong passwords alike.
    fn try_login<'a>(&'a self, user: &'a str, password: &'a str) -> AuthFuture<'a, bool>;

    fn get_password<'a>(&'a self, user: &'a str) -> AuthFuture<'a, Option<String>>;
}

/// In-memory user registry.
#[derive(Debug, Default)]
pub struct MemAuth {
    users: Mutex<HashMap<String, String>>,
}

impl MemAuth {
    pub fn new() -> Arc<MemAuth> {
        Arc::new(MemAuth::default())
    }
}

impl DavAuth for MemAuth {
    fn is_registered<'a>(&'a self, user: &'a str) -> AuthFuture<'a, bool> {
        future::ready(Ok(self.users.lock().contains_key(user))).boxed()
    }

    fn register<'a>(&'a self, user: &'a str, password: &'a str) -> AuthFuture<'a, ()> {
        let mut users = self.users.lock();
        let res = if users.contains_key(user) {
            Err(AuthError::AlreadyRegistered)
        } else {
            users.insert(user.to_string(), password.to_string());
            Ok(())
        };
        future::ready(res).boxed()
    }

    fn change_password<'a>(&'a self, user: &'a str, password: &'a str) -> AuthFuture<'a, ()> {
        let res = match self.users.lock().get_mut(user) {
            Some(p) => {
                *p = password.to_string();
                Ok(())
            }
            None => Err(AuthError::NotRegistered),
        };
        future::ready(res).boxed()
    }

    fn delete_user<'a>(&'a self, user: &'a str) -> AuthFuture<'a, ()> {
        let res = match self.users.lock().remove(user) {
            Some(_) => Ok(()),
            None => Err(AuthError::NotRegistered),
        };
        future::ready(res).boxed()
    }

    fn try_login<'a>(&'a self, user: &'a str, password: &'a str) -> AuthFuture<'a, bool> {
        let ok = self
            .users
            .lock()
            .get(user)
            .map(|p| p == password)
            .unwrap_or(false);
        future::ready(Ok(ok)).boxed()
    }

    fn get_password<'a>(&'a self, user: &'a str) -> AuthFuture<'a, Option<String>> {
        future::ready(Ok(self.users.lock().get(user).cloned())).boxed()
    }
}

/// Middleware that requires valid Basic credentials.
#[derive(Debug, Clone)]
pub struct BasicAuth {
    auth: Arc<dyn DavAuth>,
    realm: String,
}

impl BasicAuth {
    pub fn new(auth: Arc<dyn DavAuth>, realm: impl Into<String>) -> Arc<BasicAuth> {
        Arc::new(BasicAuth {
            auth,
            realm: realm.into(),
        })
    }

    fn unauthorized(&self) -> Response<Body> {
        let mut res = Response::new(Body::from("please auth"));
        *res.status_mut() = StatusCode::UNAUTHORIZED;
        if let Ok(v) = format!("Basic realm=\"{}\"", self.realm).parse() {
            res.headers_mut().insert("WWW-Authenticate", v);
        }
        res
    }
}

impl DavMiddleware for BasicAuth {
    fn handle<'a>(&'a self, req: &'a Request<()>) -> MiddlewareFuture<'a> {
        async move {
            let basic = match req.headers().typed_get::<Authorization<Basic>>() {
                Some(Authorization(basic)) => basic,
                None => return Some(self.unauthorized()),
            };
            match self.auth.try_login(basic.username(), basic.password()).await {
                Ok(true) => None,
                Ok(false) => {
                    debug!("login failed for {}", basic.username());
                    Some(self.unauthorized())
                }
                Err(e) => {
                    error!("user registry: {e}");
                    Some(self.unauthorized())
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry() {
        let auth = MemAuth::new();
        assert!(!auth.is_registered("bob").await.unwrap());
        auth.register("bob", "pw").await.unwrap();
        assert_eq!(
            auth.register("bob", "pw").await,
            Err(AuthError::AlreadyRegistered)
        );
        assert!(auth.try_login("bob", "pw").await.unwrap());
        assert!(!auth.try_login("bob", "nope").await.unwrap());
        auth.change_password("bob", "pw2").await.unwrap();
        assert_eq!(auth.get_password("bob").await.unwrap().as_deref(), Some("pw2"));
        auth.delete_user("bob").await.unwrap();
        assert_eq!(auth.delete_user("bob").await, Err(AuthError::NotRegistered));
        assert_eq!(
            auth.change_password("bob", "x").await,
            Err(AuthError::NotRegistered)
        );
        assert!(!auth.try_login("bob", "pw2").await.unwrap());
        assert_eq!(auth.get_password("bob").await.unwrap(), None);
    }

    #[tokio::test]
    async fn middleware() {
        let users = MemAuth::new();
        users.register("alice", "secret").await.unwrap();
        let mw = BasicAuth::new(users, "dav");

        let req = Request::builder().uri("/dav").body(()).unwrap();
        let res = mw.handle(&req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert!(res.headers().contains_key("www-authenticate"));

        // "alice:secret"
        let req = Request::builder()
            .uri("/dav")
            .header("authorization", "Basic YWxpY2U6c2VjcmV0")
            .body(())
            .unwrap();
        assert!(mw.handle(&req).await.is_none());

        // "alice:wrong"
        let req = Request::builder()
            .uri("/dav")
            .header("authorization", "Basic YWxpY2U6d3Jvbmc=")
            .body(())
            .unwrap();
        assert!(mw.handle(&req).await.is_some());
    }
}
