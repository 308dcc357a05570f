//! ## Async Webdav handler for a directory tree with virtual mounts
//!
//! [`Webdav`] (RFC4918) is defined as
//! HTTP (GET/HEAD/PUT/DELETE) plus a bunch of extension methods (PROPFIND, etc).
//! These extension methods are used to manage collections (like unix directories),
//! get information on collections (like unix `ls` or `readdir`), rename and
//! copy items, lock/unlock items, etc.
//!
//! This library is a `handler`: it takes a `http::Request`, maps it onto the
//! local filesystem, and generates a `http::Response`. It serves one root
//! directory under a configurable protocol root (`/dav` by default), and
//! other directories can be grafted into that tree with virtual mounts.
//!
//! The handler works with the standard http types from the `http` and
//! `http_body` crates, so it can be used straight away with hyper.
//!
//! ## What is in the box.
//!
//! - a [HTTP handler][DavHandler] for OPTIONS, GET, HEAD, PUT, PROPFIND,
//!   DELETE, MOVE, MKCOL, COPY, LOCK and UNLOCK.
//! - a [path resolver][PathResolver] that maps service paths to source
//!   paths through the [virtual mounts][VirtualMount]. The last matching mount wins.
//! - a [locksystem][DavLockSystem] interface with an in-memory implementation,
//!   [`MemLs`]. Locks are exclusive, token gated and expire after their timeout.
//! - per-identity [admission control][ConnectionManager]: every identity
//!   (Basic auth user, or anonymous) can have a limited number of requests
//!   in flight. Requests over the limit get `429 Too Many Requests`.
//! - [middleware][DavMiddleware] hooks, and a [Basic auth][BasicAuth]
//!   middleware backed by a pluggable [user registry][DavAuth].
//!
//! ## Example.
//!
//! Example server using [hyper] that serves the /tmp directory in r/w mode,
//! with `/srv/media` mounted at `/dav/media`.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use dav_mount::DavHandler;
//!
//! #[tokio::main]
//! async fn main() {
//!     let addr = ([127, 0, 0, 1], 4918).into();
//!
//!     let dav_server = DavHandler::builder("/tmp")
//!         .dav_root("/dav")
//!         .virtual_mount("media", "/srv/media")
//!         .build();
//!
//!     let make_service = hyper::service::make_service_fn(move |_| {
//!         let dav_server = dav_server.clone();
//!         async move {
//!             let func = move |req| {
//!                 let dav_server = dav_server.clone();
//!                 async move {
//!                     Ok::<_, Infallible>(dav_server.handle(req).await)
//!                 }
//!             };
//!             Ok::<_, Infallible>(hyper::service::service_fn(func))
//!         }
//!     });
//!
//!     let _ = hyper::Server::bind(&addr)
//!         .serve(make_service)
//!         .await
//!         .map_err(|e| eprintln!("server error: {}", e));
//! }
//! ```
//!
//! [`Webdav`]: https://tools.ietf.org/html/rfc4918
//! [hyper]: https://hyper.rs/

#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

mod davhandler;
mod davheaders;
mod davxml;
mod errors;
mod fs;
mod keepalive;
mod util;
mod xmltree_ext;

pub mod auth;
pub mod body;
pub mod connection;
pub mod davpath;
pub mod ls;
pub mod middleware;
pub mod resolver;

use crate::errors::DavResult;

pub use crate::auth::{AuthError, BasicAuth, DavAuth, MemAuth};
pub use crate::connection::{ConnectionManager, Identity};
pub use crate::davhandler::{DavBuilder, DavHandler};
pub use crate::davpath::DavPath;
pub use crate::errors::DavError;
pub use crate::ls::{memls::MemLs, DavLockSystem, LockError};
pub use crate::middleware::DavMiddleware;
pub use crate::resolver::{PathResolver, VirtualMount};
pub use crate::util::DavMethod;
