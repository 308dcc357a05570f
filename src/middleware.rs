//! Hooks that run in front of the method handlers.
//!
//! Middlewares run in the order they were added to the builder, after the
//! request has been admitted. A middleware that returns a response ends
//! the request; the remaining middlewares and the handler are skipped.
use std::future::Future;
use std::pin::Pin;

use http::{Request, Response};

use crate::body::Body;

/// Future returned by [`DavMiddleware::handle`].
pub type MiddlewareFuture<'a> = Pin<Box<dyn Future<Output = Option<Response<Body>>> + Send + 'a>>;

/// A request hook. Only sees the request head; the body is left for the handler.
pub trait DavMiddleware: Send + Sync {
    /// Return `Some(response)` to answer the request right here.
    fn handle<'a>(&'a self, req: &'a Request<()>) -> MiddlewareFuture<'a>;
}
