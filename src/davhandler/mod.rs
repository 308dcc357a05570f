//
// This module contains the main entry point of the library,
// DavHandler.
//
use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Buf;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;

use crate::body::Body;
use crate::connection::{ConnectionManager, Identity};
use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::ls::memls::MemLs;
use crate::ls::DavLockSystem;
use crate::middleware::DavMiddleware;
use crate::resolver::{absolute_path, PathResolver, VirtualMount};
use crate::util::{dav_method, DavMethod};
use crate::DavResult;

mod handle_copymove;
mod handle_delete;
mod handle_gethead;
mod handle_lock;
mod handle_mkcol;
mod handle_options;
mod handle_props;
mod handle_put;

pub(crate) const READ_BUF_SIZE: usize = 16384;
const MAX_REQUEST_BODY: usize = 65536;

/// Configuration of the handler.
#[derive(Clone)]
pub struct DavBuilder {
    /// Directory the protocol root maps to.
    root_dir: PathBuf,
    /// Service path prefix everything is served under.
    dav_root: String,
    /// Virtual mounts, in configuration order.
    mounts: Vec<(String, PathBuf)>,
    /// Locksystem backend. Defaults to `MemLs`.
    ls: Option<Arc<dyn DavLockSystem>>,
    /// Set of allowed methods (Defaults to "all methods")
    allow: DavMethod,
    /// Requests in flight per identity.
    max_connections: usize,
    middlewares: Vec<Arc<dyn DavMiddleware>>,
    /// read buffer size in bytes
    read_buf_size: usize,
    /// Interval of the whitespace sent while a multistatus is prepared.
    keepalive_interval: Duration,
}

impl DavBuilder {
    /// Create a new configuration builder serving `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> DavBuilder {
        Self {
            root_dir: root_dir.into(),
            dav_root: "/dav".to_string(),
            mounts: Vec::new(),
            ls: None,
            allow: DavMethod::WEBDAV_RW,
            max_connections: 32,
            middlewares: Vec::new(),
            read_buf_size: READ_BUF_SIZE,
            keepalive_interval: Duration::from_secs(5),
        }
    }

    /// Use the configuration that was built to generate a DavHandler.
    pub fn build(self) -> DavHandler {
        self.into()
    }

    /// Service path prefix of the protocol (default `/dav`).
    /// Requests outside of it are answered with 404.
    pub fn dav_root(self, dav_root: impl Into<String>) -> Self {
        let mut this = self;
        this.dav_root = dav_root.into();
        this
    }

    /// Expose `real` under `<dav root>/<virtual>`. When mounts overlap,
    /// the one added last wins.
    pub fn virtual_mount(self, virtual_path: impl Into<String>, real: impl Into<PathBuf>) -> Self {
        let mut this = self;
        this.mounts.push((virtual_path.into(), real.into()));
        this
    }

    /// Set the locksystem to use.
    pub fn locksystem(self, ls: Arc<dyn DavLockSystem>) -> Self {
        let mut this = self;
        this.ls = Some(ls);
        this
    }

    /// Which methods to allow (default is all methods).
    pub fn methods(self, allow: DavMethod) -> Self {
        let mut this = self;
        this.allow = allow;
        this
    }

    /// Maximum number of concurrent requests per identity (default 32).
    pub fn max_connections(self, max: usize) -> Self {
        let mut this = self;
        this.max_connections = max;
        this
    }

    /// Add a middleware. Middlewares run in the order they were added.
    pub fn middleware(self, mw: Arc<dyn DavMiddleware>) -> Self {
        let mut this = self;
        this.middlewares.push(mw);
        this
    }

    /// Read buffer size in bytes
    pub fn read_buf_size(self, size: usize) -> Self {
        let mut this = self;
        this.read_buf_size = size;
        this
    }

    /// Keep-alive interval of long running multistatus responses (default 5s).
    pub fn keepalive_interval(self, interval: Duration) -> Self {
        let mut this = self;
        this.keepalive_interval = interval;
        this
    }
}

fn path_string(path: &Path) -> String {
    absolute_path(path).to_string_lossy().into_owned()
}

/// The webdav handler struct.
///
/// The `new` and `build` etc methods are used to instantiate a handler.
///
/// The `handle` method is the method that does the actual work.
#[derive(Clone)]
pub struct DavHandler {
    pub(crate) resolver: Arc<PathResolver>,
    pub(crate) ls: Arc<dyn DavLockSystem>,
    pub(crate) conns: Arc<ConnectionManager>,
    pub(crate) allow: DavMethod,
    pub(crate) middlewares: Arc<Vec<Arc<dyn DavMiddleware>>>,
    pub(crate) read_buf_size: usize,
    pub(crate) keepalive_interval: Duration,
}

impl From<DavBuilder> for DavHandler {
    fn from(cfg: DavBuilder) -> Self {
        let mounts = cfg
            .mounts
            .iter()
            .map(|(v, r)| VirtualMount::new(v, &path_string(r)))
            .collect();
        Self {
            resolver: Arc::new(PathResolver::new(
                &cfg.dav_root,
                &path_string(&cfg.root_dir),
                mounts,
            )),
            ls: match cfg.ls {
                Some(ls) => ls,
                None => MemLs::new(),
            },
            conns: ConnectionManager::new(cfg.max_connections),
            allow: cfg.allow,
            middlewares: Arc::new(cfg.middlewares),
            read_buf_size: cfg.read_buf_size,
            keepalive_interval: cfg.keepalive_interval,
        }
    }
}

impl DavHandler {
    /// Return a configuration builder.
    pub fn builder(root_dir: impl Into<PathBuf>) -> DavBuilder {
        DavBuilder::new(root_dir)
    }

    /// The path resolver of this handler.
    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    /// The locksystem of this handler.
    pub fn locksystem(&self) -> &Arc<dyn DavLockSystem> {
        &self.ls
    }

    /// The admission controller of this handler.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.conns
    }

    /// Handle a webdav request.
    ///
    /// The request is first counted against its identity. If that identity
    /// already has the maximum number of requests in flight, the answer is
    /// `429 Too Many Requests`. Otherwise the slot is held by the response
    /// body and released when the body is dropped.
    pub async fn handle<ReqBody, ReqData, ReqError>(&self, req: Request<ReqBody>) -> Response<Body>
    where
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
    {
        let identity = Identity::from_headers(req.headers());
        let slot = match self.conns.slot(identity) {
            Some(slot) => slot,
            None => {
                warn!(
                    "refusing {} {}: too many requests in flight",
                    req.method(),
                    req.uri()
                );
                return error_response(&StatusCode::TOO_MANY_REQUESTS.into());
            }
        };
        let mut resp = self.handle_inner(req).await;
        resp.body_mut().hold_slot(slot);
        resp
    }
}

fn error_response(err: &DavError) -> Response<Body> {
    let mut resp = Response::new(Body::empty());
    *resp.status_mut() = err.statuscode();
    let h = resp.headers_mut();
    h.insert(http::header::CONTENT_LENGTH, http::HeaderValue::from_static("0"));
    if err.must_close() {
        h.insert(http::header::CONNECTION, http::HeaderValue::from_static("close"));
    }
    resp
}

impl DavHandler {
    // helper.
    pub(crate) fn path(&self, req: &Request<()>) -> DavPath {
        // checked in handle2 already.
        DavPath::from_uri(req.uri()).unwrap_or_else(|_| DavPath::root())
    }

    // helper: where the bytes of a service path live.
    pub(crate) fn source(&self, path: &DavPath) -> PathBuf {
        PathBuf::from(self.resolver.to_source_path(path.as_str()))
    }

    // helper: does the parent of the path exist as a directory.
    pub(crate) async fn has_parent(&self, path: &DavPath) -> bool {
        crate::fs::is_dir(self.source(&path.parent())).await
    }

    // helper: is `path` locked, and does none of `tokens` unlock it.
    pub(crate) fn is_locked(&self, path: &DavPath, tokens: &[String]) -> bool {
        self.ls.is_active(path.as_str()) && !self.ls.can_release(path.as_str(), tokens)
    }

    // drain request body and return length.
    pub(crate) async fn read_request<ReqBody, ReqData, ReqError>(
        &self,
        body: ReqBody,
        max_size: usize,
    ) -> DavResult<Vec<u8>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let mut data = Vec::new();
        pin_utils::pin_mut!(body);
        while let Some(res) = body.data().await {
            let mut buf = res.map_err(|_| {
                DavError::IoError(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "UnexpectedEof",
                ))
            })?;
            while buf.has_remaining() {
                if data.len() + buf.remaining() > max_size {
                    return Err(StatusCode::PAYLOAD_TOO_LARGE.into());
                }
                let b = buf.chunk();
                let l = b.len();
                data.extend_from_slice(b);
                buf.advance(l);
            }
        }
        Ok(data)
    }

    // internal dispatcher.
    async fn handle_inner<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> Response<Body>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        // Turn any DavError results into a HTTP error response.
        match self.handle2(req).await {
            Ok(resp) => {
                debug!("== END REQUEST result OK");
                resp
            }
            Err(err) => {
                if err.statuscode().is_server_error() {
                    error!("== END REQUEST result {err}: {:?}", err);
                } else {
                    debug!("== END REQUEST result {:?}", err);
                }
                error_response(&err)
            }
        }
    }

    // internal dispatcher part 2.
    async fn handle2<ReqBody, ReqData, ReqError>(
        &self,
        req: Request<ReqBody>,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let (req, body) = {
            let (parts, body) = req.into_parts();
            (Request::from_parts(parts, ()), body)
        };

        for mw in self.middlewares.iter() {
            if let Some(resp) = mw.handle(&req).await {
                debug!("request {} {} answered by middleware", req.method(), req.uri());
                return Ok(resp);
            }
        }

        // make sure the request path is valid, and ours.
        let path = DavPath::from_uri(req.uri())?;
        if !self.resolver.is_dav_path(path.as_str()) {
            debug!("request {} outside of {}", path, self.resolver.dav_root());
            return Err(StatusCode::NOT_FOUND.into());
        }

        // translate HTTP method to Webdav method.
        let method = match dav_method(req.method()) {
            Ok(m) => m,
            Err(e) => {
                debug!("refusing method {} request {}", req.method(), req.uri());
                return Err(e);
            }
        };

        // see if method is allowed.
        if !self.allow.contains(method) {
            debug!(
                "method {} not allowed on request {}",
                req.method(),
                req.uri()
            );
            return Err(DavError::StatusClose(StatusCode::METHOD_NOT_ALLOWED));
        }

        // PUT is the only handler that reads the body itself. All the
        // other handlers get the drained body, which must be empty
        // unless the method takes one.
        if method == DavMethod::PUT {
            debug!("== START REQUEST {:?} {}", method, path);
            return self.handle_put(&req, body).await;
        }
        let body_data = self.read_request(body, MAX_REQUEST_BODY).await?;
        if !DavMethod::WEBDAV_BODY.contains(method) && !body_data.is_empty() {
            return Err(StatusCode::UNSUPPORTED_MEDIA_TYPE.into());
        }

        debug!("== START REQUEST {:?} {}", method, path);

        match method {
            DavMethod::OPTIONS => self.handle_options(&req).await,
            DavMethod::PROPFIND => self.handle_propfind(&req).await,
            DavMethod::MKCOL => self.handle_mkcol(&req).await,
            DavMethod::DELETE => self.handle_delete(&req).await,
            DavMethod::LOCK => self.handle_lock(&req).await,
            DavMethod::UNLOCK => self.handle_unlock(&req).await,
            DavMethod::HEAD => self.handle_head(&req).await,
            DavMethod::GET => self.handle_get(&req).await,
            DavMethod::MOVE => self.handle_move(&req).await,
            DavMethod::COPY => self.handle_copy(&req).await,
            _ => Err(DavError::UnknownDavMethod),
        }
    }
}
