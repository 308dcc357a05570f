use std::time::Duration;

use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders::{self, Depth};
use crate::davpath::DavPath;
use crate::davxml;
use crate::errors::DavError;
use crate::fs;
use crate::ls::token_uri;
use crate::xmltree_ext;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_lock(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let meta = match fs::metadata(self.source(&path)).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };

        let timeout = davheaders::timeout(req.headers());
        let deep = davheaders::depth(req.headers()) == Some(Depth::Infinity);

        let token = match self.ls.acquire(path.as_str(), timeout, None) {
            Ok(token) => token,
            Err(e) => {
                debug!("LOCK {path}: {e}");
                return Err(DavError::LockFailed);
            }
        };
        if deep && meta.is_dir() {
            self.lock_descendants(&path, &token, timeout).await;
        }

        let body = xmltree_ext::to_bytes(&davxml::lock_prop(&token, timeout), true)?;
        let mut res = Response::new(Body::from(body));
        let h = res.headers_mut();
        h.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        let lt = format!("<{}>", token_uri(&token));
        h.insert("lock-token", HeaderValue::from_str(&lt).map_err(|_| DavError::LockFailed)?);
        Ok(res)
    }

    // Lock everything below `top` with the same token and timeout.
    // A node that cannot be locked is logged and skipped; its siblings
    // and its own children are still tried.
    async fn lock_descendants(&self, top: &DavPath, token: &str, timeout: Option<Duration>) {
        let mut todo = vec![top.clone()];
        while let Some(dir) = todo.pop() {
            let mut children = match fs::read_dir_names(self.source(&dir)).await {
                Ok(names) => names.iter().map(|n| dir.join(n)).collect::<Vec<_>>(),
                Err(e) => {
                    warn!("LOCK {dir}: cannot list: {e}");
                    continue;
                }
            };
            if self.resolver.is_dav_root(dir.as_str()) {
                for m in self.resolver.root_mounts() {
                    if let Ok(m) = DavPath::from_decoded(&m) {
                        if !children.contains(&m) {
                            children.push(m);
                        }
                    }
                }
            }
            for child in children {
                let meta = match fs::metadata(self.source(&child)).await {
                    Some(meta) => meta,
                    None => continue,
                };
                if let Err(e) = self.ls.acquire(child.as_str(), timeout, Some(token)) {
                    warn!("LOCK {child}: {e}, skipped");
                }
                if meta.is_dir() {
                    todo.push(child);
                }
            }
        }
    }

    pub(crate) async fn handle_unlock(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        if fs::metadata(self.source(&path)).await.is_none() {
            return Err(StatusCode::NOT_FOUND.into());
        }

        let token = match self.ls.token(path.as_str()) {
            Some(token) => token,
            None => return Err(StatusCode::CONFLICT.into()),
        };
        let tokens = davheaders::lock_tokens(req.headers());
        if !self.ls.can_release(path.as_str(), &tokens) {
            debug!("UNLOCK {path}: token mismatch");
            return Err(StatusCode::PRECONDITION_FAILED.into());
        }
        self.ls.release(path.as_str(), &tokens)?;
        let n = self.ls.release_descendants(path.as_str(), &token);
        if n > 0 {
            debug!("UNLOCK {path}: released {n} descendants");
        }

        let mut res = Response::new(Body::empty());
        res.headers_mut().typed_insert(headers::ContentLength(0));
        Ok(res)
    }
}
