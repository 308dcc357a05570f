use std::path::{Path, PathBuf};
use std::sync::Arc;

use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::davxml;
use crate::fs;
use crate::keepalive;
use crate::ls::DavLockSystem;
use crate::resolver::PathResolver;
use crate::xmltree_ext::{self, ElementExt};
use crate::DavResult;

// Service path of a removed source path. Falls back to the position
// relative to the deleted tree if the resolver does not know the path.
fn removed_service_path(
    resolver: &PathResolver,
    top: &DavPath,
    top_source: &Path,
    removed: &Path,
) -> Option<DavPath> {
    if let Some(p) = resolver.to_service_path(&removed.to_string_lossy()) {
        if let Ok(p) = DavPath::from_decoded(&p) {
            return Some(p);
        }
    }
    let rel = removed.strip_prefix(top_source).ok()?;
    let mut path = top.clone();
    for seg in rel.iter() {
        path = path.join(&seg.to_string_lossy());
    }
    Some(path)
}

// Remove the tree below `source` and build the multistatus listing every
// removed path. Locks on removed paths are dropped.
async fn delete_tree(
    resolver: Arc<PathResolver>,
    ls: Arc<dyn DavLockSystem>,
    path: DavPath,
    source: PathBuf,
) -> DavResult<bytes::Bytes> {
    let mut removed = Vec::new();
    let result = fs::remove_tree(&source, &mut removed).await;

    let mut ms = davxml::multistatus();
    for r in &removed {
        if let Some(p) = removed_service_path(&resolver, &path, &source, r) {
            ls.force_release(p.as_str());
            ms.push_element(davxml::status_response(
                &p.as_url_string(),
                StatusCode::NO_CONTENT,
            ));
        }
    }
    if let Err(e) = result {
        // the collection itself is removed last, so it is still there.
        error!("DELETE {path}: {e}");
        ms.push_element(davxml::status_response(
            &path.as_url_string(),
            StatusCode::INTERNAL_SERVER_ERROR,
        ));
    }
    debug!("DELETE {path}: removed {} entries", removed.len());
    xmltree_ext::to_bytes(&ms, false)
}

impl crate::DavHandler {
    pub(crate) async fn handle_delete(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let source = self.source(&path);
        let meta = match fs::metadata(&source).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };
        if self.resolver.is_dav_root(path.as_str()) {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        let tokens = davheaders::lock_tokens(req.headers());
        if self.is_locked(&path, &tokens) || self.is_locked(&path.parent(), &tokens) {
            debug!("DELETE {path}: locked");
            return Err(StatusCode::LOCKED.into());
        }

        let mut res = Response::new(Body::empty());
        if !meta.is_dir() {
            tokio::fs::remove_file(&source).await?;
            self.ls.force_release(path.as_str());
            *res.status_mut() = StatusCode::NO_CONTENT;
            res.headers_mut().typed_insert(headers::ContentLength(0));
            return Ok(res);
        }

        let task = tokio::spawn(delete_tree(
            self.resolver.clone(),
            self.ls.clone(),
            path,
            source,
        ));
        *res.body_mut() = keepalive::multistatus_body(task, self.keepalive_interval);
        *res.status_mut() = StatusCode::MULTI_STATUS;
        res.headers_mut().insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        Ok(res)
    }
}
