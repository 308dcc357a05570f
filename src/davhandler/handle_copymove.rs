use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::fs;
use crate::resolver::is_child_path;
use crate::DavResult;

fn empty(status: StatusCode) -> Response<Body> {
    let mut res = Response::new(Body::empty());
    *res.status_mut() = status;
    res.headers_mut().typed_insert(headers::ContentLength(0));
    res
}

impl crate::DavHandler {
    // the Destination header, which must point inside the protocol root.
    fn destination(&self, req: &Request<()>) -> DavResult<DavPath> {
        let dest = davheaders::destination(req.headers())?;
        if !self.resolver.is_dav_path(dest.as_str()) {
            debug!("destination {dest} outside of {}", self.resolver.dav_root());
            return Err(StatusCode::BAD_REQUEST.into());
        }
        Ok(dest)
    }

    pub(crate) async fn handle_move(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let source = self.source(&path);
        let meta = match fs::metadata(&source).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };
        if self.resolver.is_dav_root(path.as_str()) {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        let dest = self.destination(req)?;
        let dest_source = self.source(&dest);
        let dest_meta = fs::metadata(&dest_source).await;

        // never replace a collection, nor put a collection on top of anything.
        if let Some(ref dm) = dest_meta {
            if dm.is_dir() || meta.is_dir() {
                return Err(StatusCode::METHOD_NOT_ALLOWED.into());
            }
        }

        let tokens = davheaders::lock_tokens(req.headers());
        if self.is_locked(&path, &tokens)
            || self.is_locked(&dest.parent(), &tokens)
            || (dest_meta.is_some() && self.is_locked(&dest, &tokens))
        {
            debug!("MOVE {path} -> {dest}: locked");
            return Err(StatusCode::LOCKED.into());
        }

        if dest_meta.is_none() && !self.has_parent(&dest).await {
            return Err(StatusCode::NOT_FOUND.into());
        }
        if dest_meta.is_some() && !davheaders::overwrite(req.headers()) {
            return Err(StatusCode::CONFLICT.into());
        }
        if meta.is_dir() && is_child_path(path.as_str(), dest.as_str()) {
            debug!("MOVE {path} -> {dest}: destination inside source");
            return Err(StatusCode::CONFLICT.into());
        }

        fs::rename(&source, &dest_source).await?;
        self.ls.force_release_tree(path.as_str());
        Ok(empty(StatusCode::OK))
    }

    pub(crate) async fn handle_copy(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let source = self.source(&path);
        let meta = match fs::metadata(&source).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };
        if meta.is_dir() {
            debug!("COPY {path}: collections are not copied");
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        let dest = self.destination(req)?;
        let tokens = davheaders::lock_tokens(req.headers());
        if self.is_locked(&dest, &tokens) || self.is_locked(&dest.parent(), &tokens) {
            debug!("COPY {path} -> {dest}: locked");
            return Err(StatusCode::LOCKED.into());
        }

        let dest_source = self.source(&dest);
        let dest_meta = fs::metadata(&dest_source).await;
        let exists = match dest_meta {
            Some(ref dm) if dm.is_dir() => return Err(StatusCode::METHOD_NOT_ALLOWED.into()),
            Some(_) => true,
            None => {
                if !self.has_parent(&dest).await {
                    return Err(StatusCode::NOT_FOUND.into());
                }
                false
            }
        };
        if exists && !davheaders::overwrite(req.headers()) {
            return Err(StatusCode::CONFLICT.into());
        }
        // copying a file onto itself would truncate it.
        if source == dest_source {
            return Err(StatusCode::CONFLICT.into());
        }

        tokio::fs::copy(&source, &dest_source).await?;
        Ok(empty(if exists {
            StatusCode::NO_CONTENT
        } else {
            StatusCode::CREATED
        }))
    }
}
