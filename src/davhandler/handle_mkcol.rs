use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders;
use crate::fs;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_mkcol(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let source = self.source(&path);

        if fs::metadata(&source).await.is_some() {
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }
        if !self.has_parent(&path).await {
            return Err(StatusCode::NOT_FOUND.into());
        }
        let tokens = davheaders::lock_tokens(req.headers());
        if self.is_locked(&path.parent(), &tokens) {
            debug!("MKCOL {path}: parent locked");
            return Err(StatusCode::LOCKED.into());
        }

        tokio::fs::create_dir(&source).await?;

        let mut res = Response::new(Body::empty());
        *res.status_mut() = StatusCode::CREATED;
        res.headers_mut().typed_insert(headers::ContentLength(0));
        Ok(res)
    }
}
