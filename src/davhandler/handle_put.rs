use std::error::Error as StdError;
use std::io;

use bytes::Buf;
use headers::HeaderMapExt;
use http::{Request, Response, StatusCode};
use http_body::Body as HttpBody;
use tokio::io::AsyncWriteExt;

use crate::body::Body;
use crate::davheaders;
use crate::errors::DavError;
use crate::fs;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_put<ReqBody, ReqData, ReqError>(
        &self,
        req: &Request<()>,
        body: ReqBody,
    ) -> DavResult<Response<Body>>
    where
        ReqBody: HttpBody<Data = ReqData, Error = ReqError>,
        ReqData: Buf + Send + 'static,
        ReqError: StdError + Send + Sync + 'static,
    {
        let path = self.path(req);
        let source = self.source(&path);
        let tokens = davheaders::lock_tokens(req.headers());

        let exists = match fs::metadata(&source).await {
            Some(meta) => {
                if meta.is_dir() {
                    return Err(StatusCode::METHOD_NOT_ALLOWED.into());
                }
                if !davheaders::overwrite(req.headers()) {
                    return Err(StatusCode::PRECONDITION_FAILED.into());
                }
                if self.is_locked(&path, &tokens) {
                    debug!("PUT {path}: locked");
                    return Err(StatusCode::LOCKED.into());
                }
                true
            }
            None => {
                if !self.has_parent(&path).await {
                    return Err(StatusCode::NOT_FOUND.into());
                }
                if self.is_locked(&path.parent(), &tokens) {
                    debug!("PUT {path}: parent locked");
                    return Err(StatusCode::LOCKED.into());
                }
                false
            }
        };

        let mut file = tokio::fs::File::create(&source).await?;
        pin_utils::pin_mut!(body);
        while let Some(data) = body.data().await {
            let mut buf = data.map_err(|e| {
                DavError::IoError(io::Error::new(io::ErrorKind::UnexpectedEof, e))
            })?;
            while buf.has_remaining() {
                let chunk = buf.chunk();
                let n = chunk.len();
                file.write_all(chunk).await?;
                buf.advance(n);
            }
        }
        file.flush().await?;

        let mut res = Response::new(Body::empty());
        *res.status_mut() = if exists {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        res.headers_mut().typed_insert(headers::ContentLength(0));
        Ok(res)
    }
}
