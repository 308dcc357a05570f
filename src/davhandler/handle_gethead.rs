use std::fs::Metadata;

use headers::HeaderMapExt;
use http::{HeaderMap, HeaderValue, Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders;
use crate::davpath::DavPath;
use crate::fs::{self, DavMetaData};
use crate::DavResult;

// Headers GET and HEAD have in common.
fn meta_headers(h: &mut HeaderMap, meta: &Metadata) {
    h.typed_insert(headers::LastModified::from(meta.modified_time()));
    if let Ok(etag) = HeaderValue::from_str(&format!("\"{}\"", meta.etag())) {
        h.insert(http::header::ETAG, etag);
    }
}

fn content_type(path: &DavPath) -> headers::ContentType {
    headers::ContentType::from(mime_guess::from_path(path.file_name()).first_or_octet_stream())
}

impl crate::DavHandler {
    pub(crate) async fn handle_head(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let meta = match fs::metadata(self.source(&path)).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };

        let mut res = Response::new(Body::empty());
        let h = res.headers_mut();
        if meta.is_dir() {
            h.typed_insert(headers::ContentLength(0));
        } else {
            h.typed_insert(content_type(&path));
            h.typed_insert(headers::ContentLength(meta.len()));
        }
        if let Ok(allow) = HeaderValue::from_str(&self.allow.allow_header()) {
            h.insert("allow", allow);
        }
        meta_headers(h, &meta);
        Ok(res)
    }

    pub(crate) async fn handle_get(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let source = self.source(&path);
        let meta = match fs::metadata(&source).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };
        if meta.is_dir() {
            debug!("GET {path}: is a collection");
            return Err(StatusCode::METHOD_NOT_ALLOWED.into());
        }

        let len = meta.len();
        let mut res = Response::new(Body::empty());
        let (start, count) = match davheaders::range(req.headers()) {
            Some(range) => match range.resolve(len) {
                Some((first, last)) => {
                    *res.status_mut() = StatusCode::PARTIAL_CONTENT;
                    let cr = format!("bytes {first}-{last}/{len}");
                    if let Ok(cr) = HeaderValue::from_str(&cr) {
                        res.headers_mut().insert(http::header::CONTENT_RANGE, cr);
                    }
                    (first, last - first + 1)
                }
                None => {
                    debug!("GET {path}: range {range:?} not satisfiable for {len} bytes");
                    *res.status_mut() = StatusCode::RANGE_NOT_SATISFIABLE;
                    let h = res.headers_mut();
                    if let Ok(cr) = HeaderValue::from_str(&format!("bytes */{len}")) {
                        h.insert(http::header::CONTENT_RANGE, cr);
                    }
                    h.typed_insert(headers::ContentLength(0));
                    return Ok(res);
                }
            },
            None => (0, len),
        };

        let h = res.headers_mut();
        h.typed_insert(content_type(&path));
        h.typed_insert(headers::ContentLength(count));
        h.typed_insert(headers::AcceptRanges::bytes());
        meta_headers(h, &meta);

        let stream = fs::read_stream(source, start, count, self.read_buf_size).await?;
        *res.body_mut() = Body::stream(stream);
        Ok(res)
    }
}
