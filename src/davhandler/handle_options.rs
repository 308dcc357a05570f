use headers::HeaderMapExt;
use http::{HeaderValue, Request, Response};

use crate::body::Body;
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_options(&self, _req: &Request<()>) -> DavResult<Response<Body>> {
        let mut res = Response::new(Body::empty());

        let h = res.headers_mut();
        h.insert("DAV", HeaderValue::from_static("1"));
        h.typed_insert(headers::ContentLength(0));

        // every path advertises the same, configured, set of methods.
        let allow = HeaderValue::from_str(&self.allow.allow_header())
            .map_err(|_| http::StatusCode::INTERNAL_SERVER_ERROR)?;
        h.insert("allow", allow);

        Ok(res)
    }
}
