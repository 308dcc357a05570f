use std::fs::Metadata;

use http::{HeaderValue, Request, Response, StatusCode};

use crate::body::Body;
use crate::davheaders::{self, Depth};
use crate::davpath::DavPath;
use crate::davxml::{self, PropEntry};
use crate::fs::{self, DavMetaData};
use crate::xmltree_ext::{self, ElementExt};
use crate::DavResult;

impl crate::DavHandler {
    pub(crate) async fn handle_propfind(&self, req: &Request<()>) -> DavResult<Response<Body>> {
        let path = self.path(req);
        let source = self.source(&path);
        let meta = match fs::metadata(&source).await {
            Some(meta) => meta,
            None => return Err(StatusCode::NOT_FOUND.into()),
        };

        // a missing or unknown Depth means 0. Infinity is not walked any
        // deeper than 1.
        let depth = davheaders::depth(req.headers()).unwrap_or(Depth::Zero);
        debug!("PROPFIND {path} depth {depth:?}");

        let mut ms = davxml::multistatus();
        ms.push_element(davxml::prop_response(&self.prop_entry(&path, &meta)));

        if meta.is_dir() && depth != Depth::Zero {
            // at the protocol root, mounts shadow real entries of the same name.
            let mounts: Vec<DavPath> = if self.resolver.is_dav_root(path.as_str()) {
                self.resolver
                    .root_mounts()
                    .iter()
                    .filter_map(|m| DavPath::from_decoded(m).ok())
                    .collect()
            } else {
                Vec::new()
            };

            let mut children = Vec::new();
            for name in fs::read_dir_names(&source).await? {
                let child = path.join(&name);
                if !mounts.contains(&child) {
                    children.push(child);
                }
            }
            children.extend(mounts);

            for child in children {
                match fs::metadata(self.source(&child)).await {
                    Some(meta) => {
                        ms.push_element(davxml::prop_response(&self.prop_entry(&child, &meta)))
                    }
                    None => {
                        debug!("PROPFIND {child}: unreadable");
                        ms.push_element(davxml::status_response(
                            &child.as_url_string(),
                            StatusCode::NOT_FOUND,
                        ));
                    }
                }
            }
        }

        let mut res = Response::new(Body::from(xmltree_ext::to_bytes(&ms, true)?));
        *res.status_mut() = StatusCode::MULTI_STATUS;
        let h = res.headers_mut();
        h.insert("DAV", HeaderValue::from_static("1"));
        h.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/xml; charset=utf-8"),
        );
        Ok(res)
    }

    fn prop_entry<'a>(&self, path: &'a DavPath, meta: &Metadata) -> PropEntry<'a> {
        let collection = meta.is_dir();
        let mut href = path.as_url_string();
        if collection && !path.is_root() {
            href.push('/');
        }
        let content_type = if collection {
            None
        } else {
            let guess = mime_guess::from_path(path.file_name()).first_raw();
            Some(guess.unwrap_or("text/plain").to_string())
        };
        let lock = self
            .ls
            .token(path.as_str())
            .map(|token| (token, self.ls.timeout(path.as_str())));
        PropEntry {
            href,
            displayname: path.file_name(),
            collection,
            created: meta.creation_time(),
            modified: meta.modified_time(),
            etag: meta.etag(),
            content_type,
            length: meta.len(),
            lock,
        }
    }
}
