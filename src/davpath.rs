//! Service paths: the decoded, normalized path a client sees.
//!
//! A `DavPath` is built from the request URI (or from the `Destination`
//! header). Percent-encoding is decoded per segment, `.` and `..` are
//! resolved, and a path that tries to climb above `/` is refused.
//! The result always starts with `/` and never ends with `/` unless it
//! is the root itself.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::errors::DavError;

// Encode everything that `encodeURIComponent` would, path segment by path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A decoded, normalized service path.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DavPath(String);

impl DavPath {
    /// The root path `/`.
    pub fn root() -> DavPath {
        DavPath("/".to_string())
    }

    /// Decode and normalize the path part of a URI (or of a full URL).
    pub fn from_uri(uri: &http::Uri) -> Result<DavPath, DavError> {
        DavPath::from_encoded(uri.path())
    }

    /// Decode the path of an absolute URL, as found in the `Destination` header.
    pub fn from_url(url: &str) -> Result<DavPath, DavError> {
        let url = url::Url::parse(url).map_err(|_| DavError::InvalidPath)?;
        DavPath::from_encoded(url.path())
    }

    /// Decode and normalize a percent-encoded path.
    pub fn from_encoded(path: &str) -> Result<DavPath, DavError> {
        let path = path.split('?').next().unwrap_or_default();
        if !path.starts_with('/') {
            return Err(DavError::InvalidPath);
        }
        let mut segments = Vec::new();
        for seg in path.split('/') {
            let seg = percent_decode_str(seg)
                .decode_utf8()
                .map_err(|_| DavError::InvalidPath)?;
            segments.push(seg.into_owned());
        }
        DavPath::normalize(segments)
    }

    /// Normalize an already decoded path.
    pub fn from_decoded(path: &str) -> Result<DavPath, DavError> {
        if !path.starts_with('/') {
            return Err(DavError::InvalidPath);
        }
        DavPath::normalize(path.split('/').map(|s| s.to_string()).collect())
    }

    fn normalize(input: Vec<String>) -> Result<DavPath, DavError> {
        let mut segments: Vec<String> = Vec::new();
        for seg in input {
            if seg.contains('\0') || seg.contains('/') || seg.contains('\\') {
                return Err(DavError::InvalidPath);
            }
            match seg.as_str() {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(DavError::ForbiddenPath);
                    }
                }
                _ => segments.push(seg),
            }
        }
        Ok(DavPath(format!("/{}", segments.join("/"))))
    }

    /// The decoded path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percent-encoded form, suitable for a `href`.
    pub fn as_url_string(&self) -> String {
        self.0
            .split('/')
            .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Is this the root path `/`.
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// The parent path. The parent of `/` is `/`.
    pub fn parent(&self) -> DavPath {
        match self.0.rfind('/') {
            Some(0) | None => DavPath::root(),
            Some(idx) => DavPath(self.0[..idx].to_string()),
        }
    }

    /// Append one segment.
    pub fn join(&self, name: &str) -> DavPath {
        if self.is_root() {
            DavPath(format!("/{name}"))
        } else {
            DavPath(format!("{}/{}", self.0, name))
        }
    }

    /// The last segment, or `/` for the root.
    pub fn file_name(&self) -> &str {
        match self.0.rsplit('/').next() {
            Some("") | None => "/",
            Some(name) => name,
        }
    }
}

impl fmt::Display for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for DavPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl AsRef<str> for DavPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
