//! Parsing of the request headers the protocol engine looks at.
use std::time::Duration;

use http::HeaderMap;
use regex::Regex;

use crate::davpath::DavPath;
use crate::errors::DavError;
use crate::DavResult;

lazy_static! {
    static ref RE_TIMEOUT: Regex = Regex::new(r"(?i)^second-(\d+)$").unwrap();
    static ref RE_RANGE: Regex = Regex::new(r"^(\d*)-(\d*)$").unwrap();
    static ref RE_TAGGED: Regex = Regex::new(r"<([^>]*)>").unwrap();
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| s.trim())
}

/// The `Depth` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Depth {
    Zero,
    One,
    Infinity,
}

/// `None` if the header is absent or has an unknown value.
pub(crate) fn depth(headers: &HeaderMap) -> Option<Depth> {
    match header_str(headers, "depth")?.to_ascii_lowercase().as_str() {
        "0" => Some(Depth::Zero),
        "1" => Some(Depth::One),
        "infinity" => Some(Depth::Infinity),
        _ => None,
    }
}

/// `Overwrite: F` (any case) forbids overwriting. Anything else allows it.
pub(crate) fn overwrite(headers: &HeaderMap) -> bool {
    !matches!(header_str(headers, "overwrite"), Some(v) if v.eq_ignore_ascii_case("f"))
}

/// `Timeout: Second-<n>`. Only the first entry of a list is looked at;
/// `Infinite`, zero and garbage all mean "no timeout".
pub(crate) fn timeout(headers: &HeaderMap) -> Option<Duration> {
    let first = header_str(headers, "timeout")?.split(',').next()?.trim();
    let secs: u64 = RE_TIMEOUT.captures(first)?.get(1)?.as_str().parse().ok()?;
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}

/// Lock tokens the client presents: the entries of `Lock-Token` plus
/// every `<...>` tag of the `If` header.
pub(crate) fn lock_tokens(headers: &HeaderMap) -> Vec<String> {
    let mut tokens = Vec::new();
    for v in headers.get_all("lock-token").iter() {
        if let Ok(v) = v.to_str() {
            tokens.extend(
                v.split(',')
                    .map(|t| t.trim())
                    .filter(|t| !t.is_empty())
                    .map(|t| t.to_string()),
            );
        }
    }
    for v in headers.get_all("if").iter() {
        if let Ok(v) = v.to_str() {
            tokens.extend(RE_TAGGED.captures_iter(v).map(|c| c[1].trim().to_string()));
        }
    }
    tokens
}

/// The `Destination` header, decoded to a service path.
pub(crate) fn destination(headers: &HeaderMap) -> DavResult<DavPath> {
    let dest = header_str(headers, "destination").ok_or(DavError::Status(
        http::StatusCode::BAD_REQUEST,
    ))?;
    if dest.starts_with('/') {
        DavPath::from_encoded(dest)
    } else {
        DavPath::from_url(dest)
    }
}

/// A single `Range: bytes=start-end`. Either side may be left open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ByteRange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

impl ByteRange {
    /// Resolve against the length of the file, giving an inclusive
    /// `(first, last)` pair, or `None` if the range is not satisfiable.
    pub fn resolve(&self, len: u64) -> Option<(u64, u64)> {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s <= e && e < len => Some((s, e)),
            (Some(s), None) if s < len => Some((s, len - 1)),
            (None, Some(n)) if n > 0 && len > 0 => Some((len - n.min(len), len - 1)),
            _ => None,
        }
    }
}

/// `None` if there is no `Range` header, or it cannot be parsed
/// (in which case the whole file is served). Only the first range of a
/// list is used.
pub(crate) fn range(headers: &HeaderMap) -> Option<ByteRange> {
    let v = header_str(headers, "range")?;
    let spec = v.strip_prefix("bytes=")?.split(',').next()?.trim();
    let caps = RE_RANGE.captures(spec)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
    let (start, end) = (num(1), num(2));
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(ByteRange { start, end })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(name, value.parse().unwrap());
        h
    }

    #[test]
    fn test_depth() {
        assert_eq!(depth(&HeaderMap::new()), None);
        assert_eq!(depth(&headers("depth", "0")), Some(Depth::Zero));
        assert_eq!(depth(&headers("depth", "1")), Some(Depth::One));
        assert_eq!(depth(&headers("depth", "Infinity")), Some(Depth::Infinity));
        assert_eq!(depth(&headers("depth", "2")), None);
    }

    #[test]
    fn test_overwrite() {
        assert!(overwrite(&HeaderMap::new()));
        assert!(overwrite(&headers("overwrite", "T")));
        assert!(!overwrite(&headers("overwrite", "F")));
        assert!(!overwrite(&headers("overwrite", "f")));
    }

    #[test]
    fn test_timeout() {
        assert_eq!(timeout(&headers("timeout", "Second-300")), Some(Duration::from_secs(300)));
        assert_eq!(timeout(&headers("timeout", "second-5, Infinite")), Some(Duration::from_secs(5)));
        assert_eq!(timeout(&headers("timeout", "Infinite")), None);
        assert_eq!(timeout(&headers("timeout", "Second-0")), None);
        assert_eq!(timeout(&HeaderMap::new()), None);
    }

    #[test]
    fn test_lock_tokens() {
        let h = headers("lock-token", "<opaquelocktoken:a>, b");
        assert_eq!(lock_tokens(&h), vec!["<opaquelocktoken:a>", "b"]);
        let h = headers("if", "</dav/x> (<opaquelocktoken:c> [\"etag\"])");
        assert_eq!(lock_tokens(&h), vec!["/dav/x", "opaquelocktoken:c"]);
        assert!(lock_tokens(&HeaderMap::new()).is_empty());
    }

    #[test]
    fn test_destination() {
        let h = headers("destination", "http://localhost:3000/dav/a%20b.txt");
        assert_eq!(destination(&h).unwrap().as_str(), "/dav/a b.txt");
        let h = headers("destination", "/dav/x/");
        assert_eq!(destination(&h).unwrap().as_str(), "/dav/x");
        assert!(destination(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_range() {
        let r = range(&headers("range", "bytes=0-")).unwrap();
        assert_eq!(r.resolve(10), Some((0, 9)));
        let r = range(&headers("range", "bytes=2-4, 6-7")).unwrap();
        assert_eq!(r.resolve(10), Some((2, 4)));
        assert_eq!(r.resolve(4), None);
        let r = range(&headers("range", "bytes=-3")).unwrap();
        assert_eq!(r.resolve(10), Some((7, 9)));
        assert_eq!(r.resolve(2), Some((0, 1)));
        let r = range(&headers("range", "bytes=5-")).unwrap();
        assert_eq!(r.resolve(5), None);
        assert_eq!(range(&headers("range", "bytes=-")), None);
        assert_eq!(range(&headers("range", "items=0-1")), None);
        assert_eq!(range(&HeaderMap::new()), None);
    }
}
