use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bitflags::bitflags;
use bytes::Bytes;
use headers::Header;
use time::format_description::well_known::Rfc3339;
use time::macros::offset;

use crate::errors::DavError;
use crate::DavResult;

bitflags! {
    /// The methods the handler knows about. Also used as a set,
    /// to configure which methods are allowed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DavMethod: u32 {
        const OPTIONS = 0x0001;
        const GET = 0x0002;
        const HEAD = 0x0004;
        const PUT = 0x0008;
        const PROPFIND = 0x0010;
        const DELETE = 0x0020;
        const MOVE = 0x0040;
        const MKCOL = 0x0080;
        const COPY = 0x0100;
        const LOCK = 0x0200;
        const UNLOCK = 0x0400;

        const HTTP_RO = Self::HEAD.bits() | Self::GET.bits() | Self::OPTIONS.bits();
        const HTTP_RW = Self::HTTP_RO.bits() | Self::PUT.bits();
        const WEBDAV_RO = Self::HTTP_RO.bits() | Self::PROPFIND.bits();
        const WEBDAV_BODY = Self::PUT.bits() | Self::PROPFIND.bits() | Self::LOCK.bits();
    }
}

impl DavMethod {
    pub const WEBDAV_RW: Self = Self::all();

    /// Method names in the order they are advertised in `Allow`.
    const NAMES: [(DavMethod, &'static str); 11] = [
        (DavMethod::OPTIONS, "OPTIONS"),
        (DavMethod::GET, "GET"),
        (DavMethod::HEAD, "HEAD"),
        (DavMethod::PUT, "PUT"),
        (DavMethod::PROPFIND, "PROPFIND"),
        (DavMethod::DELETE, "DELETE"),
        (DavMethod::MOVE, "MOVE"),
        (DavMethod::MKCOL, "MKCOL"),
        (DavMethod::COPY, "COPY"),
        (DavMethod::LOCK, "LOCK"),
        (DavMethod::UNLOCK, "UNLOCK"),
    ];

    /// Comma separated list of the method names in this set.
    pub fn allow_header(&self) -> String {
        DavMethod::NAMES
            .iter()
            .filter(|(m, _)| self.contains(*m))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// translate method into our own enum. Method names are matched
// case-insensitively; this is the only place that looks at the name.
pub(crate) fn dav_method(m: &http::Method) -> DavResult<DavMethod> {
    let name = m.as_str().to_ascii_uppercase();
    DavMethod::NAMES
        .iter()
        .find(|(_, n)| *n == name)
        .map(|(m, _)| *m)
        .ok_or(DavError::UnknownDavMethod)
}

pub fn systemtime_to_offsetdatetime(t: SystemTime) -> time::OffsetDateTime {
    match t.duration_since(UNIX_EPOCH) {
        Ok(t) => time::OffsetDateTime::from_unix_timestamp(t.as_secs() as i64)
            .map(|tm| tm.to_offset(offset!(UTC)))
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH),
        Err(_) => time::OffsetDateTime::UNIX_EPOCH.to_offset(offset!(UTC)),
    }
}

pub fn systemtime_to_httpdate(t: SystemTime) -> String {
    let d = headers::Date::from(t);
    let mut v = Vec::new();
    d.encode(&mut v);
    v.first()
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned())
        .unwrap_or_default()
}

pub fn systemtime_to_rfc3339(t: SystemTime) -> String {
    // 1996-12-19T16:39:57Z
    systemtime_to_offsetdatetime(t)
        .format(&Rfc3339)
        .unwrap_or_default()
}

// A buffer that implements "Write".
#[derive(Clone)]
pub struct MemBuffer(Cursor<Vec<u8>>);

impl MemBuffer {
    pub fn new() -> MemBuffer {
        MemBuffer(Cursor::new(Vec::new()))
    }

    pub fn take(&mut self) -> Bytes {
        let buf = std::mem::take(self.0.get_mut());
        self.0.set_position(0);
        Bytes::from(buf)
    }
}

impl Write for MemBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_rfc3339() {
        assert!(systemtime_to_rfc3339(UNIX_EPOCH) == "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_httpdate() {
        let t = UNIX_EPOCH + Duration::from_secs(784111777);
        assert_eq!(systemtime_to_httpdate(t), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_method_case_insensitive() {
        let m = http::Method::from_bytes(b"propfind").unwrap();
        assert_eq!(dav_method(&m).unwrap(), DavMethod::PROPFIND);
        let m = http::Method::from_bytes(b"Lock").unwrap();
        assert_eq!(dav_method(&m).unwrap(), DavMethod::LOCK);
        let m = http::Method::from_bytes(b"PROPPATCH").unwrap();
        assert!(dav_method(&m).is_err());
    }

    #[test]
    fn test_allow_header() {
        assert_eq!(DavMethod::HTTP_RO.allow_header(), "OPTIONS, GET, HEAD");
        assert_eq!(
            DavMethod::WEBDAV_RW.allow_header(),
            "OPTIONS, GET, HEAD, PUT, PROPFIND, DELETE, MOVE, MKCOL, COPY, LOCK, UNLOCK"
        );
    }
}
