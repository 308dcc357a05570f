//! Composition of the XML documents the handlers send back.
//!
//! Every document uses the `D:` prefix bound to the `DAV:` namespace.
use std::time::{Duration, SystemTime};

use xmltree::Element;

use crate::ls::token_uri;
use crate::util::{systemtime_to_httpdate, systemtime_to_rfc3339};
use crate::xmltree_ext::ElementExt;

pub(crate) const NS_DAV_URI: &str = "DAV:";

/// Properties of one resource, as reported by PROPFIND.
pub(crate) struct PropEntry<'a> {
    pub href: String,
    pub displayname: &'a str,
    pub collection: bool,
    pub created: SystemTime,
    pub modified: SystemTime,
    pub etag: String,
    pub content_type: Option<String>,
    pub length: u64,
    pub lock: Option<(String, Option<Duration>)>,
}

fn status_line(status: http::StatusCode) -> String {
    format!(
        "HTTP/1.1 {} {}",
        status.as_str(),
        status.canonical_reason().unwrap_or("")
    )
}

fn href(h: &str) -> Element {
    Element::new2("D:href").text(h)
}

/// Empty `<D:multistatus>` document root.
pub(crate) fn multistatus() -> Element {
    Element::new2("D:multistatus").ns("D", NS_DAV_URI)
}

/// `<D:response>` with a status line only.
pub(crate) fn status_response(h: &str, status: http::StatusCode) -> Element {
    let mut resp = Element::new2("D:response");
    resp.push_element(href(h));
    resp.push_element(Element::new2("D:status").text(status_line(status)));
    resp
}

/// `<D:response>` carrying the properties of one resource.
pub(crate) fn prop_response(e: &PropEntry) -> Element {
    let mut prop = Element::new2("D:prop");

    let mut rtype = Element::new2("D:resourcetype");
    if e.collection {
        rtype.push_element(Element::new2("D:collection"));
    }
    prop.push_element(rtype);
    prop.push_element(Element::new2("D:displayname").text(e.displayname));
    prop.push_element(Element::new2("D:creationdate").text(systemtime_to_rfc3339(e.created)));
    prop.push_element(
        Element::new2("D:getlastmodified").text(systemtime_to_httpdate(e.modified)),
    );
    prop.push_element(Element::new2("D:getetag").text(format!("\"{}\"", e.etag)));
    let ctype = Element::new2("D:getcontenttype");
    prop.push_element(match e.content_type {
        Some(ref t) => ctype.text(t.as_str()),
        None => ctype,
    });
    prop.push_element(Element::new2("D:getcontentlength").text(e.length.to_string()));

    if let Some((ref token, timeout)) = e.lock {
        let mut discovery = Element::new2("D:lockdiscovery");
        discovery.push_element(activelock(token, timeout));
        prop.push_element(discovery);
    }
    prop.push_element(supportedlock());

    let mut propstat = Element::new2("D:propstat");
    propstat.push_element(prop);
    propstat.push_element(Element::new2("D:status").text(status_line(http::StatusCode::OK)));

    let mut resp = Element::new2("D:response");
    resp.push_element(href(&e.href));
    resp.push_element(propstat);
    resp
}

/// `<D:activelock>` describing an exclusive write lock.
pub(crate) fn activelock(token: &str, timeout: Option<Duration>) -> Element {
    let mut scope = Element::new2("D:lockscope");
    scope.push_element(Element::new2("D:exclusive"));
    let mut ltype = Element::new2("D:locktype");
    ltype.push_element(Element::new2("D:write"));

    let mut actlock = Element::new2("D:activelock");
    actlock.push_element(scope);
    actlock.push_element(ltype);
    if let Some(t) = timeout {
        actlock.push_element(Element::new2("D:timeout").text(format!("Second-{}", t.as_secs())));
    }
    let mut locktoken = Element::new2("D:locktoken");
    locktoken.push_element(href(&token_uri(token)));
    actlock.push_element(locktoken);
    actlock
}

fn supportedlock() -> Element {
    let mut scope = Element::new2("D:lockscope");
    scope.push_element(Element::new2("D:exclusive"));
    let mut ltype = Element::new2("D:locktype");
    ltype.push_element(Element::new2("D:write"));

    let mut entry = Element::new2("D:lockentry");
    entry.push_element(scope);
    entry.push_element(ltype);

    let mut supported = Element::new2("D:supportedlock");
    supported.push_element(entry);
    supported
}

/// Body of a successful LOCK response.
pub(crate) fn lock_prop(token: &str, timeout: Option<Duration>) -> Element {
    let mut discovery = Element::new2("D:lockdiscovery");
    discovery.push_element(activelock(token, timeout));
    let mut prop = Element::new2("D:prop").ns("D", NS_DAV_URI);
    prop.push_element(discovery);
    prop
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xmltree_ext::to_bytes;

    fn render(e: &Element) -> String {
        String::from_utf8(to_bytes(e, false).unwrap().to_vec()).unwrap()
    }

    #[test]
    fn lock_document() {
        let out = render(&lock_prop("abc", Some(Duration::from_secs(300))));
        assert!(out.starts_with("<D:prop xmlns:D=\"DAV:\"><D:lockdiscovery><D:activelock>"));
        assert!(out.contains("<D:timeout>Second-300</D:timeout>"));
        assert!(out.contains("<D:locktoken><D:href>opaquelocktoken:abc</D:href></D:locktoken>"));

        assert!(!out.contains("D:depth"));

        let out = render(&lock_prop("abc", None));
        assert!(!out.contains("D:timeout"));
    }

    #[test]
    fn status_entry() {
        let mut ms = multistatus();
        ms.push_element(status_response("/dav/x", http::StatusCode::NO_CONTENT));
        let out = render(&ms);
        assert!(out.contains(
            "<D:response><D:href>/dav/x</D:href><D:status>HTTP/1.1 204 No Content</D:status></D:response>"
        ));
    }

    #[test]
    fn propfind_entry() {
        let e = PropEntry {
            href: "/dav/dir/".to_string(),
            displayname: "dir",
            collection: true,
            created: SystemTime::UNIX_EPOCH,
            modified: SystemTime::UNIX_EPOCH,
            etag: "1-0-0".to_string(),
            content_type: None,
            length: 4096,
            lock: None,
        };
        let out = render(&prop_response(&e));
        assert!(out.contains("<D:href>/dav/dir/</D:href>"));
        assert!(out.contains("<D:resourcetype><D:collection /></D:resourcetype>"));
        assert!(out.contains("<D:getetag>\"1-0-0\"</D:getetag>"));
        assert!(out.contains("<D:getlastmodified>Thu, 01 Jan 1970 00:00:00 GMT</D:getlastmodified>"));
        assert!(!out.contains("D:lockdiscovery"));
        assert!(out.contains("<D:supportedlock>"));
        assert!(out.contains("HTTP/1.1 200 OK"));
    }
}
