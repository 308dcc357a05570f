//! Multistatus body for long running operations.
//!
//! The XML declaration goes out right away. While the operation runs, a
//! newline is sent every interval so that clients and proxies do not
//! give up on an idle connection. Whitespace between the declaration and
//! the root element is legal XML, so the final document stays valid.
use std::io;
use std::time::Duration;

use async_stream::stream;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use crate::body::Body;
use crate::DavResult;

const XML_DECL: &[u8] = b"<?xml version=\"1.0\" encoding=\"utf-8\"?>\n";

/// Stream the result of `task` (a multistatus document without XML
/// declaration), keeping the connection busy while it runs.
pub(crate) fn multistatus_body(task: JoinHandle<DavResult<Bytes>>, period: Duration) -> Body {
    Body::stream(stream! {
        yield Ok(Bytes::from_static(XML_DECL));
        let mut task = task;
        let mut ticker = interval_at(Instant::now() + period, period);
        let result = loop {
            let done = tokio::select! {
                res = &mut task => Some(res),
                _ = ticker.tick() => None,
            };
            match done {
                Some(res) => break res,
                None => {
                    trace!("keepalive tick");
                    yield Ok(Bytes::from_static(b"\n"));
                }
            }
        };
        match result {
            Ok(Ok(doc)) => yield Ok(doc),
            Ok(Err(e)) => {
                error!("multistatus: {e}");
                yield Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
            }
            Err(e) => {
                error!("multistatus: task failed: {e}");
                yield Err(io::Error::new(io::ErrorKind::Other, e.to_string()));
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn ticks_while_running() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_millis(120)).await;
            Ok::<_, crate::errors::DavError>(Bytes::from_static(b"<D:multistatus/>"))
        });
        let mut body = multistatus_body(task, Duration::from_millis(20));
        let mut chunks = Vec::new();
        while let Some(chunk) = body.next().await {
            chunks.push(chunk.unwrap());
        }
        assert_eq!(&chunks[0][..], XML_DECL);
        assert_eq!(&chunks.last().unwrap()[..], b"<D:multistatus/>");
        assert!(chunks[1..chunks.len() - 1].iter().all(|c| &c[..] == b"\n"));
        assert!(chunks.len() >= 3);
    }
}
