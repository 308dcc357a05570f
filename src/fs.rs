//! Local filesystem access.
//!
//! Everything in here works on source paths, i.e. after the resolver has
//! mapped a service path onto the backing storage.

use std::io;
#[cfg(unix)]
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_stream::stream;
use bytes::{Bytes, BytesMut};
use futures_util::future::BoxFuture;
use futures_util::stream::Stream;
use futures_util::FutureExt;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Properties derived from file metadata.
pub(crate) trait DavMetaData {
    /// `<inode>-<create time ms>-<modify time ms>`.
    fn etag(&self) -> String;
    /// Creation time, falling back to the modification time.
    fn creation_time(&self) -> SystemTime;
    fn modified_time(&self) -> SystemTime;
}

fn millis(t: SystemTime) -> u128 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

impl DavMetaData for std::fs::Metadata {
    fn etag(&self) -> String {
        #[cfg(unix)]
        let ino = self.ino();
        #[cfg(not(unix))]
        let ino = 0u64;
        format!(
            "{}-{}-{}",
            ino,
            millis(self.creation_time()),
            millis(self.modified_time())
        )
    }

    fn creation_time(&self) -> SystemTime {
        if let Ok(t) = self.created() {
            return t;
        }
        #[cfg(unix)]
        if self.ctime() >= 0 {
            return UNIX_EPOCH
                + Duration::new(self.ctime() as u64, self.ctime_nsec().max(0) as u32);
        }
        self.modified_time()
    }

    fn modified_time(&self) -> SystemTime {
        self.modified().unwrap_or(UNIX_EPOCH)
    }
}

pub(crate) async fn metadata(path: impl AsRef<Path>) -> Option<std::fs::Metadata> {
    tokio::fs::metadata(path).await.ok()
}

pub(crate) async fn is_dir(path: impl AsRef<Path>) -> bool {
    metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// Names of the entries of a directory, in the order the OS returns them.
pub(crate) async fn read_dir_names(path: impl AsRef<Path>) -> io::Result<Vec<String>> {
    trace!("FS: read_dir {:?}", path.as_ref());
    let mut read_dir = tokio::fs::read_dir(path).await?;
    let mut names = Vec::new();
    while let Some(entry) = read_dir.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Stream `count` bytes of a file, starting at `start`.
pub(crate) async fn read_stream(
    path: PathBuf,
    start: u64,
    count: u64,
    buf_size: usize,
) -> io::Result<impl Stream<Item = io::Result<Bytes>> + Send + 'static> {
    let mut file = tokio::fs::File::open(path).await?;
    if start > 0 {
        file.seek(io::SeekFrom::Start(start)).await?;
    }
    let mut file = file.take(count);
    Ok(stream! {
        loop {
            let mut buf = BytesMut::with_capacity(buf_size);
            match file.read_buf(&mut buf).await {
                Ok(0) => break,
                Ok(_) => yield Ok(buf.freeze()),
                Err(e) => {
                    yield Err(e);
                    break;
                }
            }
        }
    })
}

/// Remove a directory tree. Every removed path is pushed onto `removed`,
/// children before their parent. On error, whatever was removed so far
/// stays removed.
pub(crate) fn remove_tree<'a>(
    path: &'a Path,
    removed: &'a mut Vec<PathBuf>,
) -> BoxFuture<'a, io::Result<()>> {
    async move {
        let mut read_dir = tokio::fs::read_dir(path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let child = entry.path();
            if entry.file_type().await?.is_dir() {
                remove_tree(&child, removed).await?;
            } else {
                trace!("FS: remove_file {child:?}");
                tokio::fs::remove_file(&child).await?;
                removed.push(child);
            }
        }
        trace!("FS: remove_dir {path:?}");
        tokio::fs::remove_dir(path).await?;
        removed.push(path.to_path_buf());
        Ok(())
    }
    .boxed()
}

/// Copy a directory tree. `to` must not exist.
pub(crate) fn copy_tree<'a>(from: &'a Path, to: &'a Path) -> BoxFuture<'a, io::Result<()>> {
    async move {
        tokio::fs::create_dir(to).await?;
        let mut read_dir = tokio::fs::read_dir(from).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let dest = to.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                copy_tree(&entry.path(), &dest).await?;
            } else {
                tokio::fs::copy(entry.path(), &dest).await?;
            }
        }
        Ok(())
    }
    .boxed()
}

/// Rename, falling back to copy-and-remove when source and destination
/// live on different filesystems.
pub(crate) async fn rename(from: &Path, to: &Path) -> io::Result<()> {
    trace!("FS: rename {from:?} {to:?}");
    match tokio::fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(libc::EXDEV) => {
            debug!("rename {from:?} {to:?}: cross-device, copying");
            if is_dir(from).await {
                copy_tree(from, to).await?;
                tokio::fs::remove_dir_all(from).await
            } else {
                tokio::fs::copy(from, to).await?;
                tokio::fs::remove_file(from).await
            }
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn remove_tree_lists_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let top = tmp.path().join("top");
        std::fs::create_dir_all(top.join("sub/deeper")).unwrap();
        std::fs::write(top.join("a.txt"), b"a").unwrap();
        std::fs::write(top.join("sub/b.txt"), b"b").unwrap();

        let mut removed = Vec::new();
        remove_tree(&top, &mut removed).await.unwrap();
        assert_eq!(removed.len(), 5);
        assert_eq!(removed.last(), Some(&top));
        assert!(!top.exists());
    }

    #[tokio::test]
    async fn ranged_read() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("f");
        std::fs::write(&f, b"0123456789").unwrap();
        let mut data = Vec::new();
        let mut s = Box::pin(read_stream(f.clone(), 3, 4, 2).await.unwrap());
        while let Some(chunk) = s.next().await {
            data.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(data, b"3456");
    }

    #[tokio::test]
    async fn etag_format() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("f");
        std::fs::write(&f, b"x").unwrap();
        let meta = metadata(&f).await.unwrap();
        let etag = meta.etag();
        assert_eq!(etag.split('-').count(), 3);
        assert!(etag.split('-').all(|p| p.parse::<u128>().is_ok()));
    }
}
