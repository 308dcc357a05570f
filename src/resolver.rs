//! Mapping between service paths and source paths.
//!
//! A service path is what the client sees (`/dav/photos/a.jpg`), a source
//! path is where the bytes live (`/srv/files/photos/a.jpg`). Virtual mounts
//! redirect a service prefix to another real directory. Mounts are checked
//! in the order they were configured and the *last* matching mount wins.
//!
//! Nothing in here touches the filesystem.

use std::path::{Component, Path, PathBuf};

/// One virtual mount: a service prefix exposed from a real directory.
/// Both prefixes always end with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualMount {
    pub(crate) virtual_prefix: String,
    pub(crate) real_prefix: String,
}

impl VirtualMount {
    pub(crate) fn new(virtual_prefix: &str, real_prefix: &str) -> VirtualMount {
        let mut virtual_prefix = slash(virtual_prefix);
        if !virtual_prefix.starts_with('/') {
            virtual_prefix.insert(0, '/');
        }
        VirtualMount {
            virtual_prefix: with_trailing_slash(&virtual_prefix),
            real_prefix: with_trailing_slash(&slash(real_prefix)),
        }
    }

    /// The virtual prefix, e.g. `/media/`.
    pub fn virtual_prefix(&self) -> &str {
        &self.virtual_prefix
    }

    /// The real directory, e.g. `/mnt/media/`.
    pub fn real_prefix(&self) -> &str {
        &self.real_prefix
    }
}

/// Bidirectional service path <-> source path mapping.
#[derive(Debug, Clone)]
pub struct PathResolver {
    // protocol root without trailing slash; empty when it is "/".
    dav_root: String,
    // always ends with '/'.
    root_dir: String,
    mounts: Vec<VirtualMount>,
}

impl PathResolver {
    /// `root_dir` and the real side of the mounts should already be absolute.
    pub fn new(dav_root: &str, root_dir: &str, mounts: Vec<VirtualMount>) -> PathResolver {
        let mut dav_root = slash(dav_root).trim_end_matches('/').to_string();
        if !dav_root.is_empty() && !dav_root.starts_with('/') {
            dav_root.insert(0, '/');
        }
        PathResolver {
            dav_root,
            root_dir: with_trailing_slash(&slash(root_dir)),
            mounts,
        }
    }

    /// The protocol root, `/` if the whole URL space is served.
    pub fn dav_root(&self) -> &str {
        if self.dav_root.is_empty() {
            "/"
        } else {
            &self.dav_root
        }
    }

    /// The backing root directory, with a trailing `/`.
    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    /// The configured mounts, in configuration order.
    pub fn mounts(&self) -> &[VirtualMount] {
        &self.mounts
    }

    /// Does this service path fall under the protocol root.
    pub fn is_dav_path(&self, service_path: &str) -> bool {
        is_child_path(self.dav_root(), service_path)
    }

    /// Is this service path the protocol root itself.
    pub fn is_dav_root(&self, service_path: &str) -> bool {
        is_same_path(self.dav_root(), service_path)
    }

    /// Service paths of the mounts that sit directly below the protocol root.
    pub fn root_mounts(&self) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for m in &self.mounts {
            let name = m.virtual_prefix.trim_matches('/');
            if name.is_empty() || name.contains('/') {
                continue;
            }
            let path = format!("{}/{}", self.dav_root, name);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }

    /// Map a service path to the source path that backs it.
    pub fn to_source_path(&self, service_path: &str) -> String {
        let rel = match service_path.strip_prefix(&self.dav_root) {
            Some(rest) if self.is_dav_path(service_path) => rest,
            _ => service_path,
        };
        let mut rel = with_trailing_slash(rel);
        if !rel.starts_with('/') {
            rel.insert(0, '/');
        }

        // no short-circuit: the last matching mount wins.
        let mut source = None;
        for m in &self.mounts {
            if is_child_path(&m.virtual_prefix, &rel) {
                source = Some(join_path(&m.real_prefix, &rel[m.virtual_prefix.len()..]));
            }
        }
        let source = source.unwrap_or_else(|| join_path(&self.root_dir, &rel));
        trim_trailing_slash(&source)
    }

    /// Map a source path back to its service path.
    ///
    /// Returns `None` when the source path is neither inside a mount nor
    /// inside the root directory.
    pub fn to_service_path(&self, source_path: &str) -> Option<String> {
        let source = with_trailing_slash(&slash(source_path));

        let mut rel = None;
        for m in &self.mounts {
            if is_child_path(&m.real_prefix, &source) {
                rel = Some(join_path(&m.virtual_prefix, &source[m.real_prefix.len()..]));
            }
        }
        let mut rel = match rel {
            Some(rel) => rel,
            None => {
                if !is_child_path(&self.root_dir, &source) {
                    return None;
                }
                source[self.root_dir.len()..].to_string()
            }
        };
        if !rel.starts_with('/') {
            rel.insert(0, '/');
        }
        let rel = rel.trim_end_matches('/');
        if rel.is_empty() {
            Some(self.dav_root().to_string())
        } else {
            Some(format!("{}{}", self.dav_root, rel))
        }
    }
}

/// Is `child` equal to or below `parent`. `/a` and `/a/` are the same parent.
pub fn is_child_path(parent: &str, child: &str) -> bool {
    with_trailing_slash(child).starts_with(&with_trailing_slash(parent))
}

/// Do both strings name the same path, ignoring a trailing separator.
pub fn is_same_path(path1: &str, path2: &str) -> bool {
    with_trailing_slash(path1) == with_trailing_slash(path2)
}

/// Join two path fragments with exactly one separator between them.
pub fn join_path(base: &str, rest: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        rest.trim_start_matches('/')
    )
}

/// Resolve `path` against the current directory and clean up `.` and `..`
/// lexically. Symlinks are left alone.
pub(crate) fn absolute_path(path: &Path) -> PathBuf {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            c => out.push(c.as_os_str()),
        }
    }
    out
}

fn slash(path: &str) -> String {
    path.replace('\\', "/")
}

fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn trim_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(
            "/dav",
            "/srv/files",
            vec![
                VirtualMount::new("/media", "/mnt/media"),
                VirtualMount::new("/docs/", "/mnt/docs/"),
            ],
        )
    }

    #[test]
    fn child_and_same() {
        assert!(is_child_path("/a", "/a/b"));
        assert!(is_child_path("/a/", "/a/b"));
        assert!(is_child_path("/a", "/a"));
        assert!(is_child_path("/a/", "/a"));
        assert!(!is_child_path("/a", "/ab"));
        assert!(is_same_path("/a", "/a/"));
        assert!(!is_same_path("/a", "/a/b"));
    }

    #[test]
    fn source_paths() {
        let r = resolver();
        assert_eq!(r.to_source_path("/dav"), "/srv/files");
        assert_eq!(r.to_source_path("/dav/x/y.txt"), "/srv/files/x/y.txt");
        assert_eq!(r.to_source_path("/dav/media"), "/mnt/media");
        assert_eq!(r.to_source_path("/dav/media/a.mp4"), "/mnt/media/a.mp4");
        assert_eq!(r.to_source_path("/dav/mediax"), "/srv/files/mediax");
    }

    #[test]
    fn service_paths() {
        let r = resolver();
        assert_eq!(r.to_service_path("/srv/files").as_deref(), Some("/dav"));
        assert_eq!(r.to_service_path("/srv/files/x/y.txt").as_deref(), Some("/dav/x/y.txt"));
        assert_eq!(r.to_service_path("/mnt/docs/a/b").as_deref(), Some("/dav/docs/a/b"));
        assert_eq!(r.to_service_path("/etc/passwd"), None);
    }

    #[test]
    fn last_mount_wins() {
        let r = PathResolver::new(
            "/dav",
            "/srv",
            vec![
                VirtualMount::new("/m", "/first"),
                VirtualMount::new("/m/sub", "/second"),
                VirtualMount::new("/m", "/third"),
            ],
        );
        assert_eq!(r.to_source_path("/dav/m/a"), "/third/a");
        // "/m/sub" matches both the second and the third mount.
        assert_eq!(r.to_source_path("/dav/m/sub/a"), "/third/sub/a");
        assert_eq!(r.to_service_path("/third/x").as_deref(), Some("/dav/m/x"));
    }

    #[test]
    fn round_trip() {
        let r = resolver();
        for p in ["/dav", "/dav/a", "/dav/a/b c", "/dav/media", "/dav/media/x/y", "/dav/docs/z"] {
            let source = r.to_source_path(p);
            assert_eq!(r.to_service_path(&source).as_deref(), Some(p), "{p}");
        }
    }

    #[test]
    fn dav_root_slash() {
        let r = PathResolver::new("/", "/srv", vec![VirtualMount::new("m", "/mnt")]);
        assert_eq!(r.dav_root(), "/");
        assert!(r.is_dav_path("/anything"));
        assert_eq!(r.to_source_path("/"), "/srv");
        assert_eq!(r.to_source_path("/m/f"), "/mnt/f");
        assert_eq!(r.to_service_path("/srv").as_deref(), Some("/"));
        assert_eq!(r.to_service_path("/srv/a").as_deref(), Some("/a"));
        assert_eq!(r.root_mounts(), vec!["/m".to_string()]);
    }

    #[test]
    fn root_mounts_are_direct_children() {
        let r = PathResolver::new(
            "/dav",
            "/srv",
            vec![
                VirtualMount::new("/a", "/x"),
                VirtualMount::new("/a/b", "/y"),
                VirtualMount::new("/c/", "/z"),
            ],
        );
        assert_eq!(r.root_mounts(), vec!["/dav/a".to_string(), "/dav/c".to_string()]);
        assert!(r.is_dav_root("/dav/"));
        assert!(!r.is_dav_path("/davx"));
    }
}
