//! Remote object descriptors and the mapping between bucket keys and local paths.

use std::path::{Path, PathBuf};

use crate::Checksum;

/// One entry in remote object storage: its key and reported checksum.
///
/// An empty key is the sentinel for "no remote file"; see [`RemoteFile::none`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct RemoteFile {
    key: String,
    checksum: Checksum,
}

impl RemoteFile {
    /// Describe a remote object. `etag` is normalised on the way in.
    pub fn new(key: impl Into<String>, etag: &str) -> Self {
        Self {
            key: key.into(),
            checksum: Checksum::from_etag(etag),
        }
    }

    /// The "no remote file" sentinel.
    pub fn none() -> Self {
        Self::default()
    }

    /// True for the sentinel.
    pub fn is_none(&self) -> bool {
        self.key.is_empty()
    }

    /// Object key within the bucket.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Checksum reported by the store.
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }
}

/// The local counterpart of a remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct LocalFile {
    /// Absolute or workspace-relative path on disk.
    pub path: PathBuf,
    /// Bucket key this path mirrors.
    pub key: String,
}

impl LocalFile {
    /// Pair a bucket key with its path under `root`.
    ///
    /// `prefix` is the part of the key that corresponds to `root` itself.
    /// Returns `None` for keys that would land outside `root`.
    pub fn for_key(root: &Path, prefix: &str, key: &str) -> Option<Self> {
        Some(Self {
            path: local_path_for_key(root, prefix, key)?,
            key: key.to_string(),
        })
    }

    /// Pair a path under `root` with its bucket key under `prefix`.
    ///
    /// Returns `None` when `path` is not inside `root`.
    pub fn for_path(root: &Path, prefix: &str, path: &Path) -> Option<Self> {
        Some(Self {
            key: key_for_path(root, prefix, path)?,
            path: path.to_path_buf(),
        })
    }
}

/// Map a bucket key to a path under `root` by replacing `prefix` with `root`.
///
/// Keys are untrusted: any `.` or `..` segment in the part below `prefix`
/// yields `None`, so the result is always inside `root`.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use relkit_schema::local_path_for_key;
///
/// let path = local_path_for_key(Path::new("/srv/repo"), "yum/7", "yum/7/x86_64/a.rpm");
/// assert_eq!(path.as_deref(), Some(Path::new("/srv/repo/x86_64/a.rpm")));
/// assert!(local_path_for_key(Path::new("/srv/repo"), "yum/7", "yum/7/../../etc").is_none());
/// ```
pub fn local_path_for_key(root: &Path, prefix: &str, key: &str) -> Option<PathBuf> {
    let prefix = prefix.trim_matches('/');
    let key = key.trim_start_matches('/');
    let relative = if prefix.is_empty() {
        key
    } else {
        match key.strip_prefix(prefix) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
            _ => key,
        }
    };

    if relative.is_empty() {
        // The key names the prefix itself; keep its last segment.
        let name = key.rsplit('/').next().unwrap_or(key);
        return is_plain_segment(name).then(|| root.join(name));
    }

    let mut path = root.to_path_buf();
    for segment in relative.split('/').filter(|segment| !segment.is_empty()) {
        if !is_plain_segment(segment) {
            return None;
        }
        path.push(segment);
    }
    Some(path)
}

/// A single path component that neither refers to the current nor the
/// parent directory, and carries no separator of its own.
fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

/// Map a path under `root` to its bucket key under `prefix`.
///
/// Returns `None` when `path` is not inside `root`.
pub fn key_for_path(root: &Path, prefix: &str, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        return None;
    }

    let prefix = prefix.trim_matches('/');
    let relative = parts.join("/");
    if prefix.is_empty() {
        Some(relative)
    } else {
        Some(format!("{prefix}/{relative}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_sentinel() {
        assert!(RemoteFile::none().is_none());
        assert!(!RemoteFile::new("a", "\"x\"").is_none());
    }

    #[test]
    fn remote_checksum_is_normalised() {
        let remote = RemoteFile::new("a", "\"ABCDEF\"");
        assert_eq!(remote.checksum().as_str(), "abcdef");
    }

    #[test]
    fn key_maps_under_root() {
        let path = local_path_for_key(Path::new("/w"), "repo/", "repo/x86_64/RPMS/a.rpm");
        assert_eq!(path.as_deref(), Some(Path::new("/w/x86_64/RPMS/a.rpm")));
    }

    #[test]
    fn empty_prefix_keeps_whole_key() {
        let path = local_path_for_key(Path::new("/w"), "", "a/b");
        assert_eq!(path.as_deref(), Some(Path::new("/w/a/b")));
    }

    #[test]
    fn key_equal_to_prefix_uses_file_name() {
        let path = local_path_for_key(Path::new("/w"), "a/b", "a/b");
        assert_eq!(path.as_deref(), Some(Path::new("/w/b")));
    }

    #[test]
    fn dot_segments_never_leave_root() {
        for key in [
            "r/../../escaped.txt",
            "r/a/../b",
            "r/./a",
            "../x",
            "r/..",
            "r/a\\..\\..\\x",
        ] {
            assert!(
                local_path_for_key(Path::new("/w/mirror"), "r", key).is_none(),
                "{key} was mapped"
            );
        }
        assert!(LocalFile::for_key(Path::new("/w"), "", "a/../../b").is_none());
    }

    #[test]
    fn dots_inside_names_are_allowed() {
        let path = local_path_for_key(Path::new("/w"), "r", "r/a..b/.hidden/x-1.0.rpm");
        assert_eq!(path.as_deref(), Some(Path::new("/w/a..b/.hidden/x-1.0.rpm")));
    }

    #[test]
    fn path_maps_back_to_key() {
        let key = key_for_path(Path::new("/w"), "/repo/", Path::new("/w/x86_64/a.rpm"));
        assert_eq!(key.as_deref(), Some("repo/x86_64/a.rpm"));
    }

    #[test]
    fn path_outside_root_has_no_key() {
        assert!(key_for_path(Path::new("/w"), "repo", Path::new("/other/a")).is_none());
        assert!(key_for_path(Path::new("/w"), "repo", Path::new("/w")).is_none());
    }

    #[test]
    fn local_file_pairs_both_ways() {
        let from_key = LocalFile::for_key(Path::new("/w"), "p", "p/a/b").unwrap();
        let from_path = LocalFile::for_path(Path::new("/w"), "p", &from_key.path).unwrap();
        assert_eq!(from_key, from_path);
    }
}
