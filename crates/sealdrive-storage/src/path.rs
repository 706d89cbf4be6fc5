//! Canonical remote path convention
//!
//! The remote drive addresses everything as `<prefix>/<segments>` (default
//! prefix `disk:`). Stored records always hold the canonical form; only the
//! transport ever sees bare operator keys.

use sealdrive_core::{SealError, SealResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePathScheme {
    prefix: String,
}

impl Default for RemotePathScheme {
    fn default() -> Self {
        Self::new("disk:")
    }
}

impl RemotePathScheme {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The canonical root, e.g. `disk:/`.
    pub fn root(&self) -> String {
        format!("{}/", self.prefix)
    }

    /// Split any accepted spelling of a path into validated segments.
    ///
    /// Accepts `disk:/a/b`, `/a/b`, `a/b/` and `""` (root). Empty segments
    /// are collapsed; `.` and `..` are rejected.
    fn segments<'a>(&self, path: &'a str) -> SealResult<Vec<&'a str>> {
        let rest = path.strip_prefix(self.prefix.as_str()).unwrap_or(path);
        let mut out = Vec::new();
        for seg in rest.split('/') {
            match seg {
                "" => continue,
                "." | ".." => {
                    return Err(SealError::InvalidPath(format!(
                        "{path}: relative segment {seg:?} not allowed"
                    )))
                }
                s => out.push(s),
            }
        }
        Ok(out)
    }

    /// Canonical form of a directory: `disk:/` or `disk:/photos/2026`.
    pub fn canonical_dir(&self, dir: &str) -> SealResult<String> {
        let segs = self.segments(dir)?;
        Ok(format!("{}/{}", self.prefix, segs.join("/")))
    }

    /// Canonical form of `dir` nested under the single segment `namespace`.
    ///
    /// `dir` is read relative to the namespace, so `photos` and `disk:/photos`
    /// both become `disk:/<namespace>/photos`.
    pub fn scoped_dir(&self, namespace: &str, dir: &str) -> SealResult<String> {
        if namespace.is_empty() || namespace.contains('/') || namespace == "." || namespace == ".." {
            return Err(SealError::InvalidPath(format!(
                "{namespace:?} is not a single path component"
            )));
        }
        let segs = self.segments(dir)?;
        if segs.is_empty() {
            Ok(format!("{}/{namespace}", self.prefix))
        } else {
            Ok(format!("{}/{namespace}/{}", self.prefix, segs.join("/")))
        }
    }

    /// Whether `path` lies strictly below the canonical directory `dir`.
    pub fn is_within(&self, dir: &str, path: &str) -> bool {
        let (Ok(dir), Ok(path)) = (self.segments(dir), self.segments(path)) else {
            return false;
        };
        path.len() > dir.len() && path.starts_with(&dir)
    }

    /// Canonical path of `name` inside `dir`.
    pub fn join(&self, dir: &str, name: &str) -> SealResult<String> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(SealError::InvalidName(format!(
                "{name:?} is not a single path component"
            )));
        }
        let dir = self.canonical_dir(dir)?;
        if dir.ends_with('/') {
            Ok(format!("{dir}{name}"))
        } else {
            Ok(format!("{dir}/{name}"))
        }
    }

    /// Operator key of a file: `disk:/photos/a.jpg` → `photos/a.jpg`.
    pub fn file_key(&self, path: &str) -> SealResult<String> {
        let segs = self.segments(path)?;
        if segs.is_empty() {
            return Err(SealError::InvalidPath(format!("{path}: names no file")));
        }
        Ok(segs.join("/"))
    }

    /// Operator key of a directory, as OpenDAL lists it: `photos/`, or `/` for root.
    pub fn dir_key(&self, dir: &str) -> SealResult<String> {
        let segs = self.segments(dir)?;
        if segs.is_empty() {
            Ok("/".to_string())
        } else {
            Ok(format!("{}/", segs.join("/")))
        }
    }

    /// Canonical path for an operator key: `photos/` → `disk:/photos`.
    pub fn from_key(&self, key: &str) -> String {
        let key = key.trim_start_matches('/').trim_end_matches('/');
        format!("{}/{}", self.prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme() -> RemotePathScheme {
        RemotePathScheme::default()
    }

    #[test]
    fn test_canonical_dir_spellings() {
        let s = scheme();
        for input in ["", "/", "disk:", "disk:/", "//"] {
            assert_eq!(s.canonical_dir(input).unwrap(), "disk:/", "{input:?}");
        }
        for input in ["photos", "/photos/", "disk:/photos", "disk:photos"] {
            assert_eq!(s.canonical_dir(input).unwrap(), "disk:/photos", "{input:?}");
        }
        assert_eq!(s.canonical_dir("a//b/").unwrap(), "disk:/a/b");
    }

    #[test]
    fn test_join() {
        let s = scheme();
        assert_eq!(s.join("/", "x.encrypted").unwrap(), "disk:/x.encrypted");
        assert_eq!(s.join("disk:/photos", "x").unwrap(), "disk:/photos/x");
        assert!(matches!(s.join("/", "a/b"), Err(SealError::InvalidName(_))));
        assert!(matches!(s.join("/", ""), Err(SealError::InvalidName(_))));
    }

    #[test]
    fn test_keys() {
        let s = scheme();
        assert_eq!(s.file_key("disk:/photos/a.jpg").unwrap(), "photos/a.jpg");
        assert_eq!(s.file_key("/a.jpg").unwrap(), "a.jpg");
        assert!(s.file_key("disk:/").is_err());

        assert_eq!(s.dir_key("disk:/").unwrap(), "/");
        assert_eq!(s.dir_key("disk:/photos").unwrap(), "photos/");
    }

    #[test]
    fn test_from_key_roundtrips_with_keys() {
        let s = scheme();
        assert_eq!(s.from_key("photos/a.jpg"), "disk:/photos/a.jpg");
        assert_eq!(s.from_key("photos/"), "disk:/photos");
        assert_eq!(s.file_key(&s.from_key("photos/a.jpg")).unwrap(), "photos/a.jpg");
    }

    #[test]
    fn test_rejects_traversal() {
        let s = scheme();
        assert!(matches!(s.canonical_dir("a/../b"), Err(SealError::InvalidPath(_))));
        assert!(matches!(s.file_key("disk:/./x"), Err(SealError::InvalidPath(_))));
    }

    #[test]
    fn test_scoped_dir() {
        let s = scheme();
        assert_eq!(s.scoped_dir("7", "/").unwrap(), "disk:/7");
        assert_eq!(s.scoped_dir("7", "disk:/photos").unwrap(), "disk:/7/photos");
        assert_eq!(s.scoped_dir("7", "a//b/").unwrap(), "disk:/7/a/b");
        assert!(matches!(s.scoped_dir("..", "/"), Err(SealError::InvalidPath(_))));
        assert!(matches!(s.scoped_dir("7", "../8"), Err(SealError::InvalidPath(_))));
    }

    #[test]
    fn test_is_within() {
        let s = scheme();
        assert!(s.is_within("disk:/7", "disk:/7/a.txt"));
        assert!(s.is_within("disk:/7", "disk:/7/photos/a.jpg"));
        assert!(!s.is_within("disk:/7", "disk:/7"));
        assert!(!s.is_within("disk:/7", "disk:/70/a.txt"));
        assert!(!s.is_within("disk:/7", "disk:/8/a.txt"));
        assert!(!s.is_within("disk:/7", "disk:/7/../8/a.txt"));
        assert!(s.is_within("disk:/", "disk:/a.txt"));
    }

    #[test]
    fn test_custom_prefix() {
        let s = RemotePathScheme::new("drive:");
        assert_eq!(s.root(), "drive:/");
        assert_eq!(s.join("docs", "a").unwrap(), "drive:/docs/a");
        // A foreign prefix is just a segment
        assert_eq!(s.file_key("disk:/a").unwrap(), "disk:/a");
    }
}
