/**
 * Canonicalized resource paths.
 *
 * The object store has no directories of its own — a "collection" is a
 * convention: any path ending in `/` is treated as one. `NormalizedPath`
 * is the single place that convention is enforced so the rest of the
 * crate can compare, nest and prefix-match paths without re-deriving it.
 */
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    /// Builds a normalized path from a raw request path (already
    /// percent-decoded). Collapses repeated slashes, strips `.`/`..`
    /// segments are rejected rather than resolved (the WebDAV surface
    /// never needs `..` traversal), and ensures a single leading slash.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err("path traversal segment '..' is not allowed".to_string()),
                other => segments.push(other),
            }
        }

        let is_collection = raw.ends_with('/') || raw.is_empty();
        let mut normalized = String::from("/");
        normalized.push_str(&segments.join("/"));
        if is_collection && normalized != "/" {
            normalized.push('/');
        }

        Ok(Self(normalized))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn is_collection(&self) -> bool {
        self.0.ends_with('/')
    }

    /// The last path segment, without trailing slash. `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches('/');
        trimmed.rsplit('/').next()
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let trimmed = self.0.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(Self(format!("{}/", &trimmed[..idx]))),
            None => Some(Self::root()),
        }
    }

    /// Joins a child segment onto this path, which must be a collection.
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_matches('/');
        if self.is_root() {
            Self(format!("/{}", child))
        } else {
            Self(format!("{}{}", self.0, child))
        }
    }

    /// True if `self` is `other` or an ancestor collection of `other`.
    pub fn starts_with(&self, other: &NormalizedPath) -> bool {
        if self.0 == other.0 {
            return true;
        }
        other.is_collection() && self.0.starts_with(other.0.as_str())
    }

    pub fn as_collection(&self) -> Self {
        if self.is_collection() {
            self.clone()
        } else {
            Self(format!("{}/", self.0))
        }
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_root() {
        assert_eq!(NormalizedPath::parse("/").unwrap().as_str(), "/");
        assert_eq!(NormalizedPath::parse("").unwrap().as_str(), "/");
    }

    #[test]
    fn collapses_repeated_slashes() {
        let p = NormalizedPath::parse("//foo///bar").unwrap();
        assert_eq!(p.as_str(), "/foo/bar");
    }

    #[test]
    fn preserves_collection_marker() {
        let p = NormalizedPath::parse("/foo/bar/").unwrap();
        assert!(p.is_collection());
        assert_eq!(p.as_str(), "/foo/bar/");
    }

    #[test]
    fn rejects_dotdot() {
        assert!(NormalizedPath::parse("/foo/../bar").is_err());
    }

    #[test]
    fn file_name_and_parent() {
        let p = NormalizedPath::parse("/a/b/c.txt").unwrap();
        assert_eq!(p.file_name(), Some("c.txt"));
        assert_eq!(p.parent().unwrap().as_str(), "/a/b/");
    }

    #[test]
    fn parent_of_top_level_is_root() {
        let p = NormalizedPath::parse("/a.txt").unwrap();
        assert_eq!(p.parent().unwrap(), NormalizedPath::root());
    }

    #[test]
    fn starts_with_ancestor() {
        let parent = NormalizedPath::parse("/a/b/").unwrap();
        let child = NormalizedPath::parse("/a/b/c.txt").unwrap();
        assert!(parent.starts_with(&parent));
        assert!(child.starts_with(&parent));
        assert!(!parent.starts_with(&child));
    }

    #[test]
    fn non_collection_does_not_prefix_match() {
        let a = NormalizedPath::parse("/a/bcd").unwrap();
        let b = NormalizedPath::parse("/a/b").unwrap();
        assert!(!a.starts_with(&b));
    }
}
