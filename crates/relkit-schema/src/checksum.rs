//! Content checksums reported by object storage and computed locally.

use md5::{Digest, Md5};
use serde::{Deserialize, Deserializer, Serialize};

/// Content checksum of one object, as a lowercase hex string.
///
/// Object stores report the MD5 of an object as its `ETag`, usually wrapped
/// in literal double quotes (`"\"5d41...\""`). A `Checksum` always holds the
/// normalised form: surrounding quotes and whitespace stripped, ASCII
/// lowercased. Two checksums are equal exactly when their normalised forms
/// are, so comparisons are quote- and case-insensitive.
///
/// # Example
///
/// ```
/// use relkit_schema::Checksum;
///
/// let remote = Checksum::from_etag("\"5D41402ABC4B2A76B9719D911017C592\"");
/// assert_eq!(remote, Checksum::md5_of(b"hello"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Normalise a checksum string reported by object storage.
    pub fn from_etag(raw: &str) -> Self {
        Self(normalize_etag(raw).to_ascii_lowercase())
    }

    /// MD5 of an in-memory buffer.
    pub fn md5_of(data: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(data)))
    }

    /// MD5 of a file, read entirely into memory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read.
    pub fn md5_file(path: &std::path::Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::md5_of(&data))
    }

    /// Return the normalised hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no checksum was reported.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for Checksum {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_etag(&s))
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Checksum {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Checksum {
    fn from(s: &str) -> Self {
        Self::from_etag(s)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self::from_etag(&s)
    }
}

/// Strip the quoting object stores put around `ETag` values.
pub fn normalize_etag(raw: &str) -> &str {
    raw.trim_matches(|c: char| c == '"' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    #[test]
    fn md5_of_hello() {
        assert_eq!(Checksum::md5_of(b"hello").as_str(), HELLO_MD5);
    }

    #[test]
    fn quoted_etag_matches_local_digest() {
        let remote = Checksum::from_etag(&format!("\"{HELLO_MD5}\""));
        assert_eq!(remote, Checksum::md5_of(b"hello"));
    }

    #[test]
    fn comparison_ignores_case_and_padding() {
        let remote = Checksum::from_etag(" \"5D41402ABC4B2A76B9719D911017C592\" ");
        assert_eq!(remote.as_str(), HELLO_MD5);
    }

    #[test]
    fn different_content_differs() {
        assert_ne!(Checksum::md5_of(b"hello"), Checksum::md5_of(b"world"));
    }

    #[test]
    fn md5_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f");
        std::fs::write(&path, "hello").unwrap();
        assert_eq!(Checksum::md5_file(&path).unwrap().as_str(), HELLO_MD5);
    }

    #[test]
    fn deserialize_normalises() {
        let c: Checksum = serde_json::from_str("\"\\\"ABC\\\"\"").unwrap();
        assert_eq!(c.as_str(), "abc");
    }
}
