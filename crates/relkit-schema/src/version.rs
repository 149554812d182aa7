//! Release version identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A release version string could not be parsed.
#[derive(Debug, Error)]
#[error("invalid release version '{input}': {source}")]
pub struct VersionError {
    /// The string as given.
    pub input: String,
    /// Underlying parse failure.
    #[source]
    pub source: semver::Error,
}

/// A parsed release version such as `4.4.2` or `5.0.0-rc1`.
///
/// A leading `v` is accepted and dropped.
///
/// # Example
///
/// ```
/// use relkit_schema::ReleaseVersion;
///
/// let v = ReleaseVersion::parse("v4.4.2").unwrap();
/// assert_eq!(v.series(), "4.4");
/// assert_eq!(v.to_string(), "4.4.2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseVersion(semver::Version);

impl ReleaseVersion {
    /// Parse a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError`] if the string is not a semantic version.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
        semver::Version::parse(bare)
            .map(Self)
            .map_err(|source| VersionError {
                input: input.to_string(),
                source,
            })
    }

    /// Release series (`major.minor`), used in repository paths.
    pub fn series(&self) -> String {
        format!("{}.{}", self.0.major, self.0.minor)
    }

    /// True for release candidates and other pre-releases.
    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }

    /// Access the underlying semantic version.
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReleaseVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
