//! CPU architectures of repository subtrees.

/// CPU architecture of an RPM repository subtree.
///
/// The string form is the directory name used in the repository layout
/// (`<repo>/<arch>/RPMS`), which matches the RPM architecture tag.
///
/// # Example
///
/// ```
/// use relkit_schema::Arch;
///
/// let arch: Arch = "amd64".parse().unwrap();
/// assert_eq!(arch, Arch::X86_64);
/// assert_eq!(arch.as_str(), "x86_64");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    /// 64-bit x86 (`x86_64`, also accepted as `amd64`)
    X86_64,
    /// 64-bit ARM (`aarch64`, also accepted as `arm64`)
    Aarch64,
    /// Little-endian POWER (`ppc64le`)
    Ppc64le,
    /// IBM Z (`s390x`)
    S390x,
}

impl Arch {
    /// Every architecture relkit knows how to lay out.
    pub const ALL: [Self; 4] = [Self::X86_64, Self::Aarch64, Self::Ppc64le, Self::S390x];

    /// Directory / RPM tag name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            "ppc64le" => Ok(Self::Ppc64le),
            "s390x" => Ok(Self::S390x),
            _ => Err(format!("Unknown architecture: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases() {
        assert_eq!("AMD64".parse::<Arch>().unwrap(), Arch::X86_64);
        assert_eq!("arm64".parse::<Arch>().unwrap(), Arch::Aarch64);
        assert_eq!("s390x".parse::<Arch>().unwrap(), Arch::S390x);
    }

    #[test]
    fn rejects_unknown() {
        let err = "sparc".parse::<Arch>().unwrap_err();
        assert!(err.contains("sparc"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for arch in Arch::ALL {
            assert_eq!(arch.to_string().parse::<Arch>().unwrap(), arch);
        }
    }
}
