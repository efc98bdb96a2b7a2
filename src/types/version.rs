use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version of the managed binary, e.g. `v1.29.2+k0s.0`.
///
/// The leading `v` is optional when parsing and always present when
/// displayed. Equality includes build metadata, so `v1.29.1+k0s.0` and
/// `v1.29.1+k0s.1` are different releases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BinaryVersion(Version);

#[derive(Debug, Error)]
#[error("invalid version {input:?}: {reason}")]
pub struct InvalidVersion {
    pub input: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("installed binary version is {observed} not {desired}")]
pub struct VersionMismatch {
    pub observed: BinaryVersion,
    pub desired: BinaryVersion,
}

impl BinaryVersion {
    pub fn semver(&self) -> &Version {
        &self.0
    }

    /// Succeeds only when `self` is exactly the desired version.
    pub fn ensure_matches(&self, desired: &BinaryVersion) -> Result<(), VersionMismatch> {
        if self == desired {
            return Ok(());
        }

        Err(VersionMismatch {
            observed: self.clone(),
            desired: desired.clone(),
        })
    }
}

impl FromStr for BinaryVersion {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);

        Version::parse(bare)
            .map(BinaryVersion)
            .map_err(|e| InvalidVersion {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl TryFrom<String> for BinaryVersion {
    type Error = InvalidVersion;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BinaryVersion> for String {
    fn from(version: BinaryVersion) -> Self {
        version.to_string()
    }
}

impl fmt::Display for BinaryVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_and_without_prefix() {
        let a: BinaryVersion = "v1.29.1+k0s.0".parse().unwrap();
        let b: BinaryVersion = "1.29.1+k0s.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "v1.29.1+k0s.0");
    }

    #[test]
    fn test_build_metadata_is_significant() {
        let a: BinaryVersion = "v1.29.1+k0s.0".parse().unwrap();
        let b: BinaryVersion = "v1.29.1+k0s.1".parse().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_trailing_whitespace_from_command_output() {
        let v: BinaryVersion = "v1.30.0+k0s.0\n".parse().unwrap();
        assert_eq!(v.semver().minor, 30);
    }

    #[test]
    fn test_invalid_version() {
        let err = "not-a-version".parse::<BinaryVersion>().unwrap_err();
        assert_eq!(err.input, "not-a-version");
    }

    #[test]
    fn test_mismatch_names_both_versions() {
        let observed: BinaryVersion = "v1.29.1".parse().unwrap();
        let desired: BinaryVersion = "v1.29.2".parse().unwrap();

        let err = observed.ensure_matches(&desired).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("v1.29.1"));
        assert!(message.contains("v1.29.2"));
        assert!(observed.ensure_matches(&observed.clone()).is_ok());
    }

    #[test]
    fn test_serde_as_string() {
        let v: BinaryVersion = "1.28.4+k0s.0".parse().unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"v1.28.4+k0s.0\"");
        let back: BinaryVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
