//! Version parsing for the configuration compatibility check.

use crate::utils::errors::{ConfigError, ConfigErrorKind};

/// A `major.minor` version pair.
///
/// Only the first two components matter for the compatibility check; a
/// trailing patch number is accepted and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Major version number
    pub major: u32,
    /// Minor version number
    pub minor: u32,
}

impl Version {
    /// Create a version from its components.
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a `<major>.<minor>[.<patch>]` string.
    pub fn parse(version: &str) -> Result<Self, ConfigError> {
        let mut parts = version.trim().split('.');
        let major = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| malformed(version))?;
        let minor = parts
            .next()
            .and_then(|p| p.parse::<u32>().ok())
            .ok_or_else(|| malformed(version))?;
        if let Some(patch) = parts.next() {
            patch.parse::<u32>().map_err(|_| malformed(version))?;
        }
        if parts.next().is_some() {
            return Err(malformed(version));
        }
        Ok(Self { major, minor })
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn malformed(version: &str) -> ConfigError {
    ConfigError::new(
        ConfigErrorKind::Malformed,
        format!("version '{}' is not well formatted", version),
    )
}

/// Check that the configuration version is at least the engine version.
pub fn check_version(config_version: &str, engine_version: &str) -> Result<(), ConfigError> {
    let config = Version::parse(config_version)?;
    let engine = Version::parse(engine_version)?;
    if config < engine {
        return Err(ConfigError::new(
            ConfigErrorKind::VersionMismatch,
            format!(
                "configuration version {} is below the engine version, >= {} required",
                config, engine
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Version::parse("1.2").unwrap(), Version::new(1, 2));
        assert_eq!(Version::parse("0.9.3").unwrap(), Version::new(0, 9));
        assert!(Version::parse("1").is_err());
        assert!(Version::parse("a.b").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(Version::new(0, 1) < Version::new(0, 9));
        assert!(Version::new(1, 0) > Version::new(0, 9));
        assert!(Version::new(0, 9) == Version::new(0, 9));
    }

    #[test]
    fn test_check_version() {
        assert!(check_version("0.9.0", "0.9.0").is_ok());
        assert!(check_version("1.0.0", "0.9.0").is_ok());
        let err = check_version("0.1.0", "0.9.0").unwrap_err();
        assert_eq!(err.kind, ConfigErrorKind::VersionMismatch);
    }
}
