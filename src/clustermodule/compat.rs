//! vCenter version compatibility
//!
//! The cluster modules API first shipped with vCenter 7.0.

/// Lowest vCenter major version that supports cluster modules
pub const MIN_VCENTER_MAJOR_VERSION: u64 = 7;

/// Result of checking a cluster's vCenter version
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionSupport {
    /// Version is known and supports cluster modules
    Supported,
    /// Version is known and too old
    Unsupported(String),
    /// No version reported yet
    Unknown,
}

/// Check whether the reported vCenter version supports cluster modules
///
/// Versions that cannot be parsed are treated as unsupported so the condition
/// surfaces the bad value instead of failing every module call.
pub fn check_version(version: Option<&str>) -> VersionSupport {
    let Some(version) = version.map(str::trim).filter(|v| !v.is_empty()) else {
        return VersionSupport::Unknown;
    };

    let major = version
        .trim_start_matches(['v', 'V'])
        .split('.')
        .next()
        .and_then(|m| m.parse::<u64>().ok());

    match major {
        Some(major) if major >= MIN_VCENTER_MAJOR_VERSION => VersionSupport::Supported,
        _ => VersionSupport::Unsupported(version.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::seven("7.0.0")]
    #[case::seven_update("7.0.3")]
    #[case::eight("8.0.2")]
    #[case::prefixed("v7.0")]
    fn supported_versions(#[case] version: &str) {
        assert_eq!(check_version(Some(version)), VersionSupport::Supported);
    }

    #[rstest]
    #[case::six("6.7.0")]
    #[case::garbage("latest")]
    fn unsupported_versions(#[case] version: &str) {
        assert_eq!(
            check_version(Some(version)),
            VersionSupport::Unsupported(version.to_string())
        );
    }

    #[test]
    fn missing_version_is_unknown() {
        assert_eq!(check_version(None), VersionSupport::Unknown);
        assert_eq!(check_version(Some("  ")), VersionSupport::Unknown);
    }
}
