use serde::Serialize;

/// Build metadata stamped into a binary by its build script
#[derive(Debug, Clone, Serialize)]
pub struct BuildInfo {
    pub build_profile: &'static str,
    pub build_features: &'static str,
    pub version: &'static str,
    pub rust_version: &'static str,
    pub build_target: &'static str,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, features: {}, {}, {})",
            self.version, self.build_profile, self.build_features, self.rust_version, self.build_target
        )
    }
}

/// Capture the calling crate's build environment
///
/// Expects `BUILD_PROFILE`, `BUILD_FEATURES`, `REPO_VERSION`, `RUST_VERSION`
/// and `BUILD_TARGET` to be set by the caller's build script; missing values
/// read as `unknown`.
#[macro_export]
macro_rules! build_info {
    () => {
        $crate::version::BuildInfo {
            build_profile: option_env!("BUILD_PROFILE").unwrap_or("unknown"),
            build_features: option_env!("BUILD_FEATURES").unwrap_or("unknown"),
            version: option_env!("REPO_VERSION").unwrap_or(env!("CARGO_PKG_VERSION")),
            rust_version: option_env!("RUST_VERSION").unwrap_or("unknown"),
            build_target: option_env!("BUILD_TARGET").unwrap_or("unknown"),
        }
    };
}

#[cfg(test)]
mod test {
    #[test]
    fn test_build_info_without_build_script() {
        let info = build_info!();
        assert_eq!(info.build_profile, "unknown");
        assert!(info.to_string().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
