//! Build identity reported to clients and in daemon logs.
//!
//! `build.rs` emits the `VERGEN_*` variables; a build outside a git
//! checkout reports `unknown` for the git fields.

use std::fmt;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN: &str = "unknown";

/// Git metadata captured at build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    /// Full commit SHA.
    pub sha: &'static str,
    pub dirty: bool,
    /// RFC 3339 build time.
    pub built_at: &'static str,
}

/// Metadata for this binary.
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: PKG_VERSION,
        branch: option_env!("VERGEN_GIT_BRANCH").unwrap_or(UNKNOWN),
        sha: option_env!("VERGEN_GIT_SHA").unwrap_or(UNKNOWN),
        dirty: option_env!("VERGEN_GIT_DIRTY") == Some("true"),
        built_at: option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or(UNKNOWN),
    }
}

impl BuildInfo {
    /// First seven chars of the commit SHA.
    pub fn short_sha(&self) -> &'static str {
        let end = self
            .sha
            .char_indices()
            .nth(7)
            .map_or(self.sha.len(), |(i, _)| i);
        &self.sha[..end]
    }
}

/// `{version}+{branch}.{sha7}`, plus `.dirty` for a modified tree.
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}.{}", self.version, self.branch, self.short_sha())?;
        if self.dirty {
            f.write_str(".dirty")?;
        }
        Ok(())
    }
}

/// Version reported in `initialize` and the daemon's startup log,
/// e.g. `0.1.0+main.abc1234`.
pub fn version_string() -> String {
    build_info().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_package_version() {
        assert!(version_string().starts_with(PKG_VERSION));
    }

    #[test]
    fn display_formats_build_metadata() {
        let info = BuildInfo {
            version: "1.2.3",
            branch: "main",
            sha: "0123456789abcdef",
            dirty: true,
            built_at: UNKNOWN,
        };
        assert_eq!(info.to_string(), "1.2.3+main.0123456.dirty");

        let clean = BuildInfo {
            dirty: false,
            sha: UNKNOWN,
            ..info
        };
        assert_eq!(clean.to_string(), "1.2.3+main.unknown");
    }
}
