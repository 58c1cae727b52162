//! Build metadata embedded at compile time.

use std::fmt;

use serde::Serialize;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN: &str = "unknown";

/// Where this binary came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_branch: &'static str,
    /// Abbreviated commit hash.
    pub git_sha: &'static str,
    pub git_dirty: bool,
    pub built_at: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: PKG_VERSION,
            git_branch: or_unknown(option_env!("VERGEN_GIT_BRANCH")),
            git_sha: or_unknown(option_env!("VERGEN_GIT_SHA")),
            git_dirty: option_env!("VERGEN_GIT_DIRTY") == Some("true"),
            built_at: or_unknown(option_env!("VERGEN_BUILD_TIMESTAMP")),
        }
    }
}

fn or_unknown(value: Option<&'static str>) -> &'static str {
    value.unwrap_or(UNKNOWN)
}

/// `{version}+{branch}.{sha}`, with `.dirty` when the tree had uncommitted
/// changes.
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sha: String = self.git_sha.chars().take(7).collect();
        write!(f, "{}+{}.{sha}", self.version, self.git_branch)?;
        if self.git_dirty {
            f.write_str(".dirty")?;
        }
        Ok(())
    }
}

/// Full version string of the running build.
pub fn version_string() -> String {
    BuildInfo::current().to_string()
}
