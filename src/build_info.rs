// Values recorded by build.rs.

pub struct BuildInfo;

impl BuildInfo {
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");
    /// UTC, `YYYYMMDD.HHMMSS`
    pub const TIMESTAMP: &'static str = env!("TROGGLE_BUILD_TIMESTAMP");
    /// Short commit hash, or "unknown" outside a git checkout
    pub const COMMIT: &'static str = env!("TROGGLE_GIT_COMMIT");
    pub const TARGET: &'static str = env!("TROGGLE_TARGET");
    pub const PROFILE: &'static str = env!("TROGGLE_PROFILE");
    const DIRTY: &'static str = env!("TROGGLE_GIT_DIRTY");

    pub fn is_dirty() -> bool {
        Self::DIRTY == "1"
    }

    /// Commit hash with a `-dirty` suffix for builds from a modified tree.
    pub fn commit() -> String {
        if Self::is_dirty() {
            format!("{}-dirty", Self::COMMIT)
        } else {
            Self::COMMIT.to_string()
        }
    }

    /// One-line summary for the startup log
    pub fn summary() -> String {
        format!(
            "troggle {} (built {}, commit {}, {} {})",
            Self::VERSION,
            Self::TIMESTAMP,
            Self::commit(),
            Self::TARGET,
            Self::PROFILE
        )
    }
}
