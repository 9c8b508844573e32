//! Helpers shared by the strata test suites.

use std::path::PathBuf;
use std::sync::Once;

use tempfile::TempDir;

static INIT: Once = Once::new();

/// Initialize tracing for test binaries. Safe to call multiple times.
///
/// Honors `RUST_LOG`; defaults to `info`. Output goes through the test
/// writer so it is captured per test.
pub fn init_tracing_for_tests() {
    INIT.call_once(|| {
        use tracing_subscriber::filter::EnvFilter;
        use tracing_subscriber::fmt;
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_test_writer()
            .try_init();
    });
}

/// Scratch directory for file round trips, removed on drop.
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Self {
        let dir = tempfile::Builder::new()
            .prefix("strata-test-")
            .tempdir()
            .expect("create scratch directory");
        Self { dir }
    }

    /// Path for `name` inside the directory. The file is not created.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for ScratchDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "auto-init")]
mod auto {
    // Run at binary init time so individual tests need not call it.
    use ctor::ctor;

    #[ctor]
    fn init() {
        super::init_tracing_for_tests();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing_for_tests();
        init_tracing_for_tests();
    }

    #[test]
    fn scratch_paths_live_under_the_directory() {
        let scratch = ScratchDir::new();
        let path = scratch.path("t.parquet");
        assert!(path.starts_with(scratch.dir.path()));
        assert!(!path.exists());
    }
}
