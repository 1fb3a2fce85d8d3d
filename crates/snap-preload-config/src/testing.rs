//! Test environment abstraction for isolated testing.
//!
//! Provides `TestEnvironment` to manage:
//! - a private shm directory standing in for `/dev/shm`
//! - a writable fake `/proc/self/cgroup`
//!
//! # Usage
//!
//! ```ignore
//! use snap_preload_config::testing::TestEnvironment;
//!
//! let env = TestEnvironment::new()?;
//! env.write_cgroup("0::/user.slice/snap.myapp.myapp-1234.scope\n")?;
//! let config = env.config();
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use tempfile::TempDir;

use crate::PreloadConfig;

/// Atomic counter for unique test IDs
static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Isolated test environment with its own shm directory and cgroup file
pub struct TestEnvironment {
    /// Temporary directory (dropped on cleanup)
    _temp_dir: TempDir,
    /// Private replacement for /dev/shm
    pub shm_dir: PathBuf,
    /// Fake control-group record
    pub cgroup_path: PathBuf,
    /// Unique test ID
    pub test_id: u32,
}

impl TestEnvironment {
    /// Create a new isolated test environment
    pub fn new() -> anyhow::Result<Self> {
        let test_id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();

        let shm_dir = root.join("shm");
        std::fs::create_dir_all(&shm_dir)?;

        let cgroup_path = root.join(format!("cgroup-{}", test_id));

        Ok(Self {
            _temp_dir: temp_dir,
            shm_dir,
            cgroup_path,
            test_id,
        })
    }

    /// Replace the fake cgroup record
    pub fn write_cgroup(&self, contents: &str) -> anyhow::Result<()> {
        std::fs::write(&self.cgroup_path, contents)?;
        Ok(())
    }

    /// Write a cgroup v2 record placing the process in a scope of `instance`
    pub fn write_snap_cgroup(&self, instance: &str) -> anyhow::Result<()> {
        self.write_cgroup(&format!(
            "0::/user.slice/user-1000.slice/user@1000.service/app.slice/snap.{}.{}-{}.scope\n",
            instance, instance, self.test_id
        ))
    }

    /// Names of every entry currently in the shm directory, sorted
    pub fn shm_entries(&self) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.shm_dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    /// Config pointing at this environment's paths
    pub fn config(&self) -> PreloadConfig {
        PreloadConfig {
            cgroup_path: self.cgroup_path.clone(),
            shm_dir: self.shm_dir.clone(),
            ..PreloadConfig::default()
        }
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new().expect("Failed to create test environment")
    }
}
