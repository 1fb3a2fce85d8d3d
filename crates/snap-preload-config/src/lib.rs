//! # snap-preload-config
//!
//! Configuration for the snap-preload library.
//!
//! Everything comes from the process environment at load time; nothing is
//! read from or written to disk. Variables are looked up with
//! `secure_getenv` semantics, so setuid/setgid processes ignore them.

pub mod logging;
pub mod testing;

use std::ffi::{CStr, CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;

pub use logging::LogLevel;

/// Enables diagnostic logging when set to any value.
pub const ENV_DEBUG: &str = "SNAP_PRELOAD_DEBUG";
/// Log level used once debug logging is enabled.
pub const ENV_LOG_LEVEL: &str = "SNAP_PRELOAD_LOG_LEVEL";
/// Supplies the instance name directly, bypassing the cgroup lookup.
pub const ENV_INSTANCE_NAME: &str = "SNAP_PRELOAD_INSTANCE_NAME";

pub const DEFAULT_CGROUP_PATH: &str = "/proc/self/cgroup";
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

/// Settings for one process, resolved once at library load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// Diagnostic logging to stderr
    pub debug: bool,
    /// Filter applied when `debug` is set
    pub log_level: LogLevel,
    /// Instance name supplied by the environment, if any
    pub instance_override: Option<String>,
    /// Control-group record of the current process
    pub cgroup_path: PathBuf,
    /// tmpfs directory backing POSIX shm and semaphores
    pub shm_dir: PathBuf,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: LogLevel::Debug,
            instance_override: None,
            cgroup_path: PathBuf::from(DEFAULT_CGROUP_PATH),
            shm_dir: PathBuf::from(DEFAULT_SHM_DIR),
        }
    }
}

impl PreloadConfig {
    /// Load config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(secure_getenv)
    }

    /// Load config through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<OsString>,
    {
        let mut config = Self::default();
        config.apply_env_overrides(lookup);
        config
    }

    fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<OsString>,
    {
        if lookup(ENV_DEBUG).is_some() {
            self.debug = true;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            if let Some(level) = level.to_str().and_then(LogLevel::parse) {
                self.log_level = level;
            }
        }
        if let Some(name) = lookup(ENV_INSTANCE_NAME) {
            // Non-UTF-8 can never be a valid snap name.
            if let Some(name) = name.to_str() {
                self.instance_override = Some(name.to_string());
            }
        }
    }
}

/// `getenv` that returns nothing in secure-execution (AT_SECURE) mode.
pub fn secure_getenv(name: &str) -> Option<OsString> {
    if is_secure_execution() {
        return None;
    }
    let key = CString::new(name).ok()?;
    let value = unsafe { libc::getenv(key.as_ptr()) };
    if value.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(value) }.to_bytes();
    Some(OsStr::from_bytes(bytes).to_os_string())
}

#[cfg(target_os = "linux")]
fn is_secure_execution() -> bool {
    unsafe { libc::getauxval(libc::AT_SECURE) != 0 }
}

#[cfg(not(target_os = "linux"))]
fn is_secure_execution() -> bool {
    unsafe { libc::getuid() != libc::geteuid() || libc::getgid() != libc::getegid() }
}
