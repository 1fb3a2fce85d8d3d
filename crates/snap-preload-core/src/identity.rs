//! Snap instance name resolution.
//!
//! snapd places every application process in a scope whose name embeds the
//! instance name. On the unified (`0`) hierarchy the record looks like:
//!
//! ```text
//! 0::/user.slice/user-1000.slice/user@1000.service/app.slice/snap.<instance>.<app>-<uuid>.scope
//! ```
//!
//! Anything that does not match this shape resolves to no instance, which
//! turns name translation into a pass-through.

use std::fmt;
use std::path::Path;

use snap_preload_config::{log_identity_debug, log_identity_warn, PreloadConfig};

use crate::translate::NAMESPACE_PREFIX;

/// Longest instance name snapd hands out.
pub const MAX_INSTANCE_NAME_LEN: usize = 40;

/// Confinement identifier of the running snap instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceName(String);

impl InstanceName {
    /// Rejects empty names, names over [`MAX_INSTANCE_NAME_LEN`] bytes and
    /// names containing `.`, `/` or NUL.
    pub fn new(name: &str) -> Option<Self> {
        if name.is_empty() || name.len() > MAX_INSTANCE_NAME_LEN {
            return None;
        }
        if name.bytes().any(|b| b == b'.' || b == b'/' || b == 0) {
            return None;
        }
        Some(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InstanceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolve the instance name for this process.
///
/// An environment override wins over the cgroup record.
pub fn resolve(config: &PreloadConfig) -> Option<InstanceName> {
    if let Some(name) = &config.instance_override {
        match InstanceName::new(name) {
            Some(instance) => {
                log_identity_debug!("instance name from environment", instance = instance.as_str());
                return Some(instance);
            }
            None => {
                log_identity_warn!("ignoring invalid instance name override", value = name.as_str());
            }
        }
    }

    let instance = resolve_from_cgroup(&config.cgroup_path);
    match &instance {
        Some(instance) => {
            log_identity_debug!("instance name from cgroup", instance = instance.as_str());
        }
        None => {
            log_identity_debug!(
                "snap instance name not identified from cgroup",
                path = tracing::field::display(config.cgroup_path.display())
            );
        }
    }
    instance
}

/// Read a cgroup record and extract the instance name from it.
pub fn resolve_from_cgroup(path: &Path) -> Option<InstanceName> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            log_identity_debug!(
                "cgroup record unreadable",
                path = tracing::field::display(path.display()),
                error = tracing::field::display(&e)
            );
            return None;
        }
    };
    parse_cgroup(&contents)
}

/// Extract the instance name from the contents of a cgroup record.
pub fn parse_cgroup(contents: &str) -> Option<InstanceName> {
    let line = contents
        .lines()
        .find(|line| line.split(':').next() == Some("0"))?;

    let scope = &line[line.rfind('/')? + 1..];
    let rest = scope.strip_prefix(NAMESPACE_PREFIX)?.strip_prefix('.')?;
    let (name, _) = rest.split_once('.')?;
    InstanceName::new(name)
}
