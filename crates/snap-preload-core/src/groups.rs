//! Supplementary group suppression.
//!
//! The snap sandbox denies changing supplementary groups. Programs that drop
//! privileges call `setgroups`/`initgroups` and abort when it fails, so every
//! request is turned into the one call that always succeeds: clearing the
//! list.

use std::ffi::CStr;

use libc::gid_t;
use snap_preload_config::log_groups_debug;

use crate::originals::Originals;

/// Ignore the requested list and clear the supplementary groups instead.
pub fn setgroups<O: Originals + ?Sized>(originals: &O, requested: usize) -> nix::Result<()> {
    log_groups_debug!("setgroups request replaced by empty list", requested = requested);
    originals.setgroups(&[])
}

/// `initgroups` is routed through the same suppression as `setgroups`.
pub fn initgroups<O: Originals + ?Sized>(
    originals: &O,
    user: &CStr,
    group: gid_t,
) -> nix::Result<()> {
    log_groups_debug!(
        "initgroups suppressed",
        user = tracing::field::display(user.to_string_lossy()),
        group = group
    );
    setgroups(originals, 0)
}
