//! POSIX shared memory: translate the name, then call the real function.

use std::ffi::CStr;
use std::os::fd::RawFd;

use libc::{c_int, mode_t};
use snap_preload_config::log_shm_debug;

use crate::identity::InstanceName;
use crate::originals::Originals;
use crate::translate::translate;

pub fn shm_open<O: Originals + ?Sized>(
    originals: &O,
    instance: Option<&InstanceName>,
    name: &CStr,
    oflag: c_int,
    mode: mode_t,
) -> nix::Result<RawFd> {
    let translated = translate(instance, name);
    let result = originals.shm_open(&translated, oflag, mode);
    log_shm_debug!(
        "shm_open",
        name = tracing::field::display(translated.to_string_lossy()),
        oflag = oflag,
        ok = result.is_ok()
    );
    result
}

pub fn shm_unlink<O: Originals + ?Sized>(
    originals: &O,
    instance: Option<&InstanceName>,
    name: &CStr,
) -> nix::Result<()> {
    let translated = translate(instance, name);
    log_shm_debug!(
        "shm_unlink",
        name = tracing::field::display(translated.to_string_lossy())
    );
    originals.shm_unlink(&translated)
}
