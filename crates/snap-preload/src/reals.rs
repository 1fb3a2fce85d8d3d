//! Real Symbol Storage
//!
//! Captures the next definition of every overridden function with
//! `dlsym(RTLD_NEXT)` once, at load time, and exposes them as an
//! [`Originals`] capability.

use std::ffi::CStr;
use std::os::fd::RawFd;

use libc::{c_char, c_int, c_uint, c_void, gid_t, mode_t, size_t};
use nix::errno::Errno;
use snap_preload_config::log_preload_error;
use snap_preload_core::{Originals, SemHandle};

type SetGroupsFn = unsafe extern "C" fn(size_t, *const gid_t) -> c_int;
type ShmOpenFn = unsafe extern "C" fn(*const c_char, c_int, mode_t) -> c_int;
type UnlinkFn = unsafe extern "C" fn(*const c_char) -> c_int;
type SemOpenFn = unsafe extern "C" fn(*const c_char, c_int, mode_t, c_uint) -> *mut libc::sem_t;

/// Look up the definition of `name` that follows this library.
unsafe fn next_symbol(name: &CStr) -> Option<*mut c_void> {
    let f = libc::dlsym(libc::RTLD_NEXT, name.as_ptr());
    if f.is_null() {
        log_preload_error!(
            "original symbol not found",
            symbol = tracing::field::display(name.to_string_lossy())
        );
        None
    } else {
        Some(f)
    }
}

macro_rules! capture {
    ($name:literal, $t:ty) => {
        next_symbol($name).map(|f| std::mem::transmute::<*mut c_void, $t>(f))
    };
}

/// The libc implementations hidden behind our overrides.
pub struct LibcOriginals {
    setgroups: Option<SetGroupsFn>,
    shm_open: Option<ShmOpenFn>,
    shm_unlink: Option<UnlinkFn>,
    sem_open: Option<SemOpenFn>,
    sem_unlink: Option<UnlinkFn>,
}

impl LibcOriginals {
    /// Resolve every original. Missing ones abort on first use.
    pub fn capture() -> Self {
        unsafe {
            Self {
                setgroups: capture!(c"setgroups", SetGroupsFn),
                shm_open: capture!(c"shm_open", ShmOpenFn),
                shm_unlink: capture!(c"shm_unlink", UnlinkFn),
                sem_open: capture!(c"sem_open", SemOpenFn),
                sem_unlink: capture!(c"sem_unlink", UnlinkFn),
            }
        }
    }
}

fn require<F>(f: Option<F>, name: &str) -> F {
    match f {
        Some(f) => f,
        None => preload_fatal!("original `{}` could not be resolved", name),
    }
}

impl Originals for LibcOriginals {
    fn setgroups(&self, groups: &[gid_t]) -> nix::Result<()> {
        let real = require(self.setgroups, "setgroups");
        let list = if groups.is_empty() {
            std::ptr::null()
        } else {
            groups.as_ptr()
        };
        Errno::result(unsafe { real(groups.len(), list) }).map(drop)
    }

    fn shm_open(&self, name: &CStr, oflag: c_int, mode: mode_t) -> nix::Result<RawFd> {
        let real = require(self.shm_open, "shm_open");
        Errno::result(unsafe { real(name.as_ptr(), oflag, mode) })
    }

    fn shm_unlink(&self, name: &CStr) -> nix::Result<()> {
        let real = require(self.shm_unlink, "shm_unlink");
        Errno::result(unsafe { real(name.as_ptr()) }).map(drop)
    }

    fn sem_open(
        &self,
        name: &CStr,
        oflag: c_int,
        mode: mode_t,
        value: c_uint,
    ) -> nix::Result<SemHandle> {
        let real = require(self.sem_open, "sem_open");
        let sem = unsafe { real(name.as_ptr(), oflag, mode, value) };
        if sem == libc::SEM_FAILED {
            return Err(Errno::last());
        }
        SemHandle::from_raw(sem).ok_or(Errno::EINVAL)
    }

    fn sem_unlink(&self, name: &CStr) -> nix::Result<()> {
        let real = require(self.sem_unlink, "sem_unlink");
        Errno::result(unsafe { real(name.as_ptr()) }).map(drop)
    }
}
