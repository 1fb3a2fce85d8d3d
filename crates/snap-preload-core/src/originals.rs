//! Capability interface over the real libc entry points.
//!
//! The preload library resolves these once at load time and hands them to
//! [`crate::Preload`]; nothing in this crate looks symbols up itself.

use std::ffi::CStr;
use std::os::fd::RawFd;
use std::ptr::NonNull;

use libc::{c_int, c_uint, gid_t, mode_t};

/// Live semaphore returned by the real `sem_open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemHandle(NonNull<libc::sem_t>);

// The pointer designates a process-shared mapping owned by libc.
unsafe impl Send for SemHandle {}
unsafe impl Sync for SemHandle {}

impl SemHandle {
    /// `None` for null (and therefore for `SEM_FAILED`, which is null on Linux).
    pub fn from_raw(ptr: *mut libc::sem_t) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(&self) -> *mut libc::sem_t {
        self.0.as_ptr()
    }
}

/// The non-intercepted implementations of every overridden entry point.
///
/// Errors are the errno the real call left behind.
pub trait Originals: Send + Sync {
    fn setgroups(&self, groups: &[gid_t]) -> nix::Result<()>;

    fn shm_open(&self, name: &CStr, oflag: c_int, mode: mode_t) -> nix::Result<RawFd>;

    fn shm_unlink(&self, name: &CStr) -> nix::Result<()>;

    /// `mode` and `value` are only meaningful with `O_CREAT`.
    fn sem_open(
        &self,
        name: &CStr,
        oflag: c_int,
        mode: mode_t,
        value: c_uint,
    ) -> nix::Result<SemHandle>;

    fn sem_unlink(&self, name: &CStr) -> nix::Result<()>;
}
