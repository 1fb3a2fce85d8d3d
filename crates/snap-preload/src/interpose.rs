//! Exported C entry points.
//!
//! Each function converts its raw arguments, hands them to the shared
//! [`Preload`](snap_preload_core::Preload) and maps the result back to the
//! libc convention of a sentinel return plus `errno`.

use std::ffi::CStr;

use libc::{c_char, c_int, c_uint, gid_t, mode_t, sem_t, size_t};
use nix::errno::Errno;

use crate::preload;

#[inline]
unsafe fn set_errno(errno: Errno) {
    *libc::__errno_location() = errno as c_int;
}

/// Borrow a caller-supplied name, rejecting NULL.
#[inline]
unsafe fn name_arg<'a>(name: *const c_char) -> Option<&'a CStr> {
    if name.is_null() {
        None
    } else {
        Some(CStr::from_ptr(name))
    }
}

#[inline]
unsafe fn status(result: nix::Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_errno(e);
            -1
        }
    }
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn setgroups(size: size_t, _list: *const gid_t) -> c_int {
    status(preload().setgroups(size))
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn initgroups(user: *const c_char, group: gid_t) -> c_int {
    let user = name_arg(user).unwrap_or(c"");
    status(preload().initgroups(user, group))
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn shm_open(name: *const c_char, oflag: c_int, mode: mode_t) -> c_int {
    let Some(name) = name_arg(name) else {
        set_errno(Errno::EINVAL);
        return -1;
    };
    match preload().shm_open(name, oflag, mode) {
        Ok(fd) => fd,
        Err(e) => {
            set_errno(e);
            -1
        }
    }
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn shm_unlink(name: *const c_char) -> c_int {
    let Some(name) = name_arg(name) else {
        set_errno(Errno::EINVAL);
        return -1;
    };
    status(preload().shm_unlink(name))
}

/// `mode` and `value` are only meaningful with `O_CREAT`; callers that
/// omit them pass whatever their registers hold, which is then ignored.
#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn sem_open(
    name: *const c_char,
    oflag: c_int,
    mode: mode_t,
    value: c_uint,
) -> *mut sem_t {
    let Some(name) = name_arg(name) else {
        set_errno(Errno::EINVAL);
        return libc::SEM_FAILED;
    };
    match preload().sem_open(name, oflag, mode, value) {
        Ok(handle) => handle.as_ptr(),
        Err(e) => {
            set_errno(e.errno());
            libc::SEM_FAILED
        }
    }
}

#[cfg(target_os = "linux")]
#[no_mangle]
pub unsafe extern "C" fn sem_unlink(name: *const c_char) -> c_int {
    let Some(name) = name_arg(name) else {
        set_errno(Errno::EINVAL);
        return -1;
    };
    status(preload().sem_unlink(name))
}
