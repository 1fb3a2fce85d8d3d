//! # snap-preload
//!
//! LD_PRELOAD library for applications running under snap confinement.
//!
//! Group changes become "drop all supplementary groups", and POSIX shared
//! memory and semaphore names are moved into the snap instance's namespace.
//! Named semaphores are created outside of libc so that the object shows up
//! fully initialized or not at all.

// Exported functions are C ABI; their contract is the libc one.
#![allow(clippy::missing_safety_doc)]

// Macros must be defined before modules that use them
#[macro_use]
pub mod macros;

pub mod interpose;
pub mod reals;

use once_cell::sync::OnceCell;
use snap_preload_config::logging::init_logging;
use snap_preload_config::{log_preload_debug, PreloadConfig};
use snap_preload_core::{Preload, PreloadContext};

use crate::reals::LibcOriginals;

static PRELOAD: OnceCell<Preload<LibcOriginals>> = OnceCell::new();

fn init() -> Preload<LibcOriginals> {
    let config = PreloadConfig::from_env();
    if config.debug {
        init_logging(config.log_level);
    }
    let context = PreloadContext::from_config(&config);
    log_preload_debug!(
        "preload initialized",
        instance = tracing::field::debug(context.instance().map(|i| i.as_str())),
        shm_dir = tracing::field::display(context.shm_dir().display())
    );
    Preload::new(context, LibcOriginals::capture())
}

/// Process-wide state. Normally built by the load-time constructor; a call
/// that arrives earlier (from another library's constructor) builds it here.
pub(crate) fn preload() -> &'static Preload<LibcOriginals> {
    PRELOAD.get_or_init(init)
}

/// Resolve identity and capture originals as soon as the library is loaded.
#[cfg(target_os = "linux")]
#[link_section = ".init_array"]
#[used]
pub static SNAP_PRELOAD_INIT: unsafe extern "C" fn() = {
    unsafe extern "C" fn snap_preload_init() {
        let _ = preload();
    }
    snap_preload_init
};
