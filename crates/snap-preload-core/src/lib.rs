//! # snap-preload-core
//!
//! Logic behind the snap-preload library, independent of how it is loaded.
//!
//! A [`Preload`] bundles the per-process [`PreloadContext`] (resolved once)
//! with the captured [`Originals`] and a [`SemStore`]. The exported C
//! functions in the `snap-preload` cdylib are thin wrappers over its methods.

pub mod error;
pub mod groups;
pub mod identity;
pub mod originals;
pub mod sem;
pub mod shm;
pub mod translate;

use std::ffi::CStr;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};

use libc::{c_int, c_uint, gid_t, mode_t};
use snap_preload_config::PreloadConfig;

pub use error::{Result, SemError};
pub use identity::InstanceName;
pub use originals::{Originals, SemHandle};
pub use sem::{SemStore, ShmDirStore};

/// Per-process state, fixed once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadContext {
    instance: Option<InstanceName>,
    shm_dir: PathBuf,
}

impl PreloadContext {
    pub fn new(instance: Option<InstanceName>, shm_dir: impl Into<PathBuf>) -> Self {
        Self {
            instance,
            shm_dir: shm_dir.into(),
        }
    }

    /// Resolve the instance name as configured.
    pub fn from_config(config: &PreloadConfig) -> Self {
        Self::new(identity::resolve(config), config.shm_dir.clone())
    }

    pub fn instance(&self) -> Option<&InstanceName> {
        self.instance.as_ref()
    }

    pub fn shm_dir(&self) -> &Path {
        &self.shm_dir
    }
}

/// Everything an intercepted call needs.
pub struct Preload<O, S = ShmDirStore> {
    context: PreloadContext,
    originals: O,
    store: S,
}

impl<O: Originals> Preload<O> {
    /// Semaphores are published in the context's shm directory.
    pub fn new(context: PreloadContext, originals: O) -> Self {
        let store = ShmDirStore::new(context.shm_dir());
        Self::with_store(context, originals, store)
    }
}

impl<O: Originals, S: SemStore> Preload<O, S> {
    pub fn with_store(context: PreloadContext, originals: O, store: S) -> Self {
        Self {
            context,
            originals,
            store,
        }
    }

    pub fn context(&self) -> &PreloadContext {
        &self.context
    }

    pub fn originals(&self) -> &O {
        &self.originals
    }

    pub fn setgroups(&self, requested: usize) -> nix::Result<()> {
        groups::setgroups(&self.originals, requested)
    }

    pub fn initgroups(&self, user: &CStr, group: gid_t) -> nix::Result<()> {
        groups::initgroups(&self.originals, user, group)
    }

    pub fn shm_open(&self, name: &CStr, oflag: c_int, mode: mode_t) -> nix::Result<RawFd> {
        shm::shm_open(&self.originals, self.context.instance(), name, oflag, mode)
    }

    pub fn shm_unlink(&self, name: &CStr) -> nix::Result<()> {
        shm::shm_unlink(&self.originals, self.context.instance(), name)
    }

    pub fn sem_open(
        &self,
        name: &CStr,
        oflag: c_int,
        mode: mode_t,
        value: c_uint,
    ) -> Result<SemHandle> {
        sem::sem_open(
            &self.originals,
            &self.store,
            self.context.instance(),
            name,
            oflag,
            mode,
            value,
        )
    }

    pub fn sem_unlink(&self, name: &CStr) -> nix::Result<()> {
        sem::sem_unlink(&self.originals, self.context.instance(), name)
    }
}
