//! Shared test doubles: a recording `Originals` and a fault-injecting store.

#![allow(dead_code)]

use std::ffi::{CStr, CString, OsStr};
use std::io;
use std::os::fd::RawFd;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::Mutex;

use libc::{c_int, c_uint, gid_t, mode_t};
use nix::errno::Errno;
use snap_preload_core::sem::{semaphore_file_name, SemaphoreImage};
use snap_preload_core::{Originals, SemHandle, SemStore, ShmDirStore};
use tempfile::NamedTempFile;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    SetGroups(usize),
    ShmOpen(CString, c_int, mode_t),
    ShmUnlink(CString),
    SemOpen(CString, c_int),
    SemUnlink(CString),
}

/// Stands in for libc. `sem_open` succeeds only when the semaphore file is
/// present in `shm_dir`, like glibc's open-existing path.
pub struct FakeOriginals {
    shm_dir: PathBuf,
    calls: Mutex<Vec<Call>>,
    sem_open_error: Option<Errno>,
    shm_error: Option<Errno>,
}

impl FakeOriginals {
    pub fn new(shm_dir: &Path) -> Self {
        Self {
            shm_dir: shm_dir.to_path_buf(),
            calls: Mutex::new(Vec::new()),
            sem_open_error: None,
            shm_error: None,
        }
    }

    pub fn failing_sem_open(mut self, errno: Errno) -> Self {
        self.sem_open_error = Some(errno);
        self
    }

    pub fn failing_shm(mut self, errno: Errno) -> Self {
        self.shm_error = Some(errno);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Originals for FakeOriginals {
    fn setgroups(&self, groups: &[gid_t]) -> nix::Result<()> {
        self.record(Call::SetGroups(groups.len()));
        Ok(())
    }

    fn shm_open(&self, name: &CStr, oflag: c_int, mode: mode_t) -> nix::Result<RawFd> {
        self.record(Call::ShmOpen(name.to_owned(), oflag, mode));
        match self.shm_error {
            Some(errno) => Err(errno),
            None => Ok(42),
        }
    }

    fn shm_unlink(&self, name: &CStr) -> nix::Result<()> {
        self.record(Call::ShmUnlink(name.to_owned()));
        match self.shm_error {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn sem_open(
        &self,
        name: &CStr,
        oflag: c_int,
        _mode: mode_t,
        _value: c_uint,
    ) -> nix::Result<SemHandle> {
        self.record(Call::SemOpen(name.to_owned(), oflag));
        if let Some(errno) = self.sem_open_error {
            return Err(errno);
        }
        if oflag & libc::O_CREAT == 0 && !self.shm_dir.join(semaphore_file_name(name)).exists() {
            return Err(Errno::ENOENT);
        }
        // Never dereferenced by the code under test.
        Ok(SemHandle::from_raw(NonNull::<libc::sem_t>::dangling().as_ptr()).unwrap())
    }

    fn sem_unlink(&self, name: &CStr) -> nix::Result<()> {
        self.record(Call::SemUnlink(name.to_owned()));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Stage,
    Initialize,
    Publish,
}

/// Real shm-directory store that fails one chosen step.
pub struct FaultyStore {
    inner: ShmDirStore,
    fault: Fault,
    errno: c_int,
}

impl FaultyStore {
    pub fn new(dir: &Path, fault: Fault, errno: c_int) -> Self {
        Self {
            inner: ShmDirStore::new(dir),
            fault,
            errno,
        }
    }

    fn fail(&self, step: Fault) -> io::Result<()> {
        if self.fault == step {
            Err(io::Error::from_raw_os_error(self.errno))
        } else {
            Ok(())
        }
    }
}

impl SemStore for FaultyStore {
    fn dir(&self) -> &Path {
        self.inner.dir()
    }

    fn stage(&self, prefix: &str) -> io::Result<NamedTempFile> {
        self.fail(Fault::Stage)?;
        self.inner.stage(prefix)
    }

    fn initialize(
        &self,
        staged: &mut NamedTempFile,
        mode: mode_t,
        image: &SemaphoreImage,
    ) -> io::Result<()> {
        // Partially written state must be cleaned up as well.
        staged.as_file().set_len(1)?;
        self.fail(Fault::Initialize)?;
        self.inner.initialize(staged, mode, image)
    }

    fn publish(&self, staged: &NamedTempFile, target: &Path) -> io::Result<()> {
        self.fail(Fault::Publish)?;
        self.inner.publish(staged, target)
    }

    fn remove(&self, target: &Path) -> io::Result<()> {
        self.inner.remove(target)
    }
}

/// Entries of `dir` that are staging files rather than published objects.
pub fn staging_leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".tmp."))
        .collect()
}

pub fn sem_path(dir: &Path, translated: &str) -> PathBuf {
    dir.join(OsStr::new(&format!(
        "sem.{}",
        translated.trim_start_matches('/')
    )))
}
