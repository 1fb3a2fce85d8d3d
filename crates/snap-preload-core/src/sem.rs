//! POSIX named semaphores.
//!
//! glibc creates a named semaphore by writing a `sem_t` into a temporary
//! file under `/dev/shm` and hard-linking it to `sem.<name>`. Its temporary
//! file name falls outside the `snap.<instance>.*` namespace, so under
//! confinement that sequence is denied. [`create_and_publish`] performs the
//! same protocol with a staging file inside the namespace and then lets the
//! real `sem_open` attach to the published object.
//!
//! The only cross-process synchronization is `link(2)` failing with
//! `EEXIST` when the target already exists: of any number of racing
//! creators exactly one publishes, the rest attach to its object.

use std::ffi::{CStr, OsStr, OsString};
use std::fs::Permissions;
use std::io::{self, Write};
use std::mem::MaybeUninit;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use libc::{c_int, c_uint, mode_t};
use nix::errno::Errno;
use snap_preload_config::{log_sem_debug, log_sem_warn};
use tempfile::NamedTempFile;

use crate::error::{Result, SemError};
use crate::identity::InstanceName;
use crate::originals::{Originals, SemHandle};
use crate::translate::{translate, NAMESPACE_PREFIX};

/// File name prefix glibc uses for semaphores in the shm directory.
pub const SEM_FILE_PREFIX: &str = "sem.";

/// Longest file name the shm directory accepts.
const NAME_MAX: usize = 255;

/// Largest initial value `sem_open` accepts on this system.
pub fn sem_value_max() -> c_uint {
    let max = unsafe { libc::sysconf(libc::_SC_SEM_VALUE_MAX) };
    if max > 0 {
        max.min(c_uint::MAX as libc::c_long) as c_uint
    } else {
        i32::MAX as c_uint
    }
}

/// `name` without any leading slashes, as glibc reads semaphore names.
fn trim_separators(name: &[u8]) -> &[u8] {
    let start = name.iter().position(|&b| b != b'/').unwrap_or(name.len());
    &name[start..]
}

/// Reject the names glibc's `sem_open` rejects, with the same errno.
///
/// After the leading slashes the name must be non-empty and contain no
/// further `/`; its `sem.` file name must fit in `NAME_MAX`.
pub fn check_name(translated: &CStr) -> nix::Result<()> {
    let name = trim_separators(translated.to_bytes());
    if name.is_empty() || name.contains(&b'/') {
        return Err(Errno::EINVAL);
    }
    if SEM_FILE_PREFIX.len() + name.len() > NAME_MAX {
        return Err(Errno::ENAMETOOLONG);
    }
    Ok(())
}

/// Shm-directory file name of the semaphore published under `translated`.
pub fn semaphore_file_name(translated: &CStr) -> OsString {
    let mut name = SEM_FILE_PREFIX.as_bytes().to_vec();
    name.extend_from_slice(trim_separators(translated.to_bytes()));
    OsString::from_vec(name)
}

/// Prefix of staging files, kept inside the instance's namespace.
pub fn staging_prefix(instance: Option<&InstanceName>) -> String {
    match instance {
        Some(instance) => format!("{}.{}.tmp.", NAMESPACE_PREFIX, instance),
        None => ".snap-preload.tmp.".to_string(),
    }
}

/// Raw bytes of a freshly initialized process-shared `sem_t`.
pub struct SemaphoreImage {
    bytes: Vec<u8>,
}

impl SemaphoreImage {
    pub fn new(value: c_uint) -> io::Result<Self> {
        let mut sem = MaybeUninit::<libc::sem_t>::zeroed();
        if unsafe { libc::sem_init(sem.as_mut_ptr(), 1, value) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let bytes = unsafe {
            std::slice::from_raw_parts(
                sem.as_ptr() as *const u8,
                std::mem::size_of::<libc::sem_t>(),
            )
        }
        .to_vec();
        unsafe { libc::sem_destroy(sem.as_mut_ptr()) };
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Filesystem side of semaphore publication.
///
/// A staged file is removed when its [`NamedTempFile`] is dropped or
/// closed, so every early return out of [`create_and_publish`] cleans up.
pub trait SemStore: Send + Sync {
    /// Directory holding staged and published semaphores.
    fn dir(&self) -> &Path;

    /// Exclusively create a uniquely named file starting with `prefix`.
    fn stage(&self, prefix: &str) -> io::Result<NamedTempFile>;

    /// Apply `mode` and write the semaphore image.
    fn initialize(
        &self,
        staged: &mut NamedTempFile,
        mode: mode_t,
        image: &SemaphoreImage,
    ) -> io::Result<()>;

    /// Atomically expose the staged file as `target`; `AlreadyExists` if taken.
    fn publish(&self, staged: &NamedTempFile, target: &Path) -> io::Result<()>;

    /// Remove a published semaphore.
    fn remove(&self, target: &Path) -> io::Result<()>;

    fn path_for(&self, file_name: &OsStr) -> PathBuf {
        self.dir().join(file_name)
    }
}

/// [`SemStore`] backed by a tmpfs directory, `/dev/shm` in production.
#[derive(Debug, Clone)]
pub struct ShmDirStore {
    dir: PathBuf,
}

impl ShmDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SemStore for ShmDirStore {
    fn dir(&self) -> &Path {
        &self.dir
    }

    fn stage(&self, prefix: &str) -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(prefix)
            .rand_bytes(6)
            .tempfile_in(&self.dir)
    }

    fn initialize(
        &self,
        staged: &mut NamedTempFile,
        mode: mode_t,
        image: &SemaphoreImage,
    ) -> io::Result<()> {
        staged
            .as_file()
            .set_permissions(Permissions::from_mode(mode as u32))?;
        staged.as_file_mut().write_all(image.as_bytes())
    }

    fn publish(&self, staged: &NamedTempFile, target: &Path) -> io::Result<()> {
        std::fs::hard_link(staged.path(), target)
    }

    fn remove(&self, target: &Path) -> io::Result<()> {
        std::fs::remove_file(target)
    }
}

/// Open (and possibly create) the semaphore `name`.
pub fn sem_open<O, S>(
    originals: &O,
    store: &S,
    instance: Option<&InstanceName>,
    name: &CStr,
    oflag: c_int,
    mode: mode_t,
    value: c_uint,
) -> Result<SemHandle>
where
    O: Originals + ?Sized,
    S: SemStore + ?Sized,
{
    let translated = translate(instance, name);
    if oflag & libc::O_CREAT == 0 {
        log_sem_debug!(
            "sem_open without O_CREAT",
            name = tracing::field::display(translated.to_string_lossy())
        );
        return Ok(originals.sem_open(&translated, oflag, mode, value)?);
    }
    create_and_publish(originals, store, instance, &translated, oflag, mode, value)
}

pub fn sem_unlink<O: Originals + ?Sized>(
    originals: &O,
    instance: Option<&InstanceName>,
    name: &CStr,
) -> nix::Result<()> {
    let translated = translate(instance, name);
    log_sem_debug!(
        "sem_unlink",
        name = tracing::field::display(translated.to_string_lossy())
    );
    originals.sem_unlink(&translated)
}

/// Stage, publish and open the semaphore already translated to `translated`.
pub fn create_and_publish<O, S>(
    originals: &O,
    store: &S,
    instance: Option<&InstanceName>,
    translated: &CStr,
    oflag: c_int,
    mode: mode_t,
    value: c_uint,
) -> Result<SemHandle>
where
    O: Originals + ?Sized,
    S: SemStore + ?Sized,
{
    check_name(translated).map_err(|errno| SemError::InvalidName {
        name: translated.to_string_lossy().into_owned(),
        errno,
    })?;

    let max = sem_value_max();
    if value > max {
        return Err(SemError::ValueTooLarge { value, max });
    }

    let mut staged = store
        .stage(&staging_prefix(instance))
        .map_err(|source| SemError::Stage {
            dir: store.dir().to_path_buf(),
            source,
        })?;

    // From here on, returning early drops `staged` and removes it.
    let image = SemaphoreImage::new(value).map_err(SemError::Initialize)?;
    store
        .initialize(&mut staged, mode, &image)
        .map_err(SemError::Initialize)?;

    let target = store.path_for(&semaphore_file_name(translated));
    let created = match store.publish(&staged, &target) {
        Ok(()) => true,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            if oflag & libc::O_EXCL != 0 {
                return Err(SemError::AlreadyExists(target));
            }
            false
        }
        Err(source) => return Err(SemError::Publish { target, source }),
    };
    log_sem_debug!(
        "semaphore published",
        target = tracing::field::display(target.display()),
        created = created
    );

    let staged_path = staged.path().to_path_buf();
    if let Err(e) = staged.close() {
        log_sem_warn!(
            "failed to remove staging file",
            path = tracing::field::display(staged_path.display()),
            error = tracing::field::display(&e)
        );
    }

    let open_flags = oflag & !(libc::O_CREAT | libc::O_EXCL);
    match originals.sem_open(translated, open_flags, mode, value) {
        Ok(handle) => Ok(handle),
        Err(errno) => {
            // Nobody else can hold a semaphore we published a moment ago.
            if created {
                if let Err(e) = store.remove(&target) {
                    log_sem_warn!(
                        "failed to remove unopenable semaphore",
                        target = tracing::field::display(target.display()),
                        error = tracing::field::display(&e)
                    );
                }
            }
            Err(SemError::Open(errno))
        }
    }
}
