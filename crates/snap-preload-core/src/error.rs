use std::error::Error as _;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Failure of a semaphore open, including every step of create-and-publish.
#[derive(Error, Debug)]
pub enum SemError {
    #[error("invalid semaphore name {name:?}: {errno}")]
    InvalidName { name: String, errno: Errno },

    #[error("initial value {value} exceeds SEM_VALUE_MAX ({max})")]
    ValueTooLarge { value: u32, max: u32 },

    #[error("cannot stage semaphore in {dir:?}: {source}")]
    Stage { dir: PathBuf, source: io::Error },

    #[error("cannot initialize staged semaphore: {0}")]
    Initialize(io::Error),

    #[error("semaphore {0:?} already exists")]
    AlreadyExists(PathBuf),

    #[error("cannot publish semaphore at {target:?}: {source}")]
    Publish { target: PathBuf, source: io::Error },

    #[error("sem_open failed: {0}")]
    Open(#[from] Errno),
}

impl SemError {
    /// The errno libc's own `sem_open` would report for this failure.
    pub fn errno(&self) -> Errno {
        match self {
            SemError::InvalidName { errno, .. } => *errno,
            SemError::ValueTooLarge { .. } => Errno::EINVAL,
            SemError::Stage { source, .. }
            | SemError::Initialize(source)
            | SemError::Publish { source, .. } => io_errno(source),
            SemError::AlreadyExists(_) => Errno::EEXIST,
            SemError::Open(errno) => *errno,
        }
    }
}

/// errno carried by an I/O error.
///
/// tempfile wraps OS errors to attach the path, hiding the raw code one
/// level down the source chain. Falls back to the error kind, then `EIO`.
pub(crate) fn io_errno(err: &io::Error) -> Errno {
    if let Some(code) = err.raw_os_error() {
        return Errno::from_i32(code);
    }
    let wrapped = err
        .get_ref()
        .and_then(|inner| inner.source())
        .and_then(|source| source.downcast_ref::<io::Error>())
        .and_then(io::Error::raw_os_error);
    if let Some(code) = wrapped {
        return Errno::from_i32(code);
    }
    match err.kind() {
        io::ErrorKind::NotFound => Errno::ENOENT,
        io::ErrorKind::PermissionDenied => Errno::EACCES,
        io::ErrorKind::AlreadyExists => Errno::EEXIST,
        _ => Errno::EIO,
    }
}

pub type Result<T> = std::result::Result<T, SemError>;
