//! Create-and-publish protocol: success, conflicts, and every cleanup path.

mod common;

use std::os::unix::fs::{MetadataExt, PermissionsExt};

use common::{sem_path, staging_leftovers, Call, Fault, FakeOriginals, FaultyStore};
use nix::errno::Errno;
use snap_preload_config::testing::TestEnvironment;
use snap_preload_core::sem::{sem_value_max, SemaphoreImage};
use snap_preload_core::{InstanceName, Preload, PreloadContext, SemError, SemStore, ShmDirStore};

fn context(env: &TestEnvironment) -> PreloadContext {
    PreloadContext::new(InstanceName::new("myapp"), &env.shm_dir)
}

#[test]
fn test_create_publishes_under_translated_name() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));

    preload
        .sem_open(c"/lock", libc::O_CREAT | libc::O_EXCL, 0o640, 1)
        .unwrap();

    let published = sem_path(&env.shm_dir, "/snap.myapp.lock");
    let meta = std::fs::metadata(&published).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, 0o640);
    assert_eq!(meta.nlink(), 1);
    assert_eq!(meta.len() as usize, std::mem::size_of::<libc::sem_t>());
    assert_eq!(env.shm_entries().unwrap(), vec!["sem.snap.myapp.lock"]);

    // The final open attaches to the published object without create flags.
    assert_eq!(
        preload.originals().calls(),
        vec![Call::SemOpen(c"/snap.myapp.lock".to_owned(), 0)]
    );
}

#[test]
fn test_published_contents_are_initialized_semaphore() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));

    preload
        .sem_open(c"/counter", libc::O_CREAT, 0o600, 7)
        .unwrap();

    let contents = std::fs::read(sem_path(&env.shm_dir, "/snap.myapp.counter")).unwrap();
    assert_eq!(contents, SemaphoreImage::new(7).unwrap().as_bytes());
}

#[test]
fn test_other_flags_survive_final_open() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));

    preload
        .sem_open(c"/lock", libc::O_CREAT | libc::O_EXCL | libc::O_CLOEXEC, 0o600, 0)
        .unwrap();

    assert_eq!(
        preload.originals().calls(),
        vec![Call::SemOpen(c"/snap.myapp.lock".to_owned(), libc::O_CLOEXEC)]
    );
}

#[test]
fn test_exclusive_create_of_existing_semaphore_fails() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));
    let published = sem_path(&env.shm_dir, "/snap.myapp.lock");
    std::fs::write(&published, b"existing").unwrap();

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT | libc::O_EXCL, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::AlreadyExists(_)));
    assert_eq!(err.errno(), Errno::EEXIST);
    assert_eq!(std::fs::read(&published).unwrap(), b"existing");
    assert!(staging_leftovers(&env.shm_dir).is_empty());
    assert!(preload.originals().calls().is_empty());
}

#[test]
fn test_create_of_existing_semaphore_attaches_to_it() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));
    let published = sem_path(&env.shm_dir, "/snap.myapp.lock");
    std::fs::write(&published, b"existing").unwrap();

    preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap();

    // The pre-existing object was not replaced.
    assert_eq!(std::fs::read(&published).unwrap(), b"existing");
    assert_eq!(std::fs::metadata(&published).unwrap().nlink(), 1);
    assert!(staging_leftovers(&env.shm_dir).is_empty());
}

#[test]
fn test_value_over_maximum_fails_before_touching_filesystem() {
    let max = sem_value_max();
    if max == libc::c_uint::MAX {
        eprintln!("Skipping test: SEM_VALUE_MAX is the full unsigned range");
        return;
    }
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, max + 1)
        .unwrap_err();

    assert!(matches!(err, SemError::ValueTooLarge { .. }));
    assert_eq!(err.errno(), Errno::EINVAL);
    assert!(env.shm_entries().unwrap().is_empty());
    assert!(preload.originals().calls().is_empty());
}

#[test]
fn test_value_at_maximum_is_accepted() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));

    preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, sem_value_max())
        .unwrap();
}

#[test]
fn test_value_ignored_without_create() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));
    std::fs::write(sem_path(&env.shm_dir, "/snap.myapp.lock"), b"").unwrap();

    preload.sem_open(c"/lock", 0, 0, libc::c_uint::MAX).unwrap();
}

#[test]
fn test_stage_failure_leaves_nothing() {
    let env = TestEnvironment::new().unwrap();
    let store = FaultyStore::new(&env.shm_dir, Fault::Stage, libc::EACCES);
    let preload = Preload::with_store(context(&env), FakeOriginals::new(&env.shm_dir), store);

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::Stage { .. }));
    assert_eq!(err.errno(), Errno::EACCES);
    assert!(env.shm_entries().unwrap().is_empty());
}

#[test]
fn test_missing_shm_dir_is_stage_failure() {
    let env = TestEnvironment::new().unwrap();
    let missing = env.shm_dir.join("absent");
    let preload = Preload::new(
        PreloadContext::new(InstanceName::new("myapp"), &missing),
        FakeOriginals::new(&missing),
    );

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::Stage { .. }));
    assert_eq!(err.errno(), Errno::ENOENT);
    assert!(env.shm_entries().unwrap().is_empty());
}

#[test]
fn test_initialize_failure_removes_staging_file() {
    let env = TestEnvironment::new().unwrap();
    let store = FaultyStore::new(&env.shm_dir, Fault::Initialize, libc::ENOSPC);
    let preload = Preload::with_store(context(&env), FakeOriginals::new(&env.shm_dir), store);

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::Initialize(_)));
    assert_eq!(err.errno(), Errno::ENOSPC);
    assert!(env.shm_entries().unwrap().is_empty());
    assert!(preload.originals().calls().is_empty());
}

#[test]
fn test_publish_failure_removes_staging_file() {
    let env = TestEnvironment::new().unwrap();
    let store = FaultyStore::new(&env.shm_dir, Fault::Publish, libc::EPERM);
    let preload = Preload::with_store(context(&env), FakeOriginals::new(&env.shm_dir), store);

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::Publish { .. }));
    assert_eq!(err.errno(), Errno::EPERM);
    assert!(env.shm_entries().unwrap().is_empty());
}

#[test]
fn test_nested_name_rejected_before_staging() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(
        PreloadContext::new(None, &env.shm_dir),
        FakeOriginals::new(&env.shm_dir),
    );

    let err = preload
        .sem_open(c"/a/b", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::InvalidName { .. }));
    assert_eq!(err.errno(), Errno::EINVAL);
    assert!(env.shm_entries().unwrap().is_empty());
    assert!(preload.originals().calls().is_empty());
}

#[test]
fn test_doubled_separator_rejected_in_namespace() {
    let env = TestEnvironment::new().unwrap();
    // A directory the bad name would otherwise resolve into.
    std::fs::create_dir(sem_path(&env.shm_dir, "/snap.myapp.")).unwrap();
    let preload = Preload::new(context(&env), FakeOriginals::new(&env.shm_dir));

    // Translates to "/snap.myapp./cache".
    let err = preload
        .sem_open(c"//cache", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert_eq!(err.errno(), Errno::EINVAL);
    assert_eq!(env.shm_entries().unwrap(), vec!["sem.snap.myapp."]);
    let nested = std::fs::read_dir(sem_path(&env.shm_dir, "/snap.myapp.")).unwrap();
    assert_eq!(nested.count(), 0);
}

#[test]
fn test_overlong_name_is_enametoolong() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(
        PreloadContext::new(None, &env.shm_dir),
        FakeOriginals::new(&env.shm_dir),
    );
    let name = std::ffi::CString::new(format!("/{}", "x".repeat(255))).unwrap();

    let err = preload
        .sem_open(&name, libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert_eq!(err.errno(), Errno::ENAMETOOLONG);
    assert!(env.shm_entries().unwrap().is_empty());
}

#[test]
fn test_creator_removes_object_when_final_open_fails() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(
        context(&env),
        FakeOriginals::new(&env.shm_dir).failing_sem_open(Errno::EMFILE),
    );

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert!(matches!(err, SemError::Open(Errno::EMFILE)));
    assert!(env.shm_entries().unwrap().is_empty());
}

#[test]
fn test_non_creator_keeps_object_when_final_open_fails() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(
        context(&env),
        FakeOriginals::new(&env.shm_dir).failing_sem_open(Errno::EACCES),
    );
    let published = sem_path(&env.shm_dir, "/snap.myapp.lock");
    std::fs::write(&published, b"owned elsewhere").unwrap();

    let err = preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap_err();

    assert_eq!(err.errno(), Errno::EACCES);
    assert_eq!(std::fs::read(&published).unwrap(), b"owned elsewhere");
    assert!(staging_leftovers(&env.shm_dir).is_empty());
}

#[test]
fn test_create_without_instance_uses_plain_name() {
    let env = TestEnvironment::new().unwrap();
    let preload = Preload::new(
        PreloadContext::new(None, &env.shm_dir),
        FakeOriginals::new(&env.shm_dir),
    );

    preload
        .sem_open(c"/lock", libc::O_CREAT, 0o600, 1)
        .unwrap();

    assert_eq!(env.shm_entries().unwrap(), vec!["sem.lock"]);
}

#[test]
fn test_store_remove_reports_missing_target() {
    let env = TestEnvironment::new().unwrap();
    let store = ShmDirStore::new(&env.shm_dir);
    let target = store.path_for(std::ffi::OsStr::new("sem.snap.myapp.x"));
    std::fs::write(&target, b"").unwrap();
    store.remove(&target).unwrap();
    assert!(!target.exists());
    assert_eq!(
        store.remove(&target).unwrap_err().kind(),
        std::io::ErrorKind::NotFound
    );
}
