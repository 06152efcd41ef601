//! Exercises allocation and the cleanup registry together: files and
//! directories created via `alloc` are registered, then a `drain` call
//! (standing in for process exit) removes everything in reverse order.

use distcc_tempfiles::{create_unique_dir, create_unique_file, path_to_cstring, Kind, TempRegistry};

#[test]
fn registered_file_and_dir_are_both_removed_on_drain() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = TempRegistry::new(false);

    let (file, file_path) = create_unique_file(tmp.path(), "distcc", ".i").unwrap();
    drop(file);
    registry.register(path_to_cstring(&file_path).unwrap(), Kind::File);

    let dir_path = create_unique_dir(tmp.path(), "distcc-job-").unwrap();
    registry.register(path_to_cstring(&dir_path).unwrap(), Kind::Dir);

    assert!(file_path.exists());
    assert!(dir_path.exists());

    registry.drain();

    assert!(!file_path.exists());
    assert!(!dir_path.exists());
}

#[test]
fn save_temps_registry_leaves_files_on_disk_after_drain() {
    let tmp = tempfile::tempdir().unwrap();
    let registry = TempRegistry::new(true);

    let (file, file_path) = create_unique_file(tmp.path(), "distcc", ".o").unwrap();
    drop(file);
    registry.register(path_to_cstring(&file_path).unwrap(), Kind::File);

    registry.drain();

    assert!(file_path.exists());
}

#[test]
fn concurrent_unique_file_allocations_never_collide() {
    let tmp = tempfile::tempdir().unwrap();
    let mut paths = std::collections::HashSet::new();
    for _ in 0..50 {
        let (_file, path) = create_unique_file(tmp.path(), "distcc", ".i").unwrap();
        assert!(paths.insert(path));
    }
}
