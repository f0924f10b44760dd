use std::fs;
use std::path::Path;

use assert_fs::prelude::*;
use xmove::{Config, PermitPool, ops};

fn uri(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

/// Happy path: copy a directory tree and verify the mirror, including an
/// otherwise-empty subdirectory.
#[test]
fn copy_directory_tree_mirrors_structure() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("a");
    src.create_dir_all().unwrap();
    src.child("x.txt").write_str("top level").unwrap();
    src.child("sub").create_dir_all().unwrap();
    src.child("sub/y.txt").write_str("nested").unwrap();
    src.child("hollow").create_dir_all().unwrap();

    let dst = temp.child("b");
    let cfg = Config::default();
    let permits = PermitPool::new(4);

    ops::copy(&cfg, &permits, &uri(src.path()), &uri(dst.path()), true, None)
        .expect("tree copy should succeed");

    dst.child("x.txt").assert("top level");
    dst.child("sub/y.txt").assert("nested");
    assert!(dst.child("hollow").path().is_dir());
    assert_eq!(permits.available(), 4);
}

#[test]
fn non_recursive_directory_copy_writes_nothing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("a");
    src.create_dir_all().unwrap();
    src.child("x.txt").write_str("content").unwrap();
    let dst = temp.child("b");

    let cfg = Config::default();
    let permits = PermitPool::new(2);
    ops::copy(&cfg, &permits, &uri(src.path()), &uri(dst.path()), false, None)
        .expect("non-recursive copy is a reported no-op, not an error");

    assert!(!dst.path().exists());
}

/// A 10 MB file crosses several stream chunks on no backend; the
/// destination must be byte-identical and the permit pool drained back to
/// its initial level.
#[test]
fn large_single_file_is_byte_identical() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.path().join("big.bin");
    let dst = temp.path().join("copy.bin");

    let mut data = vec![0u8; 10 * 1024 * 1024];
    for (i, b) in data.iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    fs::write(&src, &data).unwrap();

    let cfg = Config::default();
    let permits = PermitPool::new(2);
    ops::copy(&cfg, &permits, &uri(&src), &uri(&dst), false, None).unwrap();

    assert_eq!(fs::read(&dst).unwrap(), data);
    assert_eq!(permits.available(), 2);
}

#[test]
fn copy_into_existing_directory_lands_inside_it() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("payload.txt");
    src.write_str("cargo").unwrap();
    let dst_dir = temp.child("drop-zone");
    dst_dir.create_dir_all().unwrap();

    let cfg = Config::default();
    let permits = PermitPool::new(2);
    ops::copy(&cfg, &permits, &uri(src.path()), &uri(dst_dir.path()), false, None).unwrap();

    dst_dir.child("payload.txt").assert("cargo");
    // The source is untouched.
    src.assert("cargo");
}

#[test]
fn missing_source_is_reported_as_failed_items() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cfg = Config::default();
    let permits = PermitPool::new(1);

    let err = ops::copy(
        &cfg,
        &permits,
        &uri(&temp.path().join("nope.txt")),
        &uri(&temp.path().join("out.txt")),
        false,
        None,
    )
    .unwrap_err();
    assert!(err.to_string().contains("failed to copy"));
    assert_eq!(permits.available(), 1);
}
