use std::path::Path;

use assert_fs::prelude::*;
use xmove::errors::XmoveError;
use xmove::{Config, PermitPool, ops};

fn uri(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

#[test]
fn wildcard_copies_matching_files_only() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("logs");
    src.create_dir_all().unwrap();
    src.child("app.log").write_str("app").unwrap();
    src.child("db.log").write_str("db").unwrap();
    src.child("notes.txt").write_str("keep out").unwrap();

    let dst = temp.child("archive");
    let cfg = Config::default();
    let permits = PermitPool::new(4);

    let pattern = uri(&src.path().join("*.log"));
    ops::copy(&cfg, &permits, &pattern, &uri(dst.path()), false, None).unwrap();

    dst.child("app.log").assert("app");
    dst.child("db.log").assert("db");
    assert!(!dst.child("notes.txt").path().exists());
}

#[test]
fn wildcard_directory_match_recurses_when_requested() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("data");
    src.create_dir_all().unwrap();
    src.child("batch1/deep").create_dir_all().unwrap();
    src.child("batch1/deep/inner.csv").write_str("1").unwrap();
    src.child("top.csv").write_str("t").unwrap();

    let dst = temp.child("out");
    let cfg = Config::default();
    let permits = PermitPool::new(4);

    let pattern = uri(&src.path().join("*"));
    ops::copy(&cfg, &permits, &pattern, &uri(dst.path()), true, None).unwrap();

    dst.child("top.csv").assert("t");
    dst.child("batch1/deep/inner.csv").assert("1");
}

#[test]
fn wildcard_directory_match_skipped_without_recursive() {
    let temp = assert_fs::TempDir::new().unwrap();
    let src = temp.child("data");
    src.create_dir_all().unwrap();
    src.child("batch1").create_dir_all().unwrap();
    src.child("batch1/inner.csv").write_str("1").unwrap();
    src.child("top.csv").write_str("t").unwrap();

    let dst = temp.child("out");
    let cfg = Config::default();
    let permits = PermitPool::new(4);

    let pattern = uri(&src.path().join("*"));
    ops::copy(&cfg, &permits, &pattern, &uri(dst.path()), false, None).unwrap();

    dst.child("top.csv").assert("t");
    assert!(!dst.child("batch1").path().exists());
}

#[test]
fn wildcard_outside_final_segment_aborts_before_io() {
    let temp = assert_fs::TempDir::new().unwrap();
    let cfg = Config::default();
    let permits = PermitPool::new(1);

    let bad = uri(&temp.path().join("*/x.txt"));
    let dst = temp.child("never");
    let err = ops::copy(&cfg, &permits, &bad, &uri(dst.path()), true, None).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<XmoveError>(),
        Some(XmoveError::InvalidGlob(_))
    ));
    assert!(!dst.path().exists());
}
