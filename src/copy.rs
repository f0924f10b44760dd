//! Tree and glob expansion: turns a recursive copy or wildcard expression
//! into work items and fans them out over a bounded worker pool.
//!
//! Fan-out/fan-in: each enumeration level dispatches inside one
//! `rayon::scope`, which joins before returning, so the caller observes
//! completion only after every dispatched item finished. Item failures are
//! absorbed by the transfer layer and tallied; enumeration failures abort
//! the level.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::backend::{self, Backend};
use crate::pathutil;
use crate::permits::PermitPool;
use crate::transfer::{TransferStats, single_file_copy};

/// One resolved transfer produced by tree/glob expansion.
struct WorkItem {
    src_path: String,
    dest_path: String,
    size_hint: Option<u64>,
}

/// Copies `src_path` on `src` to `dst_path` on `dst`, expanding wildcards
/// and directory trees. Handles are inherited by recursive sub-invocations
/// so nested expansion never re-resolves URIs.
pub(crate) fn copy_resolved(
    src: &Arc<dyn Backend>,
    src_path: &str,
    dst: &Arc<dyn Backend>,
    dst_path: &str,
    recursive: bool,
    permits: &PermitPool,
    stats: &TransferStats,
) -> Result<()> {
    let src_path = pathutil::strip_trailing_slashes(src_path);
    let dst_path = pathutil::strip_trailing_slashes(dst_path);

    if pathutil::contains_wildcard(src_path) {
        return copy_glob(src, src_path, dst, dst_path, recursive, permits, stats);
    }

    if backend::is_directory(&**src, src_path) {
        return copy_directory(src, src_path, dst, dst_path, recursive, permits, stats);
    }

    single_file_copy(&**src, src_path, &**dst, dst_path, None, permits, stats);
    Ok(())
}

fn copy_glob(
    src: &Arc<dyn Backend>,
    src_path: &str,
    dst: &Arc<dyn Backend>,
    dst_path: &str,
    recursive: bool,
    permits: &PermitPool,
    stats: &TransferStats,
) -> Result<()> {
    // Position check runs before any backend call so a bad pattern aborts
    // with zero I/O.
    pathutil::validate_glob(src_path)?;
    let glob_root = pathutil::parent(src_path);

    let matches = src.glob(src_path)?;
    debug!(pattern = src_path, matches = matches.len(), "expanding wildcard");

    let mut files = Vec::new();
    let mut directories = Vec::new();
    for (path, info) in &matches {
        if info.is_dir() && !recursive {
            debug!("skipping directory match '{path}' (recursive copy not requested)");
            continue;
        }
        let rel = pathutil::trim_prefix(path, glob_root)?.trim_start_matches('/');
        let dest_path = pathutil::join(dst_path, rel);
        let dest_parent = pathutil::parent(&dest_path);
        if !dest_parent.is_empty() {
            dst.make_directories(dest_parent)?;
        }
        if info.is_dir() {
            directories.push((path.clone(), dest_path));
        } else {
            files.push(WorkItem {
                src_path: path.clone(),
                dest_path,
                size_hint: info.size,
            });
        }
    }

    rayon::scope(|scope| {
        for item in &files {
            scope.spawn(move |_| {
                single_file_copy(
                    &**src,
                    &item.src_path,
                    &**dst,
                    &item.dest_path,
                    item.size_hint,
                    permits,
                    stats,
                );
            });
        }
        // A directory match restarts the same expansion one level down,
        // inheriting the already-resolved handles.
        for (sub_src, sub_dst) in &directories {
            scope.spawn(move |_| {
                if let Err(e) = copy_resolved(src, sub_src, dst, sub_dst, true, permits, stats) {
                    error!("Failed to copy {}://{sub_src}: {e:#}", src.protocol());
                    stats.record_failure();
                }
            });
        }
    });
    Ok(())
}

fn copy_directory(
    src: &Arc<dyn Backend>,
    src_path: &str,
    dst: &Arc<dyn Backend>,
    dst_path: &str,
    recursive: bool,
    permits: &PermitPool,
    stats: &TransferStats,
) -> Result<()> {
    if !recursive {
        warn!("'{src_path}' is a directory; nothing copied (recursive copy not requested)");
        return Ok(());
    }

    // Intra-store trees move by reference in a single call.
    if src.as_xet().is_some()
        && let Some(dst_xet) = dst.as_xet()
    {
        info!("Copying {src_path} to {dst_path}...");
        return dst_xet.copy_directory(src_path, dst_path);
    }

    let entries = src.enumerate(src_path)?;
    let mut files = Vec::new();
    for (path, info) in &entries {
        let rel = pathutil::trim_prefix(path, src_path)?.trim_start_matches('/');
        let dest_path = pathutil::join(dst_path, rel);
        if info.is_dir() {
            // Mirror the directory itself so empty directories survive.
            dst.make_directories(&dest_path)?;
            continue;
        }
        let dest_parent = pathutil::parent(&dest_path);
        if !dest_parent.is_empty() {
            dst.make_directories(dest_parent)?;
        }
        files.push(WorkItem {
            src_path: path.clone(),
            dest_path,
            size_hint: info.size,
        });
    }

    rayon::scope(|scope| {
        for item in &files {
            scope.spawn(move |_| {
                single_file_copy(
                    &**src,
                    &item.src_path,
                    &**dst,
                    &item.dest_path,
                    item.size_hint,
                    permits,
                    stats,
                );
            });
        }
    });
    Ok(())
}
