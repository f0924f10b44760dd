//! Single-item transfer: streams one file between two backend handles.
//!
//! Transfers are the partial-failure boundary of bulk operations: every
//! error inside one transfer is caught, reported with the offending path
//! and tallied, so sibling transfers in a batch continue uninterrupted.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::backend::Backend;
use crate::pathutil;
use crate::permits::PermitPool;

/// Fixed buffer size for the chunked streaming loop.
pub const TRANSFER_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// Destinations at or above this size get a deduplication-hint call before
/// the write is opened, so the store can fetch relevant chunk manifests
/// first.
pub const DEDUP_HINT_THRESHOLD: u64 = 50_000_000;

/// Backend-metadata filename the content-addressed store owns; a generic
/// copy must never overwrite it.
pub const ATTRIBUTES_MARKER: &str = ".gitattributes";

/// Shared tally of absorbed per-item failures within one bulk operation.
#[derive(Debug, Default)]
pub struct TransferStats {
    failed: AtomicUsize,
}

impl TransferStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Copies one file from `src_path` on `src` to `dst_path` on `dst`.
///
/// Never propagates item errors; see module docs. `size_hint` spares a
/// fresh metadata lookup when the caller already enumerated the source.
pub fn single_file_copy(
    src: &dyn Backend,
    src_path: &str,
    dst: &dyn Backend,
    dst_path: &str,
    size_hint: Option<u64>,
    permits: &PermitPool,
    stats: &TransferStats,
) {
    if pathutil::final_segment(dst_path) == ATTRIBUTES_MARKER {
        info!("Skipping {ATTRIBUTES_MARKER}: reserved for the destination store");
        return;
    }
    info!(
        "Copying {}://{src_path} to {}://{dst_path}...",
        src.protocol(),
        dst.protocol()
    );

    // Intra-store fast path: reference-based copy, no bytes streamed.
    if src.as_xet().is_some()
        && let Some(dst_xet) = dst.as_xet()
    {
        if let Err(e) = dst_xet.copy_file(src_path, dst_path) {
            error!("Failed to copy {}://{src_path}: {e:#}", src.protocol());
            stats.record_failure();
        }
        return;
    }

    let _permit = permits.acquire();
    if let Err(e) = stream_copy(src, src_path, dst, dst_path, size_hint) {
        error!("Failed to copy {}://{src_path}: {e:#}", src.protocol());
        stats.record_failure();
    }
}

fn stream_copy(
    src: &dyn Backend,
    src_path: &str,
    dst: &dyn Backend,
    dst_path: &str,
    size_hint: Option<u64>,
) -> Result<()> {
    if let Some(dst_xet) = dst.as_xet() {
        let effective_size = match size_hint {
            Some(size) => Some(size),
            None => src.info(src_path).context("size lookup")?.size,
        };
        if effective_size.is_some_and(|size| size >= DEDUP_HINT_THRESHOLD) {
            dst_xet
                .prepare_deduplication_hints(dst_path)
                .context("deduplication hints")?;
        }
    }

    let mut reader = src.open_read(src_path)?;
    let mut writer = dst.open_write(dst_path)?;
    let mut buf = vec![0u8; TRANSFER_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).context("read chunk")?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n]).context("write chunk")?;
    }
    writer.flush().context("flush destination")?;
    Ok(())
}
