//! Storage backends behind a uniform capability interface.
//!
//! The core only ever talks to [`Backend`]; the content-addressed backend
//! additionally exposes [`XetStore`] through the [`Backend::as_xet`]
//! capability query. Call sites check capabilities, never concrete types.

pub mod local;
pub mod memory;
pub mod xet;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use xet::XetBackend;

use std::collections::BTreeMap;
use std::io::{Read, Write};

use anyhow::Result;

/// Entry type reported by `info`/`enumerate`/`glob`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Metadata for one entry.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub kind: EntryKind,
    /// Size in bytes; directories and backends without size metadata report None.
    pub size: Option<u64>,
}

impl EntryInfo {
    pub fn file(size: u64) -> Self {
        Self { kind: EntryKind::File, size: Some(size) }
    }

    pub fn directory() -> Self {
        Self { kind: EntryKind::Directory, size: None }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Minimal capability set every backend implements.
///
/// Paths are backend-relative `/`-separated strings (see `pathutil`).
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Identifying protocol tag (`file`, `mem`, `xet`, ...).
    fn protocol(&self) -> &str;

    fn info(&self, path: &str) -> Result<EntryInfo>;

    fn is_directory(&self, path: &str) -> bool;

    /// Opens a sequential reader over the entry.
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    /// Opens a sequential writer, creating missing parent directories.
    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>>;

    /// Recursively lists every descendant of `path` with metadata.
    fn enumerate(&self, path: &str) -> Result<BTreeMap<String, EntryInfo>>;

    /// Expands a wildcard pattern (final segment only) with metadata.
    fn glob(&self, pattern: &str) -> Result<BTreeMap<String, EntryInfo>>;

    /// `mkdir -p`; succeeding on an existing directory.
    fn make_directories(&self, path: &str) -> Result<()>;

    fn rename(&self, src: &str, dst: &str) -> Result<()>;

    fn remove(&self, path: &str) -> Result<()>;

    /// Capability query for the extended content-addressed interface.
    fn as_xet(&self) -> Option<&dyn XetStore> {
        None
    }
}

/// Extended capabilities of the transactional, content-addressed backend.
pub trait XetStore: Send + Sync {
    /// Opens a transaction bracket; fails when one is already active on
    /// this handle.
    fn begin_transaction(&self, message: &str) -> Result<()>;

    /// Closes the bracket, committing the audit record.
    fn end_transaction(&self) -> Result<()>;

    /// Metadata for the branch a path resolves into; fails when absent.
    fn branch_info(&self, path: &str) -> Result<EntryInfo>;

    /// Directory check that also treats a branch root as directory-like.
    fn is_directory_or_branch(&self, path: &str) -> bool;

    /// True when the path names a branch root (no in-branch path).
    fn is_branch_root(&self, path: &str) -> bool;

    /// Reference-based intra-backend file copy (no data streamed out).
    fn copy_file(&self, src: &str, dst: &str) -> Result<()>;

    /// Whole-tree intra-backend copy in a single call.
    fn copy_directory(&self, src: &str, dst: &str) -> Result<()>;

    /// Preloads chunk manifests relevant to an upcoming large write.
    fn prepare_deduplication_hints(&self, path: &str) -> Result<()>;

    fn duplicate_repository(&self, src: &str, dst: &str) -> Result<()>;

    fn set_repository_attribute(&self, path: &str, attr: &str, value: bool) -> Result<()>;

    fn current_user(&self) -> Result<String>;

    /// Root URI namespace the handle is scoped to.
    fn domain(&self) -> &str;
}

/// Backend-aware directory check: the content-addressed backend treats a
/// branch root as a directory-like entity.
pub fn is_directory(backend: &dyn Backend, path: &str) -> bool {
    match backend.as_xet() {
        Some(xet) => xet.is_directory_or_branch(path),
        None => backend.is_directory(path),
    }
}
