//! Local-filesystem backend.
//!
//! Adapts the OS filesystem to the backend contract. I/O errors are enriched
//! with platform-aware hints so bulk-operation logs stay actionable.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use anyhow::{Result, anyhow};
use globset::GlobBuilder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{Backend, EntryInfo};

#[derive(Debug)]
pub struct LocalBackend {
    protocol: String,
}

/// Tags resolving to this backend. The first one is canonical; the others
/// are aliases normalized back to whatever tag the caller asked for.
pub const LOCAL_ALIASES: &[&str] = &["file", "local"];

impl LocalBackend {
    /// The handle reports `protocol` verbatim so protocol-equality checks
    /// hold even when the caller used an alias tag.
    pub fn with_protocol(protocol: &str) -> Self {
        Self { protocol: protocol.to_string() }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::with_protocol(LOCAL_ALIASES[0])
    }
}

impl Backend for LocalBackend {
    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        let meta = fs::metadata(path).map_err(io_help("stat", path))?;
        Ok(if meta.is_dir() {
            EntryInfo::directory()
        } else {
            EntryInfo::file(meta.len())
        })
    }

    fn is_directory(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let file = File::open(path).map_err(io_help("open for read", path))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        if let Some(parent) = Path::new(path).parent() {
            fs::create_dir_all(parent)
                .map_err(io_help("create parent directories for", path))?;
        }
        let file = File::create(path).map_err(io_help("open for write", path))?;
        Ok(Box::new(BufWriter::new(file)))
    }

    fn enumerate(&self, path: &str) -> Result<BTreeMap<String, EntryInfo>> {
        let mut entries = BTreeMap::new();
        for entry in WalkDir::new(path).min_depth(1) {
            let entry = entry.map_err(|e| anyhow!("walk '{path}': {e}"))?;
            let key = entry.path().to_string_lossy().into_owned();
            let info = if entry.file_type().is_dir() {
                EntryInfo::directory()
            } else {
                let size = entry.metadata().ok().map(|m| m.len()).unwrap_or(0);
                EntryInfo::file(size)
            };
            entries.insert(key, info);
        }
        Ok(entries)
    }

    fn glob(&self, pattern: &str) -> Result<BTreeMap<String, EntryInfo>> {
        let pattern_path = Path::new(pattern);
        let parent = pattern_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| anyhow!("glob pattern '{pattern}' has no parent directory"))?;
        let segment = pattern_path
            .file_name()
            .ok_or_else(|| anyhow!("glob pattern '{pattern}' has no final segment"))?
            .to_string_lossy()
            .into_owned();

        let matcher = GlobBuilder::new(&segment)
            .literal_separator(true)
            .build()
            .map_err(|e| anyhow!("bad glob '{segment}': {e}"))?
            .compile_matcher();

        let mut matches = BTreeMap::new();
        for entry in fs::read_dir(parent).map_err(io_help("list", &parent.to_string_lossy()))? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry under {}: {e}", parent.display());
                    continue;
                }
            };
            if !matcher.is_match(Path::new(&entry.file_name())) {
                continue;
            }
            let full = entry.path();
            let info = match fs::metadata(&full) {
                Ok(meta) if meta.is_dir() => EntryInfo::directory(),
                Ok(meta) => EntryInfo::file(meta.len()),
                Err(e) => {
                    warn!("skipping {}: {e}", full.display());
                    continue;
                }
            };
            matches.insert(full.to_string_lossy().into_owned(), info);
        }
        debug!(pattern, count = matches.len(), "glob expansion");
        Ok(matches)
    }

    fn make_directories(&self, path: &str) -> Result<()> {
        fs::create_dir_all(path).map_err(io_help("create directory", path))?;
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        if let Some(parent) = Path::new(dst).parent() {
            fs::create_dir_all(parent)
                .map_err(io_help("create parent directories for", dst))?;
        }
        match fs::rename(src, dst) {
            Ok(()) => Ok(()),
            // Cross-device renames fail with EXDEV; fall back to copy+remove
            // for single files.
            Err(e) if Path::new(src).is_file() => {
                debug!("rename {src} -> {dst} failed ({e}); falling back to copy+remove");
                fs::copy(src, dst).map_err(io_help("copy", src))?;
                fs::remove_file(src).map_err(io_help("remove after copy", src))?;
                Ok(())
            }
            Err(e) => Err(describe(e, "rename", src)),
        }
    }

    fn remove(&self, path: &str) -> Result<()> {
        let meta = fs::symlink_metadata(path).map_err(io_help("stat", path))?;
        if meta.is_dir() {
            fs::remove_dir_all(path).map_err(io_help("remove directory", path))?;
        } else {
            fs::remove_file(path).map_err(io_help("remove file", path))?;
        }
        Ok(())
    }
}

/// Adapter for `.map_err(...)` that converts an io::Error into an
/// anyhow::Error carrying the operation, path and a platform hint.
fn io_help<'a>(op: &'a str, path: &'a str) -> impl FnOnce(io::Error) -> anyhow::Error + 'a {
    move |e| describe(e, op, path)
}

fn describe(e: io::Error, op: &str, path: &str) -> anyhow::Error {
    let mut msg = format!("{op} '{path}': {e}");
    if let Some(hint) = os_hint(&e) {
        msg.push_str(hint);
    }
    anyhow!(msg)
}

#[cfg(unix)]
fn os_hint(e: &io::Error) -> Option<&'static str> {
    match e.raw_os_error()? {
        libc::EACCES | libc::EPERM => {
            Some(" — permission denied; check ownership and write permissions.")
        }
        libc::EXDEV => Some(" — cross-filesystem; atomic rename not possible."),
        libc::ENOENT => Some(" — path not found; verify it exists."),
        libc::ENOSPC => Some(" — insufficient space on device."),
        libc::EROFS => Some(" — read-only filesystem; cannot write here."),
        libc::ENAMETOOLONG => Some(" — filename or path too long; shorten path segments."),
        _ => None,
    }
}

#[cfg(not(unix))]
fn os_hint(e: &io::Error) -> Option<&'static str> {
    match e.kind() {
        io::ErrorKind::PermissionDenied => {
            Some(" — permission denied; check ownership and write permissions.")
        }
        io::ErrorKind::NotFound => Some(" — path not found; verify it exists."),
        _ => None,
    }
}
