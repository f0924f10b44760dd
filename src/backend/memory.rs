//! In-memory scratch backend.
//!
//! A process-wide object store keyed by plain string paths. Used as the
//! `mem://` protocol and heavily by tests that need a second, cheap backend
//! with different semantics than the local disk: no atomic rename, and
//! directory entries exist only once created or implied by a key.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read, Write};
use std::sync::{Arc, OnceLock, RwLock};

use anyhow::{Result, anyhow, bail};
use globset::GlobBuilder;

use super::{Backend, EntryInfo};
use crate::pathutil;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: Arc<RwLock<BTreeMap<String, Arc<Vec<u8>>>>>,
    dirs: Arc<RwLock<BTreeSet<String>>>,
}

/// The shared `mem://` store: every resolved handle sees the same data for
/// the lifetime of the process.
pub fn shared() -> Arc<MemoryBackend> {
    static SHARED: OnceLock<Arc<MemoryBackend>> = OnceLock::new();
    Arc::clone(SHARED.get_or_init(|| Arc::new(MemoryBackend::default())))
}

fn norm(path: &str) -> String {
    pathutil::strip_trailing_slashes(path.trim_start_matches('/')).to_string()
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_file(&self, path: &str) -> Option<Arc<Vec<u8>>> {
        self.files.read().unwrap().get(&norm(path)).cloned()
    }

    fn has_dir(&self, path: &str) -> bool {
        let path = norm(path);
        if path.is_empty() {
            return true;
        }
        if self.dirs.read().unwrap().contains(&path) {
            return true;
        }
        let prefix = format!("{path}/");
        self.files.read().unwrap().keys().any(|k| k.starts_with(&prefix))
    }
}

impl Backend for MemoryBackend {
    fn protocol(&self) -> &str {
        "mem"
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        if let Some(data) = self.read_file(path) {
            return Ok(EntryInfo::file(data.len() as u64));
        }
        if self.has_dir(path) {
            return Ok(EntryInfo::directory());
        }
        bail!("mem://{}: no such entry", norm(path))
    }

    fn is_directory(&self, path: &str) -> bool {
        !self.files.read().unwrap().contains_key(&norm(path)) && self.has_dir(path)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let data = self
            .read_file(path)
            .ok_or_else(|| anyhow!("mem://{}: no such file", norm(path)))?;
        Ok(Box::new(MemReader { data, pos: 0 }))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let path = norm(path);
        if path.is_empty() {
            bail!("mem://: cannot write the store root");
        }
        // Implicit parent creation mirrors open(..., auto_mkdir).
        self.make_directories(pathutil::parent(&path))?;
        Ok(Box::new(MemWriter {
            buf: Vec::new(),
            path,
            files: Arc::clone(&self.files),
        }))
    }

    fn enumerate(&self, path: &str) -> Result<BTreeMap<String, EntryInfo>> {
        let root = norm(path);
        let prefix = if root.is_empty() { String::new() } else { format!("{root}/") };
        let mut entries = BTreeMap::new();
        for (key, data) in self.files.read().unwrap().iter() {
            if key.starts_with(&prefix) {
                entries.insert(key.clone(), EntryInfo::file(data.len() as u64));
                // Intermediate directories implied by the key.
                let mut dir = pathutil::parent(key);
                while dir.len() > root.len() {
                    entries.insert(dir.to_string(), EntryInfo::directory());
                    dir = pathutil::parent(dir);
                }
            }
        }
        for dir in self.dirs.read().unwrap().iter() {
            if dir.starts_with(&prefix) {
                entries.insert(dir.clone(), EntryInfo::directory());
            }
        }
        Ok(entries)
    }

    fn glob(&self, pattern: &str) -> Result<BTreeMap<String, EntryInfo>> {
        let pattern = norm(pattern);
        let root = pathutil::parent(&pattern);
        let segment = pathutil::final_segment(&pattern);
        let matcher = GlobBuilder::new(segment)
            .literal_separator(true)
            .build()
            .map_err(|e| anyhow!("bad glob '{segment}': {e}"))?
            .compile_matcher();

        let mut matches = BTreeMap::new();
        for (key, info) in self.enumerate(root)? {
            // Direct children only; the wildcard never spans separators.
            if pathutil::parent(&key) == root
                && matcher.is_match(pathutil::final_segment(&key))
            {
                matches.insert(key, info);
            }
        }
        Ok(matches)
    }

    fn make_directories(&self, path: &str) -> Result<()> {
        let path = norm(path);
        if path.is_empty() {
            return Ok(());
        }
        let mut dirs = self.dirs.write().unwrap();
        let mut cur = path.as_str();
        while !cur.is_empty() && cur != "/" {
            dirs.insert(cur.to_string());
            cur = pathutil::parent(cur);
        }
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let (src, dst) = (norm(src), norm(dst));
        let mut files = self.files.write().unwrap();
        if let Some(data) = files.remove(&src) {
            files.insert(dst, data);
            return Ok(());
        }
        drop(files);
        if !self.has_dir(&src) {
            bail!("mem://{src}: no such entry");
        }
        // Directory rename: re-key the whole subtree.
        let prefix = format!("{src}/");
        let mut files = self.files.write().unwrap();
        let moved: Vec<String> = files.keys().filter(|k| k.starts_with(&prefix)).cloned().collect();
        for key in moved {
            let data = files.remove(&key).expect("key listed above");
            files.insert(format!("{dst}/{}", &key[prefix.len()..]), data);
        }
        drop(files);
        let mut dirs = self.dirs.write().unwrap();
        let moved: Vec<String> = dirs
            .iter()
            .filter(|d| *d == &src || d.starts_with(&prefix))
            .cloned()
            .collect();
        for d in moved {
            dirs.remove(&d);
            let rel = &d[src.len()..];
            dirs.insert(format!("{dst}{rel}"));
        }
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let path = norm(path);
        if self.files.write().unwrap().remove(&path).is_some() {
            return Ok(());
        }
        if !self.has_dir(&path) {
            bail!("mem://{path}: no such entry");
        }
        let prefix = format!("{path}/");
        self.files.write().unwrap().retain(|k, _| !k.starts_with(&prefix));
        self.dirs
            .write()
            .unwrap()
            .retain(|d| d != &path && !d.starts_with(&prefix));
        Ok(())
    }
}

struct MemReader {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl Read for MemReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Buffers writes and commits the object on flush (and again on drop, so a
/// writer dropped without an explicit flush still lands).
struct MemWriter {
    buf: Vec<u8>,
    path: String,
    files: Arc<RwLock<BTreeMap<String, Arc<Vec<u8>>>>>,
}

impl MemWriter {
    fn commit(&mut self) {
        self.files
            .write()
            .unwrap()
            .insert(self.path.clone(), Arc::new(self.buf.clone()));
    }
}

impl Write for MemWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit();
        Ok(())
    }
}

impl Drop for MemWriter {
    fn drop(&mut self) {
        self.commit();
    }
}
