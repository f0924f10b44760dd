//! Content-addressed ("xet") repository backend.
//!
//! Paths are repository references: `user/repo[/branch[/in-branch/path]]`.
//! The backend is scoped to a session (store root, domain, identity) and
//! keeps repositories under `<store>/<user>/<repo>/branches/<branch>/...`.
//! Mutations issued inside a transaction bracket are attributed to the
//! transaction message in the repository history log.
//!
//! The chunking/deduplication engine sits behind this interface and is not
//! part of the crate; `prepare_deduplication_hints` is the seam the transfer
//! layer calls before large writes.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use globset::GlobBuilder;
use serde_json::{Map, Value};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{Backend, EntryInfo, XetStore};
use crate::config::Config;
use crate::errors::XmoveError;
use crate::pathutil;

/// A parsed repository reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub user: String,
    pub repo: String,
    pub branch: Option<String>,
    /// In-branch path; empty at a branch (or repository) root.
    pub path: String,
}

impl Reference {
    pub fn repo_key(&self) -> String {
        format!("{}/{}", self.user, self.repo)
    }

    pub fn is_branch_root(&self) -> bool {
        self.branch.is_some() && self.path.is_empty()
    }
}

/// Parses `user/repo[/branch[/path...]]`, tolerating a leading slash and an
/// optional `xet://` prefix.
pub fn parse_reference(path: &str) -> Result<Reference, XmoveError> {
    let raw = path
        .strip_prefix("xet://")
        .unwrap_or(path)
        .trim_start_matches('/');
    let raw = pathutil::strip_trailing_slashes(raw);
    let mut segments = raw.split('/');
    let user = segments.next().unwrap_or_default();
    let repo = segments.next().unwrap_or_default();
    if user.is_empty() || repo.is_empty() {
        return Err(XmoveError::InvalidReference(path.to_string()));
    }
    let branch = segments.next().map(str::to_string);
    let rest: Vec<&str> = segments.collect();
    Ok(Reference {
        user: user.to_string(),
        repo: repo.to_string(),
        branch,
        path: rest.join("/"),
    })
}

#[derive(Debug)]
struct Transaction {
    message: String,
    mutations: usize,
    repos: BTreeSet<String>,
}

#[derive(Debug)]
pub struct XetBackend {
    root: PathBuf,
    domain: String,
    user: Option<String>,
    txn: Mutex<Option<Transaction>>,
}

impl XetBackend {
    /// A handle scoped to the current session: carries the identity and
    /// domain context needed for branch resolution and repo duplication.
    pub fn from_session(cfg: &Config) -> Result<Arc<Self>> {
        fs::create_dir_all(&cfg.store_root).with_context(|| {
            format!("create xet store root '{}'", cfg.store_root.display())
        })?;
        Ok(Arc::new(Self {
            root: cfg.store_root.clone(),
            domain: cfg.domain.clone(),
            user: cfg.user.clone(),
            txn: Mutex::new(None),
        }))
    }

    fn branch_dir(&self, reference: &Reference) -> Result<PathBuf> {
        let branch = reference
            .branch
            .as_deref()
            .ok_or_else(|| anyhow!("reference '{}' names no branch", reference.repo_key()))?;
        Ok(self
            .root
            .join(&reference.user)
            .join(&reference.repo)
            .join("branches")
            .join(branch))
    }

    fn repo_dir(&self, reference: &Reference) -> PathBuf {
        self.root.join(&reference.user).join(&reference.repo)
    }

    /// Maps a reference string to its on-store location.
    fn locate(&self, path: &str) -> Result<PathBuf> {
        let reference = parse_reference(path)?;
        match reference.branch {
            None => Ok(self.repo_dir(&reference)),
            Some(_) => {
                let base = self.branch_dir(&reference)?;
                if reference.path.is_empty() {
                    Ok(base)
                } else {
                    Ok(base.join(&reference.path))
                }
            }
        }
    }

    /// Converts an on-store location back into a reference string rooted at
    /// `base_ref` (the reference that produced `base_dir`).
    fn key_for(base_ref: &str, base_dir: &Path, location: &Path) -> String {
        let rel = location.strip_prefix(base_dir).unwrap_or(location);
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if rel.is_empty() {
            base_ref.to_string()
        } else {
            pathutil::join(base_ref, &rel.join("/"))
        }
    }

    fn record_mutation(&self, op: &str, path: &str) {
        if let Ok(reference) = parse_reference(path)
            && let Ok(mut guard) = self.txn.lock()
            && let Some(txn) = guard.as_mut()
        {
            txn.mutations += 1;
            txn.repos.insert(reference.repo_key());
            debug!(op, path, message = %txn.message, "mutation attributed to transaction");
        }
    }

    fn attrs_path(&self, reference: &Reference) -> PathBuf {
        self.repo_dir(reference).join("attrs.json")
    }
}

impl Backend for XetBackend {
    fn protocol(&self) -> &str {
        "xet"
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        let location = self.locate(path)?;
        let meta = fs::metadata(&location)
            .with_context(|| format!("xet://{path}: no such entry"))?;
        Ok(if meta.is_dir() {
            EntryInfo::directory()
        } else {
            EntryInfo::file(meta.len())
        })
    }

    fn is_directory(&self, path: &str) -> bool {
        self.locate(path).map(|l| l.is_dir()).unwrap_or(false)
    }

    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let location = self.locate(path)?;
        let file =
            File::open(&location).with_context(|| format!("xet://{path}: open for read"))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn Write + Send>> {
        let location = self.locate(path)?;
        if let Some(parent) = location.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("xet://{path}: create parent directories"))?;
        }
        let file =
            File::create(&location).with_context(|| format!("xet://{path}: open for write"))?;
        self.record_mutation("write", path);
        Ok(Box::new(BufWriter::new(file)))
    }

    fn enumerate(&self, path: &str) -> Result<BTreeMap<String, EntryInfo>> {
        let base_ref = pathutil::strip_trailing_slashes(path.strip_prefix("xet://").unwrap_or(path));
        let base_dir = self.locate(path)?;
        let mut entries = BTreeMap::new();
        for entry in WalkDir::new(&base_dir).min_depth(1) {
            let entry = entry.map_err(|e| anyhow!("walk xet://{path}: {e}"))?;
            let key = Self::key_for(base_ref, &base_dir, entry.path());
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
        let pattern = pathutil::strip_trailing_slashes(pattern.strip_prefix("xet://").unwrap_or(pattern));
        let parent_ref = pathutil::parent(pattern);
        let segment = pathutil::final_segment(pattern);
        let matcher = GlobBuilder::new(segment)
            .literal_separator(true)
            .build()
            .map_err(|e| anyhow!("bad glob '{segment}': {e}"))?
            .compile_matcher();

        let base_dir = self.locate(parent_ref)?;
        let mut matches = BTreeMap::new();
        let listing = fs::read_dir(&base_dir)
            .with_context(|| format!("xet://{parent_ref}: list"))?;
        for entry in listing {
            let entry = entry.with_context(|| format!("xet://{parent_ref}: list entry"))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !matcher.is_match(&name) {
                continue;
            }
            let meta = entry.metadata().with_context(|| format!("stat {name}"))?;
            let info = if meta.is_dir() {
                EntryInfo::directory()
            } else {
                EntryInfo::file(meta.len())
            };
            matches.insert(pathutil::join(parent_ref, &name), info);
        }
        Ok(matches)
    }

    fn make_directories(&self, path: &str) -> Result<()> {
        let location = self.locate(path)?;
        fs::create_dir_all(&location)
            .with_context(|| format!("xet://{path}: create directory"))?;
        Ok(())
    }

    fn rename(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.locate(src)?;
        let to = self.locate(dst)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("xet://{dst}: create parent directories"))?;
        }
        fs::rename(&from, &to).with_context(|| format!("xet://{src} -> xet://{dst}: move"))?;
        self.record_mutation("move", src);
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let location = self.locate(path)?;
        let meta = fs::symlink_metadata(&location)
            .with_context(|| format!("xet://{path}: no such entry"))?;
        if meta.is_dir() {
            fs::remove_dir_all(&location)
        } else {
            fs::remove_file(&location)
        }
        .with_context(|| format!("xet://{path}: remove"))?;
        self.record_mutation("remove", path);
        Ok(())
    }

    fn as_xet(&self) -> Option<&dyn XetStore> {
        Some(self)
    }
}

impl XetStore for XetBackend {
    fn begin_transaction(&self, message: &str) -> Result<()> {
        let mut guard = self.txn.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_some() {
            return Err(XmoveError::TransactionActive(self.protocol().to_string()).into());
        }
        debug!(message, "transaction opened");
        *guard = Some(Transaction {
            message: message.to_string(),
            mutations: 0,
            repos: BTreeSet::new(),
        });
        Ok(())
    }

    fn end_transaction(&self) -> Result<()> {
        let txn = self
            .txn
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
            .ok_or_else(|| XmoveError::TransactionNotActive(self.protocol().to_string()))?;
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        for repo in &txn.repos {
            let reference = parse_reference(repo)?;
            let log_path = self.repo_dir(&reference).join("history.log");
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut log = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .with_context(|| format!("open history log for {repo}"))?;
            writeln!(log, "{stamp} {} ({} mutation(s))", txn.message, txn.mutations)?;
        }
        info!(message = %txn.message, mutations = txn.mutations, "transaction closed");
        Ok(())
    }

    fn branch_info(&self, path: &str) -> Result<EntryInfo> {
        let reference = parse_reference(path)?;
        if reference.branch.is_none() {
            return Err(XmoveError::BranchNotFound(path.to_string()).into());
        }
        let dir = self.branch_dir(&reference)?;
        if dir.is_dir() {
            Ok(EntryInfo::directory())
        } else {
            Err(XmoveError::BranchNotFound(path.to_string()).into())
        }
    }

    fn is_directory_or_branch(&self, path: &str) -> bool {
        match parse_reference(path) {
            Ok(reference) if reference.is_branch_root() => {
                self.branch_dir(&reference).map(|d| d.is_dir()).unwrap_or(false)
            }
            Ok(_) => self.is_directory(path),
            Err(_) => false,
        }
    }

    fn is_branch_root(&self, path: &str) -> bool {
        parse_reference(path).map(|r| r.is_branch_root()).unwrap_or(false)
    }

    fn copy_file(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.locate(src)?;
        let to = self.locate(dst)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("xet://{dst}: create parent directories"))?;
        }
        if to.exists() {
            fs::remove_file(&to).ok();
        }
        // Reference-based copy: link when the store supports it, fall back
        // to a byte copy otherwise.
        if fs::hard_link(&from, &to).is_err() {
            fs::copy(&from, &to)
                .with_context(|| format!("xet://{src} -> xet://{dst}: copy"))?;
        }
        self.record_mutation("copy", dst);
        Ok(())
    }

    fn copy_directory(&self, src: &str, dst: &str) -> Result<()> {
        let from = self.locate(src)?;
        let to = self.locate(dst)?;
        if !from.is_dir() {
            bail!("xet://{src}: not a directory");
        }
        fs::create_dir_all(&to)
            .with_context(|| format!("xet://{dst}: create destination tree"))?;
        for entry in WalkDir::new(&from).min_depth(1) {
            let entry = entry.map_err(|e| anyhow!("walk xet://{src}: {e}"))?;
            let rel = entry
                .path()
                .strip_prefix(&from)
                .expect("walkdir yields children of its root");
            let target = to.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                if fs::hard_link(entry.path(), &target).is_err() {
                    fs::copy(entry.path(), &target).with_context(|| {
                        format!("copy {} into xet://{dst}", entry.path().display())
                    })?;
                }
            }
        }
        self.record_mutation("copy tree", dst);
        Ok(())
    }

    fn prepare_deduplication_hints(&self, path: &str) -> Result<()> {
        // The store behind this interface prefetches chunk manifests for the
        // target; locally there is nothing to warm up.
        debug!(path, "deduplication hints requested");
        Ok(())
    }

    fn duplicate_repository(&self, src: &str, dst: &str) -> Result<()> {
        let src_ref = parse_reference(src)?;
        let dst_ref = parse_reference(dst)?;
        if src_ref.branch.is_some() || dst_ref.branch.is_some() {
            bail!("duplicate operates on whole repositories, not branches");
        }
        let from = self.repo_dir(&src_ref);
        let to = self.repo_dir(&dst_ref);
        if !from.is_dir() {
            bail!("xet://{}: no such repository", src_ref.repo_key());
        }
        if to.exists() {
            bail!("xet://{}: repository already exists", dst_ref.repo_key());
        }
        fs::create_dir_all(&to)?;
        for entry in WalkDir::new(&from).min_depth(1) {
            let entry = entry.map_err(|e| anyhow!("walk xet://{src}: {e}"))?;
            let rel = entry
                .path()
                .strip_prefix(&from)
                .expect("walkdir yields children of its root");
            let target = to.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &target).with_context(|| {
                    format!("duplicate {} into {}", entry.path().display(), dst_ref.repo_key())
                })?;
            }
        }
        info!(src = %src_ref.repo_key(), dst = %dst_ref.repo_key(), "repository duplicated");
        Ok(())
    }

    fn set_repository_attribute(&self, path: &str, attr: &str, value: bool) -> Result<()> {
        let reference = parse_reference(path)?;
        let attrs_path = self.attrs_path(&reference);
        if !self.repo_dir(&reference).is_dir() {
            bail!("xet://{}: no such repository", reference.repo_key());
        }
        let mut attrs: Map<String, Value> = match fs::read_to_string(&attrs_path) {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parse {}", attrs_path.display()))?,
            Err(_) => Map::new(),
        };
        attrs.insert(attr.to_string(), Value::Bool(value));
        fs::write(&attrs_path, serde_json::to_string_pretty(&Value::Object(attrs))?)
            .with_context(|| format!("write {}", attrs_path.display()))?;
        Ok(())
    }

    fn current_user(&self) -> Result<String> {
        self.user.clone().ok_or_else(|| XmoveError::NotLoggedIn.into())
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

impl XetBackend {
    /// Attaches a branch at `mountpoint` by the simplest local mechanism.
    /// The userspace-filesystem service this stands in for lives outside
    /// the crate.
    pub fn mount(&self, reference: &str, mountpoint: &Path) -> Result<()> {
        let parsed = parse_reference(reference)?;
        if !parsed.is_branch_root() {
            bail!("mount expects a branch reference, got 'xet://{reference}'");
        }
        let branch = self.branch_dir(&parsed)?;
        if !branch.is_dir() {
            return Err(XmoveError::BranchNotFound(reference.to_string()).into());
        }
        if mountpoint.exists() {
            bail!("mountpoint '{}' already exists", mountpoint.display());
        }
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(&branch, mountpoint).with_context(|| {
                format!("attach xet://{reference} at '{}'", mountpoint.display())
            })?;
            info!(reference, mountpoint = %mountpoint.display(), "branch attached");
            Ok(())
        }
        #[cfg(not(unix))]
        {
            bail!("mount is only supported on Unix hosts")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn session(root: &Path) -> Arc<XetBackend> {
        let cfg = Config {
            store_root: root.to_path_buf(),
            user: Some("alice".to_string()),
            ..Config::default()
        };
        XetBackend::from_session(&cfg).unwrap()
    }

    fn seed_branch(be: &XetBackend, reference: &str) {
        be.make_directories(reference).unwrap();
    }

    #[test]
    fn parse_reference_forms() {
        let r = parse_reference("alice/data/main/dir/f.txt").unwrap();
        assert_eq!(r.user, "alice");
        assert_eq!(r.repo, "data");
        assert_eq!(r.branch.as_deref(), Some("main"));
        assert_eq!(r.path, "dir/f.txt");

        let r = parse_reference("xet://alice/data/main").unwrap();
        assert!(r.is_branch_root());

        let r = parse_reference("alice/data").unwrap();
        assert!(r.branch.is_none());
        assert!(!r.is_branch_root());

        assert!(parse_reference("alice").is_err());
        assert!(parse_reference("").is_err());
    }

    #[test]
    fn branch_info_requires_existing_branch() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");

        assert!(be.branch_info("alice/data/main").is_ok());
        assert!(be.branch_info("alice/data/main/sub/file").is_ok());
        let err = be.branch_info("alice/data/ghost").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<XmoveError>(),
            Some(XmoveError::BranchNotFound(_))
        ));
    }

    #[test]
    fn branch_root_is_directory_like() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");

        assert!(be.is_directory_or_branch("alice/data/main"));
        assert!(be.is_branch_root("alice/data/main"));
        assert!(!be.is_branch_root("alice/data/main/file.txt"));
    }

    #[test]
    fn transaction_state_machine() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");

        be.begin_transaction("first").unwrap();
        let err = be.begin_transaction("second").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<XmoveError>(),
            Some(XmoveError::TransactionActive(_))
        ));

        let mut w = be.open_write("alice/data/main/a.txt").unwrap();
        w.write_all(b"x").unwrap();
        w.flush().unwrap();
        drop(w);
        be.end_transaction().unwrap();

        let log = fs::read_to_string(
            dir.path().join("alice").join("data").join("history.log"),
        )
        .unwrap();
        assert!(log.contains("first"));
        assert!(log.contains("1 mutation(s)"));

        let err = be.end_transaction().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<XmoveError>(),
            Some(XmoveError::TransactionNotActive(_))
        ));
    }

    #[test]
    fn enumerate_keys_are_references() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");
        let mut w = be.open_write("alice/data/main/d/f.txt").unwrap();
        w.write_all(b"xyz").unwrap();
        drop(w);

        let entries = be.enumerate("alice/data/main").unwrap();
        assert!(entries.get("alice/data/main/d").is_some_and(|i| i.is_dir()));
        assert_eq!(
            entries.get("alice/data/main/d/f.txt").and_then(|i| i.size),
            Some(3)
        );
    }

    #[test]
    fn copy_file_and_directory_within_store() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");
        seed_branch(&be, "alice/data/dev");
        drop(be.open_write("alice/data/main/t/a.txt").unwrap());

        be.copy_file("alice/data/main/t/a.txt", "alice/data/dev/a.txt")
            .unwrap();
        assert!(be.info("alice/data/dev/a.txt").is_ok());

        be.copy_directory("alice/data/main/t", "alice/data/dev/t2").unwrap();
        assert!(be.info("alice/data/dev/t2/a.txt").is_ok());
    }

    #[test]
    fn duplicate_and_attributes() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");
        drop(be.open_write("alice/data/main/a.txt").unwrap());

        be.duplicate_repository("alice/data", "alice/copy").unwrap();
        assert!(be.branch_info("alice/copy/main").is_ok());

        be.set_repository_attribute("alice/copy", "private", true).unwrap();
        let raw =
            fs::read_to_string(dir.path().join("alice").join("copy").join("attrs.json")).unwrap();
        let attrs: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(attrs["private"], Value::Bool(true));

        // Duplicating over an existing repository is refused.
        assert!(be.duplicate_repository("alice/data", "alice/copy").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn mount_attaches_branch() {
        let dir = tempdir().unwrap();
        let be = session(dir.path());
        seed_branch(&be, "alice/data/main");
        drop(be.open_write("alice/data/main/a.txt").unwrap());

        let mnt = dir.path().join("mnt");
        be.mount("alice/data/main", &mnt).unwrap();
        assert!(mnt.join("a.txt").exists());

        // Existing mountpoint refused.
        assert!(be.mount("alice/data/main", &mnt).is_err());
    }
}
