//! Top-level operations: copy, move, remove, duplicate, info.
//!
//! This layer owns the recovered-vs-fatal split: resolution and validation
//! failures abort before any I/O; per-item transfer failures are absorbed
//! downstream and resurface here only as a nonzero tally, which turns into
//! a single error after every sibling finished.

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use crate::backend::{self, Backend, EntryInfo, XetBackend, XetStore};
use crate::config::Config;
use crate::copy::copy_resolved;
use crate::errors::XmoveError;
use crate::pathutil;
use crate::permits::PermitPool;
use crate::transfer::TransferStats;
use crate::uri;

/// Scoped transaction bracket. Begins on construction and ends on drop, so
/// the transaction is closed on every exit path, error or not.
pub(crate) struct TxnGuard<'a> {
    store: &'a dyn XetStore,
}

impl<'a> TxnGuard<'a> {
    pub(crate) fn begin(store: &'a dyn XetStore, message: &str) -> Result<Self> {
        store.begin_transaction(message)?;
        Ok(Self { store })
    }
}

impl Drop for TxnGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.end_transaction() {
            error!("failed to close transaction: {e:#}");
        }
    }
}

/// Pre-flight checks for a copy, run once before any transfer.
fn validate_copy(
    src: &dyn Backend,
    src_path: &str,
    dst: &dyn Backend,
    dst_path: &str,
) -> Result<()> {
    if let Some(src_xet) = src.as_xet() {
        src_xet
            .branch_info(src_path)
            .with_context(|| format!("source branch check for 'xet://{src_path}'"))?;
    }
    if let Some(dst_xet) = dst.as_xet() {
        // A branch-to-branch copy may create the destination branch, so its
        // prior existence must not be required.
        if let Some(src_xet) = src.as_xet()
            && src_xet.is_branch_root(src_path)
            && dst_xet.is_branch_root(dst_path)
        {
            return Ok(());
        }
        dst_xet
            .branch_info(dst_path)
            .with_context(|| format!("destination branch check for 'xet://{dst_path}'"))?;
    }
    Ok(())
}

/// Copies `source` to `destination`, expanding wildcards and directory
/// trees. When the destination already exists as a directory and the source
/// is not a wildcard, the copy lands *inside* it, mirroring conventional
/// `cp` semantics.
pub fn copy(
    cfg: &Config,
    permits: &PermitPool,
    source: &str,
    destination: &str,
    recursive: bool,
    message: Option<&str>,
) -> Result<()> {
    let (src, src_path) = uri::resolve(cfg, source)?;
    let (dst, mut dst_path) = uri::resolve(cfg, destination)?;

    if backend::is_directory(&*dst, &dst_path) && !pathutil::contains_wildcard(source) {
        let last = pathutil::final_segment(pathutil::strip_trailing_slashes(source));
        dst_path = pathutil::join(pathutil::strip_trailing_slashes(&dst_path), last);
    }

    validate_copy(&*src, &src_path, &*dst, &dst_path)?;

    let message = match message {
        Some(m) => m.to_string(),
        None => format!("copy {source} to {destination}"),
    };
    let stats = TransferStats::new();
    {
        let _guard = match dst.as_xet() {
            Some(store) => Some(TxnGuard::begin(store, &message)?),
            None => None,
        };
        copy_resolved(&src, &src_path, &dst, &dst_path, recursive, permits, &stats)?;
    }

    match stats.failures() {
        0 => Ok(()),
        n => bail!("{n} item(s) failed to copy; see the log for details"),
    }
}

/// Moves `source` to `target` within one backend. Cross-backend moves are
/// rejected before anything mutates.
pub fn move_entry(
    cfg: &Config,
    source: &str,
    target: &str,
    recursive: bool,
    message: Option<&str>,
) -> Result<()> {
    let (src, src_path) = uri::resolve(cfg, source)?;
    let (dst, dst_path) = uri::resolve(cfg, target)?;

    if src.protocol() != dst.protocol() {
        return Err(XmoveError::CrossProtocolMove {
            src: src.protocol().to_string(),
            dst: dst.protocol().to_string(),
        }
        .into());
    }

    let message = match message {
        Some(m) => m.to_string(),
        None if recursive => format!("move {source} to {target} recursively"),
        None => format!("move {source} to {target}"),
    };

    let _guard = match dst.as_xet() {
        Some(store) => Some(TxnGuard::begin(store, &message)?),
        None => None,
    };
    dst.rename(&src_path, &dst_path)
        .with_context(|| format!("move '{source}' to '{target}'"))?;
    info!("Moved {source} to {target}");
    Ok(())
}

/// Deletes every path in `paths`. Branch roots are refused outright: branch
/// deletion is irreversible and lives in a dedicated operation.
pub fn remove(cfg: &Config, paths: &[String], message: Option<&str>) -> Result<()> {
    let Some(first) = paths.first() else {
        bail!("no paths given to remove");
    };
    let (handle, _) = uri::resolve(cfg, first)?;

    let mut resolved = Vec::with_capacity(paths.len());
    for raw in paths {
        let (b, path) = uri::resolve(cfg, raw)?;
        if b.protocol() != handle.protocol() {
            bail!(
                "cannot mix protocols in one remove: '{}' vs '{}'",
                handle.protocol(),
                b.protocol()
            );
        }
        resolved.push((raw.as_str(), path));
    }

    if let Some(store) = handle.as_xet() {
        for (raw, path) in &resolved {
            if store.is_branch_root(path) {
                return Err(XmoveError::BranchDeleteRefused((*raw).to_string()).into());
            }
        }
    }

    let message = match message {
        Some(m) => m.to_string(),
        None => format!("delete {paths:?}"),
    };
    let _guard = match handle.as_xet() {
        Some(store) => Some(TxnGuard::begin(store, &message)?),
        None => None,
    };

    let mut failed = 0usize;
    for (raw, path) in &resolved {
        match handle.remove(path) {
            Ok(()) => info!("Removed {raw}"),
            Err(e) => {
                error!("Failed to remove {raw}: {e:#}");
                failed += 1;
            }
        }
    }
    match failed {
        0 => Ok(()),
        n => bail!("{n} path(s) failed to delete"),
    }
}

/// Duplicates a repository under the caller's namespace (or an explicit
/// destination), optionally adjusting visibility afterwards. A failed
/// visibility change is reported but never rolls back the duplication.
pub fn duplicate(
    cfg: &Config,
    source: &str,
    dest: Option<&str>,
    private: bool,
    public: bool,
) -> Result<()> {
    let store = XetBackend::from_session(cfg)?;

    let repo_name = pathutil::final_segment(pathutil::strip_trailing_slashes(source));
    let dest = match dest {
        Some(d) => d.to_string(),
        None => {
            let user = store.current_user()?;
            let derived = format!("xet://{user}/{repo_name}");
            info!("Duplicating to {derived}");
            derived
        }
    };

    store.duplicate_repository(source, &dest)?;
    info!("Duplicated {source} to {dest}");

    let adjustment = if private {
        Some(("private", true))
    } else if public {
        Some(("private", false))
    } else {
        None
    };
    if let Some((attr, value)) = adjustment
        && let Err(e) = store.set_repository_attribute(&dest, attr, value)
    {
        let settings = format!(
            "{}/{}/settings",
            store.domain(),
            dest.strip_prefix("xet://").unwrap_or(&dest)
        );
        warn!("Permission changes may not have been made. Adjust manually at: {settings}");
        bail!("repository duplicated, but setting visibility failed: {e:#}");
    }
    Ok(())
}

/// Metadata for any URI.
pub fn entry_info(cfg: &Config, target: &str) -> Result<EntryInfo> {
    let (handle, path) = uri::resolve(cfg, target)?;
    handle.info(&path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::{Read, Write};
    use std::path::Path;
    use tempfile::tempdir;

    fn xet_cfg(root: &Path) -> Config {
        Config {
            store_root: root.to_path_buf(),
            user: Some("alice".to_string()),
            ..Config::default()
        }
    }

    fn seed_xet(cfg: &Config, reference: &str, data: &[u8]) {
        let store = XetBackend::from_session(cfg).unwrap();
        let mut w = store.open_write(reference).unwrap();
        w.write_all(data).unwrap();
        w.flush().unwrap();
    }

    fn seed_branch(cfg: &Config, reference: &str) {
        let store = XetBackend::from_session(cfg).unwrap();
        store.make_directories(reference).unwrap();
    }

    #[test]
    fn cross_protocol_move_is_rejected_without_mutation() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(&dir.path().join("store"));
        let src_file = dir.path().join("a.txt");
        fs::write(&src_file, b"data").unwrap();

        let err = move_entry(
            &cfg,
            src_file.to_str().unwrap(),
            "mem://dest/a.txt",
            false,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<XmoveError>(),
            Some(XmoveError::CrossProtocolMove { .. })
        ));
        // Nothing moved on either side.
        assert!(src_file.exists());
        assert!(crate::backend::memory::shared().open_read("dest/a.txt").is_err());
    }

    #[test]
    fn move_within_local_backend() {
        let dir = tempdir().unwrap();
        let cfg = Config::default();
        let src = dir.path().join("from.txt");
        let dst = dir.path().join("sub").join("to.txt");
        fs::write(&src, b"payload").unwrap();

        move_entry(
            &cfg,
            src.to_str().unwrap(),
            dst.to_str().unwrap(),
            false,
            None,
        )
        .unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"payload");
    }

    #[test]
    fn remove_refuses_branch_roots_without_transaction() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(dir.path());
        seed_branch(&cfg, "alice/data/main");

        let err = remove(&cfg, &["xet://alice/data/main".to_string()], None).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<XmoveError>(),
            Some(XmoveError::BranchDeleteRefused(_))
        ));
        // No transaction was opened, so no history was written.
        assert!(!dir.path().join("alice/data/history.log").exists());
    }

    #[test]
    fn remove_brackets_deletes_in_one_transaction() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(dir.path());
        seed_xet(&cfg, "alice/data/main/a.txt", b"a");
        seed_xet(&cfg, "alice/data/main/b.txt", b"b");

        remove(
            &cfg,
            &[
                "xet://alice/data/main/a.txt".to_string(),
                "xet://alice/data/main/b.txt".to_string(),
            ],
            Some("cleanup"),
        )
        .unwrap();

        let store = XetBackend::from_session(&cfg).unwrap();
        assert!(store.info("alice/data/main/a.txt").is_err());
        assert!(store.info("alice/data/main/b.txt").is_err());

        let log = fs::read_to_string(dir.path().join("alice/data/history.log")).unwrap();
        assert_eq!(log.lines().count(), 1);
        assert!(log.contains("cleanup"));
        assert!(log.contains("2 mutation(s)"));
    }

    #[test]
    fn transaction_closes_when_guarded_operation_fails() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(dir.path());
        seed_xet(&cfg, "alice/data/main/real.txt", b"x");

        // Second path does not exist: the delete partially fails, yet the
        // transaction still closes and records the successful mutation.
        let err = remove(
            &cfg,
            &[
                "xet://alice/data/main/real.txt".to_string(),
                "xet://alice/data/main/ghost.txt".to_string(),
            ],
            Some("partial"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("failed to delete"));

        let log = fs::read_to_string(dir.path().join("alice/data/history.log")).unwrap();
        assert!(log.contains("partial"));
    }

    #[test]
    fn copy_into_existing_directory_appends_source_name() {
        let dir = tempdir().unwrap();
        let cfg = Config::default();
        let permits = PermitPool::new(2);

        let src = dir.path().join("data.bin");
        fs::write(&src, b"contents").unwrap();
        let dest_dir = dir.path().join("existing");
        fs::create_dir(&dest_dir).unwrap();

        copy(
            &cfg,
            &permits,
            src.to_str().unwrap(),
            dest_dir.to_str().unwrap(),
            false,
            None,
        )
        .unwrap();
        assert_eq!(fs::read(dest_dir.join("data.bin")).unwrap(), b"contents");
    }

    #[test]
    fn copy_validates_source_branch_first() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(dir.path());
        let permits = PermitPool::new(1);

        let err = copy(
            &cfg,
            &permits,
            "xet://alice/data/ghost/f.txt",
            "mem://out/f.txt",
            false,
            None,
        )
        .unwrap_err();
        assert!(
            err.chain()
                .any(|c| matches!(c.downcast_ref::<XmoveError>(), Some(XmoveError::BranchNotFound(_))))
        );
    }

    #[test]
    fn branch_to_branch_copy_may_create_destination() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(dir.path());
        let permits = PermitPool::new(2);
        seed_xet(&cfg, "alice/data/main/f.txt", b"v1");

        copy(
            &cfg,
            &permits,
            "xet://alice/data/main",
            "xet://alice/data/feature",
            true,
            None,
        )
        .unwrap();

        let store = XetBackend::from_session(&cfg).unwrap();
        assert!(store.branch_info("alice/data/feature").is_ok());
        let mut out = Vec::new();
        store
            .open_read("alice/data/feature/f.txt")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"v1");
    }

    #[test]
    fn duplicate_uses_identity_for_default_destination() {
        let dir = tempdir().unwrap();
        let cfg = xet_cfg(dir.path());
        seed_xet(&cfg, "bob/shared/main/model.bin", b"weights");

        duplicate(&cfg, "xet://bob/shared", None, true, false).unwrap();

        let store = XetBackend::from_session(&cfg).unwrap();
        assert!(store.branch_info("alice/shared/main").is_ok());
        let attrs = fs::read_to_string(dir.path().join("alice/shared/attrs.json")).unwrap();
        assert!(attrs.contains("\"private\": true"));
    }

    #[test]
    fn entry_info_resolves_any_uri() {
        let dir = tempdir().unwrap();
        let cfg = Config::default();
        let f = dir.path().join("probe.txt");
        fs::write(&f, b"12345").unwrap();

        let info = entry_info(&cfg, f.to_str().unwrap()).unwrap();
        assert!(!info.is_dir());
        assert_eq!(info.size, Some(5));
    }
}
