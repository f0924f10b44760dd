//! Application orchestrator.
//! Loads/merges config, initializes logging, and dispatches the subcommand
//! onto the operations layer. Any error reaching this layer has already
//! been reported at its source; it is logged once more with context and
//! turns into a nonzero exit status.

use anyhow::Result;
use tracing::{debug, error};

use xmove::backend::{EntryKind, XetBackend};
use xmove::output as out;
use xmove::{Config, PermitPool, config, ops};

use crate::cli::{Args, Command};
use crate::logging::init_tracing;

/// Run the CLI application.
pub fn run(args: Args) -> Result<()> {
    let mut cfg: Config = config::load();
    if let Some(level) = args.effective_log_level() {
        cfg.log_level = level;
    }
    if let Some(jobs) = args.jobs {
        cfg.max_concurrent = jobs.max(1);
    }

    init_tracing(&cfg.log_level, args.json)?;
    debug!("Starting xmove: {:?}", args);

    let permits = PermitPool::new(cfg.max_concurrent);

    let result = match &args.command {
        Command::Cp { source, destination, recursive, message } => ops::copy(
            &cfg,
            &permits,
            source,
            destination,
            *recursive,
            message.as_deref(),
        ),
        Command::Mv { source, target, recursive, message } => {
            ops::move_entry(&cfg, source, target, *recursive, message.as_deref())
        }
        Command::Rm { paths, message } => ops::remove(&cfg, paths, message.as_deref()),
        Command::Info { uri } => ops::entry_info(&cfg, uri).map(|info| {
            let kind = match info.kind {
                EntryKind::Directory => "directory",
                EntryKind::File => "file",
            };
            match info.size {
                Some(size) => out::print_user(&format!("{uri}: {kind}, {size} bytes")),
                None => out::print_user(&format!("{uri}: {kind}")),
            }
        }),
        Command::Duplicate { source, destination, private, public } => {
            ops::duplicate(&cfg, source, destination.as_deref(), *private, *public)
        }
        Command::Login { user, password, email, host, force, no_overwrite } => {
            config::configure_login(
                user,
                email.as_deref(),
                password,
                host.as_deref(),
                *force,
                *no_overwrite,
            )
            .map(|path| {
                out::print_success(&format!("Login stored in {}", path.display()));
            })
        }
        Command::Mount { source, path } => XetBackend::from_session(&cfg)
            .and_then(|store| store.mount(source, path))
            .map(|()| {
                out::print_success(&format!("Attached {source} at {}", path.display()));
            }),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
        out::print_error(&format!("{e:#}"));
    }
    result
}
