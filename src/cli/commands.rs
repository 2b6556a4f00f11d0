//! Command dispatch

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::application::services::verifier::differs;
use crate::application::services::Verification;
use crate::cli::args::{Cli, Commands, ConfigCommands, StepArgs};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::{forest_from_views, Category, NodeHandle, NodeId, TreeNodeConvert};
use crate::exitcode;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::snapshot;
use crate::infrastructure::traits::PersistenceAdapter;
use crate::infrastructure::{InfraError, MemoryStore, Session};

type CategorySession = Session<MemoryStore<Category>>;

/// Run a command; returns the process exit code.
pub fn execute(cli: &Cli, container: &ServiceContainer) -> CliResult<i32> {
    let tree = container.tree_type(cli.tree.as_deref());
    let path = container.snapshot_path(cli.file.as_deref());
    debug!("tree {}, snapshot {}", tree, path.display());

    match &cli.command {
        Commands::Show => show(container, &path, tree),
        Commands::Verify => verify(container, &path, tree),
        Commands::Recover { dry_run } => recover(container, &path, tree, *dry_run),
        Commands::Add { title, parent } => add(container, &path, tree, title, *parent),
        Commands::Move { id, parent } => move_node(container, &path, tree, *id, *parent),
        Commands::Up(args) => reorder(container, &path, tree, args, true),
        Commands::Down(args) => reorder(container, &path, tree, args, false),
        Commands::Remove { id } => remove(container, &path, tree, *id),
        Commands::Config { command } => config(container, cli.project_dir.as_deref(), command),
        Commands::Completion { .. } => Err(CliError::Usage(
            "completion is generated before settings are loaded".into(),
        )),
    }
}

fn lookup(session: &CategorySession, id: NodeId) -> CliResult<NodeHandle> {
    session
        .store()
        .handle_of(id)
        .ok_or_else(|| CliError::InvalidArgs(format!("no node with id {id}")))
}

fn label(store: &MemoryStore<Category>, handle: NodeHandle) -> String {
    let id = store
        .id_of(handle)
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    match store.get(handle) {
        Some(category) => format!("{id}: {category}"),
        None => id,
    }
}

#[instrument(skip(container))]
fn show(container: &ServiceContainer, path: &Path, tree: &str) -> CliResult<i32> {
    let session = container.session(path, tree)?;
    let store = session.store();
    let views = store.select_all().map_err(InfraError::from)?;
    let forest = forest_from_views(&views, |view| label(store, view.handle));
    if forest.is_empty() {
        output::info(&format!("{}: empty", path.display()));
        return Ok(exitcode::OK);
    }
    output::header(&format!("{} ({})", path.display(), tree));
    for rendered in forest.to_tree_strings() {
        output::info(&rendered);
    }
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn verify(container: &ServiceContainer, path: &Path, tree: &str) -> CliResult<i32> {
    let mut session = container.session(path, tree)?;
    match session.verify()? {
        Verification::Valid => {
            output::success(&format!("{} is consistent", path.display()));
            Ok(exitcode::OK)
        }
        Verification::Inconsistent(diagnostics) => {
            output::header(&format!("{}: {} problem(s)", path.display(), diagnostics.len()));
            for diagnostic in &diagnostics {
                output::failure(diagnostic);
            }
            Ok(exitcode::DATAERR)
        }
    }
}

#[instrument(skip(container))]
fn recover(container: &ServiceContainer, path: &Path, tree: &str, dry_run: bool) -> CliResult<i32> {
    let mut session = container.session(path, tree)?;
    if dry_run {
        let plan = session.plan_recovery()?;
        let meta = session.listener().meta();
        let store = session.store();
        let mut changes = 0;
        for placement in &plan {
            let view = store.view(placement.handle).map_err(InfraError::from)?;
            if differs(meta, placement, &view) {
                changes += 1;
                output::detail(&format!(
                    "{}: [{}, {}] -> [{}, {}]",
                    label(store, placement.handle),
                    view.left,
                    view.right,
                    placement.left,
                    placement.right
                ));
            }
        }
        output::info(&format!("{changes} node(s) would change"));
        return Ok(exitcode::OK);
    }

    let changed = session.recover()?;
    snapshot::save(session.store(), path)?;
    output::success(&format!("recovered {}: {} node(s) rewritten", path.display(), changed));
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn add(container: &ServiceContainer, path: &Path, tree: &str, title: &str, parent: Option<NodeId>) -> CliResult<i32> {
    let mut session = container.session(path, tree)?;
    let node = match parent {
        Some(id) => Category::child_of(title, lookup(&session, id)?),
        None => Category::new(title),
    };
    session.persist(node)?;
    let ids = session.flush()?;
    snapshot::save(session.store(), path)?;
    for (_, id) in ids {
        output::success(&format!("added '{title}' as {id}"));
    }
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn move_node(container: &ServiceContainer, path: &Path, tree: &str, id: NodeId, parent: Option<NodeId>) -> CliResult<i32> {
    let mut session = container.session(path, tree)?;
    let handle = lookup(&session, id)?;
    let parent = parent.map(|p| lookup(&session, p)).transpose()?;
    session.set_parent(handle, parent)?;
    session.flush()?;
    snapshot::save(session.store(), path)?;
    match parent {
        Some(parent) => output::success(&format!("moved {} under {}", id, label(session.store(), parent))),
        None => output::success(&format!("moved {id} to the end as a root")),
    }
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn reorder(container: &ServiceContainer, path: &Path, tree: &str, args: &StepArgs, up: bool) -> CliResult<i32> {
    let mut session = container.session(path, tree)?;
    let handle = lookup(&session, args.id)?;
    let swaps = if up {
        session.move_up(handle, args.steps())?
    } else {
        session.move_down(handle, args.steps())?
    };
    if swaps == 0 {
        output::warning(&format!("{} has no sibling to pass", args.id));
        return Ok(exitcode::OK);
    }
    snapshot::save(session.store(), path)?;
    output::success(&format!(
        "moved {} {} by {} position(s)",
        args.id,
        if up { "up" } else { "down" },
        swaps
    ));
    Ok(exitcode::OK)
}

#[instrument(skip(container))]
fn remove(container: &ServiceContainer, path: &Path, tree: &str, id: NodeId) -> CliResult<i32> {
    let mut session = container.session(path, tree)?;
    let handle = lookup(&session, id)?;
    let before = session.store().len();
    session.remove(handle)?;
    session.flush()?;
    snapshot::save(session.store(), path)?;
    output::success(&format!(
        "removed {} ({} node(s) deleted)",
        id,
        before - session.store().len()
    ));
    Ok(exitcode::OK)
}

fn config(container: &ServiceContainer, project_dir: Option<&Path>, command: &ConfigCommands) -> CliResult<i32> {
    let local = local_config_path(&project_dir_or_cwd(project_dir)?);
    match command {
        ConfigCommands::Show => {
            output::info(&container.settings.to_toml()?);
        }
        ConfigCommands::Init { global } => {
            let target = if *global {
                global_config_path()
                    .ok_or_else(|| CliError::Usage("no config directory on this platform".into()))?
            } else {
                local
            };
            if target.exists() {
                return Err(CliError::Usage(format!("{} already exists", target.display())));
            }
            if let Some(dir) = target.parent() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| InfraError::io(format!("create {}", dir.display()), e))?;
            }
            std::fs::write(&target, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", target.display()), e))?;
            output::success(&format!("created {}", target.display()));
        }
        ConfigCommands::Path => {
            match global_config_path() {
                Some(global) => output::detail(&format!("global: {}", global.display())),
                None => output::detail("global: -"),
            }
            output::detail(&format!("local:  {}", local.display()));
        }
    }
    Ok(exitcode::OK)
}

fn project_dir_or_cwd(project_dir: Option<&Path>) -> CliResult<PathBuf> {
    match project_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("determine current directory", e).into()),
    }
}
