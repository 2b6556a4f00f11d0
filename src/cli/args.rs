//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::domain::{NodeId, Steps};

/// Maintain nested-set numbered category trees stored in a TOML snapshot
#[derive(Parser, Debug)]
#[command(name = "nestree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Snapshot file (default: from config)
    #[arg(short, long, global = true, env = "NESTREE_FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Tree type (default: from config)
    #[arg(short, long, global = true)]
    pub tree: Option<String>,

    /// Project directory holding .nestree.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the forest as a tree
    Show,

    /// Check the numbering (exit 65 when inconsistent)
    Verify,

    /// Rebuild the numbering from parent pointers
    Recover {
        /// Only print what would change
        #[arg(long)]
        dry_run: bool,
    },

    /// Add a node
    Add {
        /// Title of the new node
        title: String,
        /// Parent node id (default: new root)
        #[arg(short, long)]
        parent: Option<NodeId>,
    },

    /// Move a node under another parent
    Move {
        /// Node id
        id: NodeId,
        /// New parent id (default: make it a root)
        #[arg(short, long)]
        parent: Option<NodeId>,
    },

    /// Move a node before its preceding siblings
    Up(StepArgs),

    /// Move a node after its following siblings
    Down(StepArgs),

    /// Remove a node (children are promoted or removed, per config)
    Remove {
        /// Node id
        id: NodeId,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Args, Debug)]
pub struct StepArgs {
    /// Node id
    pub id: NodeId,
    /// Number of positions to move
    #[arg(short = 'n', long, default_value_t = 1, conflicts_with = "all")]
    pub steps: usize,
    /// Move to the first/last position among its siblings
    #[arg(long)]
    pub all: bool,
}

impl StepArgs {
    pub fn steps(&self) -> Steps {
        if self.all {
            Steps::ToEnd
        } else {
            Steps::By(self.steps)
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}
