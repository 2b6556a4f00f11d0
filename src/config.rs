//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/nestree/nestree.toml`
//! 3. Local config: `<project_dir>/.nestree.toml`
//! 4. Environment variables: `NESTREE__*` prefix

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::{ConfigurationError, TreeMapping, TreeRegistry};

/// Tree type configured out of the box.
pub const DEFAULT_TREE: &str = "category";

/// Field names of a mapping, as used in config keys.
const MAPPING_FIELDS: [&str; 7] = [
    "left",
    "right",
    "parent",
    "parent_target",
    "root",
    "level",
    "on_remove",
];

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub default_tree: Option<String>,
    pub snapshot: Option<PathBuf>,
    pub trees: BTreeMap<String, TreeMapping>,
}

/// Unified configuration for nestree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Tree type used when none is given on the command line
    pub default_tree: String,
    /// Default snapshot file
    pub snapshot: PathBuf,
    /// Column mapping per tree type
    pub trees: BTreeMap<String, TreeMapping>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_tree: DEFAULT_TREE.into(),
            snapshot: PathBuf::from("nestree.toml"),
            trees: BTreeMap::from([(DEFAULT_TREE.to_string(), TreeMapping::conventional())]),
        }
    }
}

/// Get the XDG config directory for nestree.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "nestree").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("nestree.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".nestree.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Expand `~`, `$VAR` and `${VAR}` in path-like fields.
    fn expand_paths(&mut self) {
        let raw = self.snapshot.to_string_lossy().to_string();
        if let Ok(expanded) = shellexpand::full(&raw) {
            self.snapshot = PathBuf::from(expanded.as_ref());
        }
    }

    /// Merge overlay config onto self (base).
    ///
    /// - Scalar options: overlay wins if Some, otherwise keep base
    /// - Tree mappings: merged per type, then per field
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut trees = self.trees.clone();
        for (node_type, mapping) in &overlay.trees {
            let merged = match trees.get(node_type) {
                Some(base) => base.merge(mapping),
                None => mapping.clone(),
            };
            trees.insert(node_type.clone(), merged);
        }
        Self {
            default_tree: overlay
                .default_tree
                .clone()
                .unwrap_or_else(|| self.default_tree.clone()),
            snapshot: overlay
                .snapshot
                .clone()
                .unwrap_or_else(|| self.snapshot.clone()),
            trees,
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional directory holding a local `.nestree.toml`
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("load global config: {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 3. Local config
        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("load local config: {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        // 4. Environment variables (explicit override)
        current = Self::apply_env_overrides(current)?;

        current.expand_paths();
        Ok(current)
    }

    /// Load from one file only, on top of the defaults (no global config, no env vars).
    pub fn load_file(path: &Path) -> Result<Self, ApplicationError> {
        let raw = load_raw_settings(path)?;
        let mut settings = Self::default().merge_with(&raw);
        settings.expand_paths();
        Ok(settings)
    }

    /// Apply NESTREE__* environment variables as explicit overrides.
    ///
    /// `NESTREE__TREES__<TYPE>__<FIELD>` overrides one mapping field.
    fn apply_env_overrides(settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(Environment::with_prefix("NESTREE").separator("__"))
            .build()
            .map_err(config_err)?;
        Ok(Self::apply_overrides(settings, &config))
    }

    fn apply_overrides(mut settings: Self, config: &Config) -> Self {
        if let Ok(val) = config.get_string("default_tree") {
            settings.default_tree = val;
        }
        if let Ok(val) = config.get_string("snapshot") {
            settings.snapshot = PathBuf::from(val);
        }
        let node_types: Vec<String> = match config.get_table("trees") {
            Ok(table) => table.into_keys().collect(),
            Err(_) => Vec::new(),
        };
        for node_type in node_types {
            let mut overlay = TreeMapping::default();
            for field in MAPPING_FIELDS {
                if let Ok(val) = config.get_string(&format!("trees.{node_type}.{field}")) {
                    set_field(&mut overlay, field, val);
                }
            }
            let merged = match settings.trees.get(&node_type) {
                Some(base) => base.merge(&overlay),
                None => overlay,
            };
            settings.trees.insert(node_type, merged);
        }
        settings
    }

    /// Validate every configured mapping into a registry.
    pub fn registry(&self) -> Result<TreeRegistry, ConfigurationError> {
        TreeRegistry::from_settings(self)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# nestree configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/nestree/nestree.toml
#   Local:  <project>/.nestree.toml
#   Env:    NESTREE__* environment variables, e.g. NESTREE__TREES__CATEGORY__LEFT=lft

# Tree type used when --tree is not given
# default_tree = "category"

# Snapshot file used when --file is not given
# snapshot = "~/nestree.toml"

[trees.category]
left = "lft"
right = "rgt"
parent = "parent"
# optional caches
root = "root"
level = "lvl"
# what happens to children of a removed node: promote | cascade
# on_remove = "promote"
"#
        .to_string()
    }
}

fn set_field(mapping: &mut TreeMapping, field: &str, value: String) {
    let slot = match field {
        "left" => &mut mapping.left,
        "right" => &mut mapping.right,
        "parent" => &mut mapping.parent,
        "parent_target" => &mut mapping.parent_target,
        "root" => &mut mapping.root,
        "level" => &mut mapping.level,
        "on_remove" => &mut mapping.on_remove,
        _ => return,
    };
    *slot = Some(value);
}

impl TreeRegistry {
    /// Registry of every tree type in `settings`; fails on the first invalid mapping.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let mut registry = TreeRegistry::new();
        for (node_type, mapping) in &settings.trees {
            registry.register(node_type, mapping)?;
        }
        Ok(registry)
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}
