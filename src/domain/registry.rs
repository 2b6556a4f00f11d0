//! Tree type registry
//!
//! Maps a node type name to the field names of its tree columns. The registry is
//! an explicit value handed to the engine, so independent configurations can
//! coexist (one per test, one per store).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::entities::{Bound, Cond, RangeShift, RemovalMode, ShiftTarget};
use crate::domain::error::ConfigurationError;

/// Declared tree columns of a node type, as written in configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TreeMapping {
    pub left: Option<String>,
    pub right: Option<String>,
    pub parent: Option<String>,
    /// Type the parent field points at; defaults to the mapped type itself.
    pub parent_target: Option<String>,
    pub root: Option<String>,
    pub level: Option<String>,
    /// `promote` (default) or `cascade`.
    pub on_remove: Option<String>,
}

impl TreeMapping {
    /// Mapping with the conventional `lft`/`rgt`/`parent` columns.
    pub fn conventional() -> Self {
        Self {
            left: Some("lft".into()),
            right: Some("rgt".into()),
            parent: Some("parent".into()),
            parent_target: None,
            root: Some("root".into()),
            level: Some("lvl".into()),
            on_remove: None,
        }
    }

    /// Overlay wins per field when set.
    pub fn merge(&self, overlay: &TreeMapping) -> Self {
        Self {
            left: overlay.left.clone().or_else(|| self.left.clone()),
            right: overlay.right.clone().or_else(|| self.right.clone()),
            parent: overlay.parent.clone().or_else(|| self.parent.clone()),
            parent_target: overlay
                .parent_target
                .clone()
                .or_else(|| self.parent_target.clone()),
            root: overlay.root.clone().or_else(|| self.root.clone()),
            level: overlay.level.clone().or_else(|| self.level.clone()),
            on_remove: overlay.on_remove.clone().or_else(|| self.on_remove.clone()),
        }
    }
}

/// Validated tree metadata for one node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMeta {
    pub node_type: String,
    pub left: String,
    pub right: String,
    pub parent: String,
    pub root: Option<String>,
    pub level: Option<String>,
    pub removal: RemovalMode,
}

impl TreeMeta {
    /// Validate a mapping. Field presence is checked in left, right, parent order.
    pub fn from_mapping(node_type: &str, mapping: &TreeMapping) -> Result<Self, ConfigurationError> {
        let named = |field: &Option<String>| field.as_ref().filter(|s| !s.trim().is_empty()).cloned();

        let left = named(&mapping.left).ok_or_else(|| ConfigurationError::MissingLeftField {
            node_type: node_type.to_string(),
        })?;
        let right = named(&mapping.right).ok_or_else(|| ConfigurationError::MissingRightField {
            node_type: node_type.to_string(),
        })?;
        let parent = named(&mapping.parent).ok_or_else(|| ConfigurationError::MissingParentField {
            node_type: node_type.to_string(),
        })?;
        if let Some(target) = named(&mapping.parent_target) {
            if target != node_type {
                return Err(ConfigurationError::ParentFieldNotRelated {
                    node_type: node_type.to_string(),
                    target,
                });
            }
        }
        let removal = match named(&mapping.on_remove).as_deref() {
            None | Some("promote") => RemovalMode::Promote,
            Some("cascade") => RemovalMode::Cascade,
            Some(other) => {
                return Err(ConfigurationError::InvalidRemovalMode {
                    node_type: node_type.to_string(),
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            node_type: node_type.to_string(),
            left,
            right,
            parent,
            root: named(&mapping.root),
            level: named(&mapping.level),
            removal,
        })
    }

    pub fn tracks_level(&self) -> bool {
        self.level.is_some()
    }

    pub fn tracks_root(&self) -> bool {
        self.root.is_some()
    }

    pub fn column(&self, field: Bound) -> &str {
        match field {
            Bound::Left => &self.left,
            Bound::Right => &self.right,
        }
    }

    /// Render a shift as the statement a SQL backend would issue, for logging.
    pub fn render_shift(&self, shift: &RangeShift) -> String {
        let target = match shift.target {
            ShiftTarget::Bound(field) => self.column(field),
            ShiftTarget::Level => self.level.as_deref().unwrap_or("level"),
        };
        let sign = if shift.delta < 0 { '-' } else { '+' };
        let column = self.column(shift.filter.field);
        let condition = match shift.filter.cond {
            Cond::Eq(x) => format!("{column} = {x}"),
            Cond::Gt(x) => format!("{column} > {x}"),
            Cond::Gte(x) => format!("{column} >= {x}"),
            Cond::Lt(x) => format!("{column} < {x}"),
            Cond::Between(lo, hi) => format!("{column} BETWEEN {lo} AND {hi}"),
        };
        format!(
            "UPDATE {} SET {target} = {target} {sign} {} WHERE {condition}",
            self.node_type,
            shift.delta.abs()
        )
    }
}

/// Registry of validated tree types.
#[derive(Debug, Clone, Default)]
pub struct TreeRegistry {
    trees: BTreeMap<String, TreeMeta>,
}

impl TreeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register a mapping; fails fast on the first configuration error.
    pub fn register(&mut self, node_type: &str, mapping: &TreeMapping) -> Result<&TreeMeta, ConfigurationError> {
        let meta = TreeMeta::from_mapping(node_type, mapping)?;
        self.trees.insert(node_type.to_string(), meta);
        self.get(node_type)
    }

    pub fn get(&self, node_type: &str) -> Result<&TreeMeta, ConfigurationError> {
        self.trees
            .get(node_type)
            .ok_or_else(|| ConfigurationError::NotRegistered(node_type.to_string()))
    }

    pub fn node_types(&self) -> impl Iterator<Item = &str> {
        self.trees.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
