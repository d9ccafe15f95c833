// Licensed under the Apache-2.0 license

//! User directives: overrides, appends and extra child nodes.
//!
//! ```json
//! {
//!     "overrides": { "UART_0": { "compatible": "custom-uart" } },
//!     "append":    { "chosen": { "bootargs": "quiet" } },
//!     "child":     { "leds": { "compatible": "gpio-leds" } }
//! }
//! ```
//!
//! Overrides replace properties of an existing node, found by child key,
//! label or header symbol. Appends extend properties of `chosen` and
//! `aliases` nodes. Child nodes are added under the root as given.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::node::{Node, NodeKind};
use crate::{GenError, Result};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserConfig {
    pub overrides: IndexMap<String, Map<String, Value>>,
    pub append: IndexMap<String, Map<String, Value>>,
    pub child: IndexMap<String, Value>,
    /// Nodes for slave ports, attached like `child`.
    pub slave: IndexMap<String, Value>,
    /// `append` sections of merged files, in merge order.
    #[serde(skip)]
    merged_appends: Vec<IndexMap<String, Map<String, Value>>>,
}

impl UserConfig {
    pub fn from_json(text: &str, origin: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GenError::MalformedUserConfig {
            path: origin.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => GenError::MalformedUserConfig {
                path: path.display().to_string(),
                reason: "file not found".into(),
            },
            _ => GenError::Io {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Self::from_json(&text, &path.display().to_string())
    }

    /// Folds `other` into `self`. Overridden properties and child nodes
    /// given by `other` win. Appends of `other` are kept apart and applied
    /// after those of `self`, so merging files gives the same tree as
    /// applying them one after the other.
    pub fn merge(&mut self, other: UserConfig) {
        for (key, props) in other.overrides {
            self.overrides.entry(key).or_default().extend(props);
        }
        if !other.append.is_empty() {
            self.merged_appends.push(other.append);
        }
        self.merged_appends.extend(other.merged_appends);
        self.child.extend(other.child);
        self.slave.extend(other.slave);
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
            && self.append.is_empty()
            && self.merged_appends.is_empty()
            && self.child.is_empty()
            && self.slave.is_empty()
    }

    fn appends(&self) -> impl Iterator<Item = &IndexMap<String, Map<String, Value>>> {
        std::iter::once(&self.append).chain(&self.merged_appends)
    }

    /// Applies the directives to an assembled tree: overrides, then appends,
    /// then child nodes.
    ///
    /// Child nodes without a name or label take their key as name.
    pub fn apply(&self, root: &mut Node) -> Result<()> {
        for (key, props) in &self.overrides {
            let node = root
                .find_mut(key)
                .ok_or_else(|| GenError::UnknownTarget { key: key.clone() })?;
            for (prop, value) in props {
                node.set_property(prop, value)?;
            }
            if !props.contains_key("header") {
                node.refresh_header();
            }
            debug!("override applied to {key}");
        }

        for (key, props) in self.appends().flatten() {
            let node = root
                .find_mut(key)
                .ok_or_else(|| GenError::UnknownTarget { key: key.clone() })?;
            if !matches!(node.kind, NodeKind::Chosen | NodeKind::Aliases) {
                return Err(GenError::InvalidAppendTarget { key: key.clone() });
            }
            for (prop, value) in props {
                node.append_property(prop, value)?;
            }
        }

        for (key, value) in self.child.iter().chain(&self.slave) {
            let mut node = Node::from_json(value)?;
            // nameless nodes are named after their key
            if node.header.is_empty() {
                node.name = Some(key.clone());
                node.refresh_header();
            }
            if root.children.insert(key.clone(), node).is_some() {
                info!("user node {key} replaces the generated one");
            }
        }
        Ok(())
    }
}
