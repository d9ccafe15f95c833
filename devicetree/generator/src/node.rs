// Licensed under the Apache-2.0 license

//! The device tree node model.
//!
//! Every node has a [`NodeKind`], a set of typed properties, an ordered bag of
//! `extra` properties for anything the typed set does not cover, and ordered
//! children keyed by a stable name:
//!
//! ```text
//! root
//! ├── cpus
//! │   └── cpu0
//! │       └── intc
//! ├── clocks
//! │   └── apb_clock
//! ├── buses                (group)
//! │   └── bmb
//! │       └── peripherals  (group)
//! │           ├── plic
//! │           └── uart0
//! ├── memory
//! ├── chosen
//! └── aliases
//! ```
//!
//! Group nodes only exist to give the tree its shape: they have no header and
//! the renderer writes their children in their place.
//!
//! The JSON form of a node is a flat object: the non-empty typed properties,
//! then `extra`, then each child under its key.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use sapphire_dt_header::value::{hex, parse_int};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::{GenError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Group,
    Cpus,
    Cpu,
    InterruptController,
    Clocks,
    Clock,
    Bus,
    Peripheral,
    Memory,
    Chosen,
    Aliases,
    Custom,
}

impl NodeKind {
    const NAMES: [(NodeKind, &'static str); 13] = [
        (NodeKind::Root, "root"),
        (NodeKind::Group, "group"),
        (NodeKind::Cpus, "cpus"),
        (NodeKind::Cpu, "cpu"),
        (NodeKind::InterruptController, "interrupt-controller"),
        (NodeKind::Clocks, "clocks"),
        (NodeKind::Clock, "clock"),
        (NodeKind::Bus, "bus"),
        (NodeKind::Peripheral, "peripheral"),
        (NodeKind::Memory, "memory"),
        (NodeKind::Chosen, "chosen"),
        (NodeKind::Aliases, "aliases"),
        (NodeKind::Custom, "custom"),
    ];

    pub fn as_str(self) -> &'static str {
        NodeKind::NAMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map_or("custom", |(_, name)| *name)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NodeKind::NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(kind, _)| *kind)
            .ok_or_else(|| format!("unknown node kind '{s}'"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Okay,
    Disabled,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Okay => "okay",
            Status::Disabled => "disabled",
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "okay" => Ok(Status::Okay),
            "disabled" => Ok(Status::Disabled),
            _ => Err(format!("expected \"okay\" or \"disabled\", got \"{s}\"")),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub label: Option<String>,
    pub name: Option<String>,
    /// Unit address, written in hex after `@` in the header.
    pub address: Option<u64>,
    /// `label: name@address {` line, recomputed by [`Node::refresh_header`].
    pub header: String,
    pub address_cells: Option<u32>,
    pub size_cells: Option<u32>,
    pub compatible: Vec<String>,
    pub device_type: Option<String>,
    /// Complete `reg` value including the angle brackets.
    pub reg: Option<String>,
    /// `Some("")` renders as a bare `ranges;`.
    pub ranges: Option<String>,
    /// Offset of the node from the start of its bus.
    pub offset: Option<u64>,
    pub size: Option<u64>,
    pub interrupts: Vec<u32>,
    /// Priority cell appended to each interrupt, when the target wants one.
    pub interrupt_priority: Option<u32>,
    /// `&<intc> <irq>` pairs.
    pub interrupts_extended: Vec<String>,
    pub clocks: Option<String>,
    pub clock_frequency: Option<u64>,
    pub status: Option<Status>,
    /// Property lines copied verbatim from the driver database.
    pub private_data: Vec<String>,
    /// Header macro label the node was built from, e.g. `UART_0`.
    pub source: Option<String>,
    pub extra: Map<String, Value>,
    pub children: IndexMap<String, Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            label: None,
            name: None,
            address: None,
            header: String::new(),
            address_cells: None,
            size_cells: None,
            compatible: Vec::new(),
            device_type: None,
            reg: None,
            ranges: None,
            offset: None,
            size: None,
            interrupts: Vec::new(),
            interrupt_priority: None,
            interrupts_extended: Vec::new(),
            clocks: None,
            clock_frequency: None,
            status: None,
            private_data: Vec::new(),
            source: None,
            extra: Map::new(),
            children: IndexMap::new(),
        }
    }

    /// A structural node with no header of its own.
    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_address(mut self, address: u64) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_cells(mut self, address_cells: u32, size_cells: u32) -> Self {
        self.address_cells = Some(address_cells);
        self.size_cells = Some(size_cells);
        self
    }

    pub fn with_child(mut self, key: impl Into<String>, child: Node) -> Self {
        self.children.insert(key.into(), child);
        self
    }

    /// Recomputes the header of this node from its label, name and address.
    pub fn refresh_header(&mut self) {
        self.header = if self.kind == NodeKind::Group {
            String::new()
        } else {
            node_header(
                self.label.as_deref(),
                self.name.as_deref(),
                self.address,
            )
        };
    }

    /// Recomputes the header of this node and of every node below it.
    pub fn refresh_headers(&mut self) {
        self.refresh_header();
        for child in self.children.values_mut() {
            child.refresh_headers();
        }
    }

    /// True when `key` names this node by its label or its source symbol.
    fn answers_to(&self, key: &str) -> bool {
        self.label.as_deref() == Some(key) || self.source.as_deref() == Some(key)
    }

    /// Depth-first search for the first node whose child key, label or source
    /// symbol equals `key`.
    pub fn find_mut(&mut self, key: &str) -> Option<&mut Node> {
        for (child_key, child) in self.children.iter_mut() {
            if child_key == key || child.answers_to(key) {
                return Some(child);
            }
            if let Some(found) = child.find_mut(key) {
                return Some(found);
            }
        }
        None
    }

    pub fn find(&self, key: &str) -> Option<&Node> {
        for (child_key, child) in &self.children {
            if child_key == key || child.answers_to(key) {
                return Some(child);
            }
            if let Some(found) = child.find(key) {
                return Some(found);
            }
        }
        None
    }

    /// Follows a dot-separated path of child keys, e.g.
    /// `buses.bmb.peripherals.uart0`.
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        path.split('.')
            .try_fold(self, |node, key| node.children.get(key))
    }

    /// Sets one property from its JSON value. Typed properties are checked
    /// for shape; objects become children and anything else lands in
    /// `extra`.
    pub fn set_property(&mut self, key: &str, value: &Value) -> Result<()> {
        if value.is_object() {
            let child = Node::from_json(value)?;
            self.children.insert(key.to_string(), child);
            return Ok(());
        }
        match key {
            "kind" => {
                self.kind = string(key, value)?
                    .parse::<NodeKind>()
                    .map_err(|reason| invalid(key, reason))?
            }
            "label" => self.label = optional_string(key, value)?,
            "name" => self.name = optional_string(key, value)?,
            "header" => self.header = string(key, value)?,
            "device_type" => self.device_type = optional_string(key, value)?,
            "reg" => self.reg = optional_string(key, value)?,
            "ranges" => self.ranges = optional_string(key, value)?,
            "clocks" => self.clocks = optional_string(key, value)?,
            "source" => self.source = optional_string(key, value)?,
            "address" | "addr" => self.address = optional_number(key, value)?,
            "offset" => self.offset = optional_number(key, value)?,
            "size" => self.size = optional_number(key, value)?,
            "clock_frequency" => self.clock_frequency = optional_number(key, value)?,
            "address_cells" => self.address_cells = optional_cell(key, value)?,
            "size_cells" => self.size_cells = optional_cell(key, value)?,
            "interrupt_priority" => self.interrupt_priority = optional_cell(key, value)?,
            "compatible" => self.compatible = strings(key, value)?,
            "private_data" => self.private_data = strings(key, value)?,
            "interrupts_extended" => self.interrupts_extended = strings(key, value)?,
            "interrupts" => self.interrupts = cells(key, value)?,
            "status" => {
                self.status = match value {
                    Value::Null => None,
                    _ => Some(
                        string(key, value)?
                            .parse::<Status>()
                            .map_err(|reason| invalid(key, reason))?,
                    ),
                }
            }
            _ => {
                self.extra.insert(key.to_string(), value.clone());
            }
        }
        Ok(())
    }

    /// Appends to a property instead of replacing it.
    ///
    /// List properties are extended. String properties are joined: with a
    /// comma for `stdout_path`, with a space for anything else. Properties
    /// that do not exist yet are set.
    pub fn append_property(&mut self, key: &str, value: &Value) -> Result<()> {
        match key {
            "compatible" => self.compatible.extend(strings(key, value)?),
            "private_data" => self.private_data.extend(strings(key, value)?),
            "interrupts_extended" => self.interrupts_extended.extend(strings(key, value)?),
            _ => match (self.extra.get_mut(key), value) {
                (None, _) => self.set_property(key, value)?,
                (Some(Value::String(current)), Value::String(more)) => {
                    let separator = if key == "stdout_path" { "," } else { " " };
                    if current.is_empty() {
                        current.push_str(more);
                    } else if !more.is_empty() {
                        current.push_str(separator);
                        current.push_str(more);
                    }
                }
                (Some(Value::Array(current)), Value::Array(more)) => {
                    current.extend(more.iter().cloned())
                }
                (Some(Value::Array(current)), more) => current.push(more.clone()),
                (Some(_), _) => {
                    return Err(invalid(key, "cannot append to this property"));
                }
            },
        }
        Ok(())
    }

    /// Builds a node from its JSON form. Headers that are given are kept;
    /// missing ones are computed.
    pub fn from_json(value: &Value) -> Result<Node> {
        let Value::Object(map) = value else {
            return Err(invalid("node", "expected a JSON object"));
        };
        let mut node = Node::new(NodeKind::Custom);
        for (key, value) in map {
            node.set_property(key, value)?;
        }
        if node.header.is_empty() {
            node.refresh_header();
        }
        Ok(node)
    }
}

/// Builds the opening line of a node.
///
/// - label, name and address: `label: name@address {`
/// - label and name: `label: name {`
/// - label only: `label {`
/// - name and address: `name@address {`
/// - name only: `name {`
///
/// The address is written in hex without a `0x` prefix.
pub fn node_header(label: Option<&str>, name: Option<&str>, address: Option<u64>) -> String {
    let label = label.filter(|l| !l.is_empty());
    let name = name.filter(|n| !n.is_empty());
    let unit = |name: &str| match address {
        Some(address) => format!("{name}@{address:x}"),
        None => name.to_string(),
    };
    let head = match (label, name) {
        (Some(label), Some(name)) => format!("{label}: {}", unit(name)),
        (Some(label), None) => label.to_string(),
        (None, Some(name)) => unit(name),
        (None, None) => return String::new(),
    };
    format!("{head} {{")
}

fn invalid(key: &str, reason: impl Into<String>) -> GenError {
    GenError::InvalidProperty {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn string(key: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(invalid(key, "expected a string")),
    }
}

fn optional_string(key: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        _ => string(key, value).map(Some),
    }
}

fn optional_number(key: &str, value: &Value) -> Result<Option<u64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| invalid(key, "expected an unsigned integer")),
        Value::String(s) => parse_int(s)
            .map(Some)
            .ok_or_else(|| invalid(key, format!("'{s}' is not a number"))),
        _ => Err(invalid(key, "expected a number")),
    }
}

fn optional_cell(key: &str, value: &Value) -> Result<Option<u32>> {
    optional_number(key, value)?
        .map(|n| u32::try_from(n).map_err(|_| invalid(key, "value does not fit in a cell")))
        .transpose()
}

fn strings(key: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items.iter().map(|item| string(key, item)).collect(),
        _ => Err(invalid(key, "expected a string or a list of strings")),
    }
}

fn cells(key: &str, value: &Value) -> Result<Vec<u32>> {
    let cell = |value: &Value| -> Result<u32> {
        optional_cell(key, value)?.ok_or_else(|| invalid(key, "expected a number"))
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(cell).collect(),
        Value::String(s) => s
            .split_whitespace()
            .map(|word| cell(&Value::String(word.to_string())))
            .collect(),
        _ => cell(value).map(|irq| vec![irq]),
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("kind", self.kind.as_str())?;
        if let Some(label) = &self.label {
            map.serialize_entry("label", label)?;
        }
        if let Some(name) = &self.name {
            map.serialize_entry("name", name)?;
        }
        if let Some(address) = self.address {
            map.serialize_entry("address", &hex(address))?;
        }
        if !self.header.is_empty() {
            map.serialize_entry("header", &self.header)?;
        }
        if let Some(cells) = self.address_cells {
            map.serialize_entry("address_cells", &cells)?;
        }
        if let Some(cells) = self.size_cells {
            map.serialize_entry("size_cells", &cells)?;
        }
        if !self.compatible.is_empty() {
            map.serialize_entry("compatible", &self.compatible)?;
        }
        if let Some(device_type) = &self.device_type {
            map.serialize_entry("device_type", device_type)?;
        }
        if let Some(reg) = &self.reg {
            map.serialize_entry("reg", reg)?;
        }
        if let Some(ranges) = &self.ranges {
            map.serialize_entry("ranges", ranges)?;
        }
        if let Some(offset) = self.offset {
            map.serialize_entry("offset", &hex(offset))?;
        }
        if let Some(size) = self.size {
            map.serialize_entry("size", &hex(size))?;
        }
        if !self.interrupts.is_empty() {
            map.serialize_entry("interrupts", &self.interrupts)?;
        }
        if let Some(priority) = self.interrupt_priority {
            map.serialize_entry("interrupt_priority", &priority)?;
        }
        if !self.interrupts_extended.is_empty() {
            map.serialize_entry("interrupts_extended", &self.interrupts_extended)?;
        }
        if let Some(clocks) = &self.clocks {
            map.serialize_entry("clocks", clocks)?;
        }
        if let Some(frequency) = self.clock_frequency {
            map.serialize_entry("clock_frequency", &frequency)?;
        }
        if let Some(status) = self.status {
            map.serialize_entry("status", status.as_str())?;
        }
        if !self.private_data.is_empty() {
            map.serialize_entry("private_data", &self.private_data)?;
        }
        if let Some(source) = &self.source {
            map.serialize_entry("source", source)?;
        }
        for (key, value) in &self.extra {
            map.serialize_entry(key, value)?;
        }
        for (key, child) in &self.children {
            map.serialize_entry(key, child)?;
        }
        map.end()
    }
}
