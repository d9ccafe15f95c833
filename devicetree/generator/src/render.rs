// Licensed under the Apache-2.0 license

//! Device tree source text.
//!
//! [`Dtsi`] renders the SoC-level include: `#include` lines and a root node
//! with the CPUs, clocks and buses. [`Dts`] renders the board file that
//! includes it: version line, model, memory, `chosen`, `aliases` and any user
//! nodes.
//!
//! ```text
//! /dts-v1/;
//!
//! #include "sapphire.dtsi"
//!
//! / {
//!     model = "Efinix Sapphire RISC-V SoC Ti60F225";
//!     memory@400000 {
//!         device_type = "memory";
//!         reg = <0x400000 0x3fc00000>;
//!     };
//!     ...
//! };
//! ```

use std::fmt::{self, Display, Formatter, Write};

use serde_json::Value;

use crate::node::{Node, NodeKind};

/// Root properties that describe the file rather than the hardware.
const META_PROPERTIES: [&str; 3] = ["version", "includes", "model"];

pub struct Dtsi<'a> {
    pub root: &'a Node,
}

pub struct Dts<'a> {
    pub root: &'a Node,
    /// File name of the dtsi to include.
    pub dtsi: &'a str,
}

impl Display for Dtsi<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(Value::Array(includes)) = self.root.extra.get("includes") {
            for include in includes.iter().filter_map(Value::as_str) {
                writeln!(f, "#include {include}")?;
            }
            if !includes.is_empty() {
                writeln!(f)?;
            }
        }
        writeln!(f, "/ {{")?;
        write_properties(f, self.root, 1)?;
        for child in self.root.children.values() {
            if !is_board_node(child.kind) {
                write_node(f, child, 1)?;
            }
        }
        writeln!(f, "}};")
    }
}

impl Display for Dts<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(version) = self.root.extra.get("version").and_then(Value::as_str) {
            writeln!(f, "{version};")?;
            writeln!(f)?;
        }
        writeln!(f, "#include \"{}\"", self.dtsi)?;
        writeln!(f)?;
        writeln!(f, "/ {{")?;
        if let Some(model) = self.root.extra.get("model") {
            write_value(f, "model", model, 1)?;
        }
        for child in self.root.children.values() {
            if is_board_node(child.kind) {
                write_node(f, child, 1)?;
            }
        }
        writeln!(f, "}};")
    }
}

/// Nodes that belong to the board file rather than the SoC include.
fn is_board_node(kind: NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Memory | NodeKind::Chosen | NodeKind::Aliases | NodeKind::Custom
    )
}

fn indent(f: &mut impl Write, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        f.write_char('\t')?;
    }
    Ok(())
}

fn write_node(f: &mut impl Write, node: &Node, depth: usize) -> fmt::Result {
    if node.kind == NodeKind::Group {
        for child in node.children.values() {
            write_node(f, child, depth)?;
        }
        return Ok(());
    }
    writeln!(f)?;
    indent(f, depth)?;
    writeln!(f, "{}", node.header)?;
    write_properties(f, node, depth + 1)?;
    for child in node.children.values() {
        write_node(f, child, depth + 1)?;
    }
    indent(f, depth)?;
    writeln!(f, "}};")
}

fn line(f: &mut impl Write, depth: usize, text: fmt::Arguments<'_>) -> fmt::Result {
    indent(f, depth)?;
    f.write_fmt(text)?;
    f.write_char('\n')
}

fn write_properties(f: &mut impl Write, node: &Node, depth: usize) -> fmt::Result {
    if let Some(cells) = node.address_cells {
        line(f, depth, format_args!("#address-cells = <{cells}>;"))?;
    }
    if let Some(cells) = node.size_cells {
        line(f, depth, format_args!("#size-cells = <{cells}>;"))?;
    }
    if !node.compatible.is_empty() {
        line(
            f,
            depth,
            format_args!("compatible = {};", quoted(&node.compatible)),
        )?;
    }
    if let Some(device_type) = &node.device_type {
        line(f, depth, format_args!("device_type = \"{device_type}\";"))?;
    }
    if let Some(reg) = &node.reg {
        line(f, depth, format_args!("reg = {reg};"))?;
    }
    match node.ranges.as_deref() {
        Some("") => line(f, depth, format_args!("ranges;"))?,
        Some(ranges) => line(f, depth, format_args!("ranges = <{ranges}>;"))?,
        None => {}
    }
    if !node.interrupts.is_empty() {
        let cells: Vec<String> = node
            .interrupts
            .iter()
            .map(|irq| match node.interrupt_priority {
                Some(priority) => format!("{irq} {priority}"),
                None => irq.to_string(),
            })
            .collect();
        line(
            f,
            depth,
            format_args!("interrupts = <{}>;", cells.join(" ")),
        )?;
    }
    if !node.interrupts_extended.is_empty() {
        let groups: Vec<String> = node
            .interrupts_extended
            .iter()
            .map(|entry| format!("<{entry}>"))
            .collect();
        line(
            f,
            depth,
            format_args!("interrupts-extended = {};", groups.join(", ")),
        )?;
    }
    if let Some(clocks) = &node.clocks {
        line(f, depth, format_args!("clocks = {clocks};"))?;
    }
    if let Some(frequency) = node.clock_frequency {
        line(f, depth, format_args!("clock-frequency = <{frequency}>;"))?;
    }
    if let Some(status) = node.status {
        line(f, depth, format_args!("status = \"{}\";", status.as_str()))?;
    }
    for private in &node.private_data {
        line(f, depth, format_args!("{private}"))?;
    }
    for (key, value) in &node.extra {
        if node.kind == NodeKind::Root && META_PROPERTIES.contains(&key.as_str()) {
            continue;
        }
        write_value(f, key, value, depth)?;
    }
    Ok(())
}

/// Writes one `extra` property. Underscores in keys become dashes.
///
/// Strings that already are device tree values (`<...>`, `&label`, or a
/// quoted string) are written as they are; other strings are quoted. Numbers
/// become a single cell and `true` a bare property.
fn write_value(f: &mut impl Write, key: &str, value: &Value, depth: usize) -> fmt::Result {
    let key = key.replace('_', "-");
    match value {
        Value::Null | Value::Bool(false) | Value::Object(_) => Ok(()),
        Value::Bool(true) => line(f, depth, format_args!("{key};")),
        Value::String(s) if s.is_empty() => line(f, depth, format_args!("{key};")),
        Value::String(s) => line(f, depth, format_args!("{key} = {};", literal(s))),
        Value::Number(n) => line(f, depth, format_args!("{key} = <{n}>;")),
        Value::Array(items) if items.iter().all(Value::is_number) => {
            let cells: Vec<String> = items.iter().map(Value::to_string).collect();
            line(f, depth, format_args!("{key} = <{}>;", cells.join(" ")))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => literal(s),
                    other => format!("<{other}>"),
                })
                .collect();
            line(f, depth, format_args!("{key} = {};", parts.join(", ")))
        }
    }
}

fn literal(s: &str) -> String {
    if s.starts_with('<') || s.starts_with('&') || s.starts_with('"') {
        s.to_string()
    } else {
        format!("\"{s}\"")
    }
}

fn quoted(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\"{item}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render_node(node: &Node) -> String {
        let mut out = String::new();
        write_node(&mut out, node, 0).unwrap();
        out
    }

    #[test]
    fn test_peripheral_node() {
        let mut uart = Node::new(NodeKind::Peripheral)
            .with_label("uart0")
            .with_name("uart")
            .with_address(0x1_0000);
        uart.compatible = vec!["spinal-lib,uart-1.0".into()];
        uart.reg = Some("<0x10000 0x40>".into());
        uart.interrupts = vec![1];
        uart.clocks = Some("<&apb_clock 0>".into());
        uart.status = Some(crate::node::Status::Okay);
        uart.private_data = vec!["reg-shift = <2>;".into()];
        uart.extra.insert("current_speed".into(), json!(115200));
        uart.refresh_header();

        assert_eq!(
            render_node(&uart),
            "\n\
             uart0: uart@10000 {\n\
             \tcompatible = \"spinal-lib,uart-1.0\";\n\
             \treg = <0x10000 0x40>;\n\
             \tinterrupts = <1>;\n\
             \tclocks = <&apb_clock 0>;\n\
             \tstatus = \"okay\";\n\
             \treg-shift = <2>;\n\
             \tcurrent-speed = <115200>;\n\
             };\n"
        );
    }

    #[test]
    fn test_interrupt_cells() {
        let mut node = Node::new(NodeKind::Peripheral).with_name("gpio");
        node.interrupts = vec![12, 13];
        node.interrupt_priority = Some(1);
        node.interrupts_extended = vec!["&L0 11".into(), "&L1 11".into()];
        let text = render_node(&node);
        assert!(text.contains("interrupts = <12 1 13 1>;"));
        assert!(text.contains("interrupts-extended = <&L0 11>, <&L1 11>;"));
    }

    #[test]
    fn test_groups_are_transparent() {
        let mut bus = Node::new(NodeKind::Bus).with_name("soc");
        bus.ranges = Some(String::new());
        let bus = bus.with_child(
            "peripherals",
            Node::group().with_child("x", Node::new(NodeKind::Peripheral).with_name("x")),
        );
        let mut group = Node::group().with_child("bmb", bus);
        group.refresh_headers();
        let text = render_node(&group);
        assert_eq!(text, "\nsoc {\n\tranges;\n\n\tx {\n\t};\n};\n");
    }

    #[test]
    fn test_extra_values() {
        let mut out = String::new();
        write_value(&mut out, "stdout_path", &json!("serial0:115200n8"), 0).unwrap();
        write_value(&mut out, "serial0", &json!("&uart0"), 0).unwrap();
        write_value(&mut out, "dma-coherent", &json!(true), 0).unwrap();
        write_value(&mut out, "skipped", &json!(false), 0).unwrap();
        write_value(&mut out, "cells", &json!([1, 2]), 0).unwrap();
        write_value(&mut out, "names", &json!(["a", "b"]), 0).unwrap();
        assert_eq!(
            out,
            "stdout-path = \"serial0:115200n8\";\n\
             serial0 = &uart0;\n\
             dma-coherent;\n\
             cells = <1 2>;\n\
             names = \"a\", \"b\";\n"
        );
    }

    #[test]
    fn test_dtsi_and_dts_split() {
        let mut root = Node::new(NodeKind::Root).with_name("/").with_cells(1, 1);
        root.extra.insert("version".into(), json!("/dts-v1/"));
        root.extra.insert("includes".into(), json!(["<mem.h>"]));
        root.extra.insert("model".into(), json!("Sapphire Ti60F225"));
        root.extra.insert("compatible".into(), json!("efinix,sapphire"));
        let mut chosen = Node::new(NodeKind::Chosen).with_name("chosen");
        chosen.extra.insert("zephyr,console".into(), json!("&uart0"));
        let mut root = root
            .with_child("cpus", Node::new(NodeKind::Cpus).with_name("cpus"))
            .with_child("chosen", chosen);
        root.refresh_headers();

        let dtsi = Dtsi { root: &root }.to_string();
        assert_eq!(
            dtsi,
            "#include <mem.h>\n\
             \n\
             / {\n\
             \t#address-cells = <1>;\n\
             \t#size-cells = <1>;\n\
             \tcompatible = \"efinix,sapphire\";\n\
             \n\
             \tcpus {\n\
             \t};\n\
             };\n"
        );

        let dts = Dts {
            root: &root,
            dtsi: "sapphire_soc_ti60.dtsi",
        }
        .to_string();
        assert_eq!(
            dts,
            "/dts-v1/;\n\
             \n\
             #include \"sapphire_soc_ti60.dtsi\"\n\
             \n\
             / {\n\
             \tmodel = \"Sapphire Ti60F225\";\n\
             \n\
             \tchosen {\n\
             \t\tzephyr,console = &uart0;\n\
             \t};\n\
             };\n"
        );
    }
}
