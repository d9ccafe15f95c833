// Licensed under the Apache-2.0 license

//! Builds the device tree from the SoC inventory and the driver database.
//!
//! Peripherals are placed on the first bus whose address window contains
//! their whole register window, and addressed relative to that bus. Kinds the
//! target OS has no driver for are left out; kinds it has a driver for but
//! which have no database entry are kept, `disabled`.

use log::{debug, warn};
use sapphire_dt_header::peripheral::require_address;
use sapphire_dt_header::value::hex;
use sapphire_dt_header::{
    BusInstance, HeaderError, MacroStore, MemoryRegion, PeripheralInstance, PeripheralKind,
    SocInventory,
};
use serde_json::Value;

use crate::drivers::{DriverDatabase, DriverEntry, OsProfile};
use crate::node::{Node, NodeKind, Status};
use crate::target::{MemorySelection, Target};
use crate::Result;

const CLOCK_LABEL: &str = "apb_clock";

/// Plic register windows as (offset from base, size): priorities, enables,
/// per-context registers.
const PLIC_WINDOWS: [(u64, u64); 3] = [(0x0, 0x1000), (0x2000, 0x2000), (0x20_0000, 0x1_0000)];

pub struct Assembler<'a> {
    store: &'a MacroStore,
    inventory: &'a SocInventory,
    db: &'a DriverDatabase,
    profile: &'a OsProfile,
    target: &'a Target,
}

impl<'a> Assembler<'a> {
    pub fn new(
        store: &'a MacroStore,
        inventory: &'a SocInventory,
        db: &'a DriverDatabase,
        target: &'a Target,
    ) -> Self {
        Self {
            store,
            inventory,
            db,
            profile: db.profile(target.os),
            target,
        }
    }

    fn zephyr(&self) -> bool {
        self.target.os.is_zephyr()
    }

    /// Label prefix of the per-core interrupt controllers.
    fn intc_prefix(&self) -> &'static str {
        if self.zephyr() {
            "hlic"
        } else {
            "L"
        }
    }

    fn has_clock(&self) -> bool {
        !self.zephyr() && self.inventory.cpu.frequency.is_some()
    }

    /// Builds the complete tree, headers included.
    pub fn assemble(&self) -> Result<Node> {
        let devkit = self.db.board(&self.target.board)?;
        debug!("assembling {} tree for {devkit}", self.target.os);

        let mut root = Node::new(NodeKind::Root).with_name("/").with_cells(1, 1);
        root.extra
            .insert("version".into(), Value::String(self.db.dt_version.clone()));
        root.extra.insert(
            "includes".into(),
            Value::from(self.profile.includes.clone()),
        );
        root.extra.insert(
            "model".into(),
            Value::String(format!("{} {devkit}", self.db.model)),
        );
        for (key, value) in &self.profile.root {
            root.extra.insert(key.clone(), value.clone());
        }

        root.children.insert("cpus".into(), self.cpus());
        if let Some(clocks) = self.clocks() {
            root.children.insert("clocks".into(), clocks);
        }
        root.children.insert("buses".into(), self.buses()?);
        for (key, memory) in self.memory()? {
            root.children.insert(key, memory);
        }
        root.children.insert("chosen".into(), self.chosen());
        root.children.insert("aliases".into(), self.aliases());

        root.refresh_headers();
        Ok(root)
    }

    fn cpus(&self) -> Node {
        let cpu = &self.inventory.cpu;
        let mut cpus = Node::new(NodeKind::Cpus).with_name("cpus").with_cells(1, 0);
        if let Some(frequency) = cpu.frequency {
            cpus.extra
                .insert("timebase-frequency".into(), Value::from(frequency));
        }

        let entry = self.profile.controller("cpu");
        let intc = self.profile.controller("intc");
        for core in &cpu.cores {
            let mut node = Node::new(NodeKind::Cpu)
                .with_name("cpu")
                .with_address(core.index as u64);
            node.device_type = Some("cpu".into());
            node.reg = Some(format!("<{}>", core.index));
            node.status = Some(Status::Okay);
            apply_entry(&mut node, entry);
            node.extra
                .insert("riscv,isa".into(), Value::String(cpu.isa_string()));
            if core.mmu {
                node.extra
                    .insert("mmu-type".into(), Value::String("riscv,sv32".into()));
            }
            if let Some(caches) = core.caches {
                for (prefix, cache) in [("i", caches.icache), ("d", caches.dcache)] {
                    node.extra
                        .insert(format!("{prefix}-cache-sets"), Value::from(cache.sets));
                    node.extra
                        .insert(format!("{prefix}-cache-size"), Value::from(cache.size));
                    if let Some(block) = cache.block {
                        node.extra
                            .insert(format!("{prefix}-cache-block-size"), Value::from(block));
                    }
                }
            }

            let mut controller = Node::new(NodeKind::InterruptController)
                .with_label(format!("{}{}", self.intc_prefix(), core.index))
                .with_name("interrupt-controller");
            apply_entry(&mut controller, intc);
            node.children.insert("intc".into(), controller);

            cpus.children.insert(format!("cpu{}", core.index), node);
        }
        cpus
    }

    fn clocks(&self) -> Option<Node> {
        if !self.has_clock() {
            if !self.zephyr() {
                warn!("no CLINT_HZ in the header, peripherals get no clock");
            }
            return None;
        }
        let mut clocks = Node::new(NodeKind::Clocks)
            .with_name("clocks")
            .with_cells(1, 0);
        apply_entry(&mut clocks, self.profile.driver("bus"));

        let mut clock = Node::new(NodeKind::Clock)
            .with_label(CLOCK_LABEL)
            .with_name("clock")
            .with_address(1);
        clock.reg = Some("<1>".into());
        clock.clock_frequency = self.inventory.cpu.frequency;
        apply_entry(&mut clock, self.profile.driver("clock"));

        Some(clocks.with_child(CLOCK_LABEL, clock))
    }

    fn buses(&self) -> Result<Node> {
        let mut buses = Node::group();
        for bus in self.inventory.buses.values() {
            buses
                .children
                .insert(bus.label.clone(), self.bus_node(bus));
        }

        let whitelist = self.profile.whitelist()?;
        for (kind, instances) in &self.inventory.peripherals {
            if !whitelist.contains(kind) {
                debug!("{kind}: no driver on {}, skipped", self.target.os);
                continue;
            }
            for peripheral in instances.values() {
                let Some(bus) = self
                    .inventory
                    .buses
                    .values()
                    .find(|bus| bus.contains(peripheral.address, peripheral.size))
                else {
                    warn!(
                        "{} at {:#x} is not inside any bus, left out of the tree",
                        peripheral.label, peripheral.address
                    );
                    continue;
                };
                let node = self.peripheral_node(peripheral, bus)?;
                if let Some(parent) = buses
                    .children
                    .get_mut(&bus.label)
                    .and_then(|bus_node| bus_node.children.get_mut("peripherals"))
                {
                    parent.children.insert(peripheral.name.clone(), node);
                }
            }
        }
        Ok(buses)
    }

    fn bus_node(&self, bus: &BusInstance) -> Node {
        let mut node = Node::new(NodeKind::Bus).with_cells(1, 1);
        if self.zephyr() {
            node.name = Some("soc".into());
            node.ranges = Some(String::new());
        } else {
            node = node
                .with_label(bus.label.clone())
                .with_name(bus.label.clone())
                .with_address(bus.address);
            node.ranges = Some(format!("0x0 {} {}", hex(bus.address), hex(bus.size)));
        }
        node.size = Some(bus.size);
        apply_entry(&mut node, self.profile.driver("bus"));
        node.with_child("peripherals", Node::group())
    }

    fn peripheral_node(&self, peripheral: &PeripheralInstance, bus: &BusInstance) -> Result<Node> {
        let kind = peripheral.kind;
        let entry = self.profile.driver(&kind.key());
        let offset = bus.offset_of(peripheral.address);
        // Zephyr buses use identity ranges
        let address = if self.zephyr() {
            peripheral.address
        } else {
            offset
        };

        let name = entry
            .and_then(|entry| entry.name.clone())
            .unwrap_or_else(|| kind.key());
        let mut node = Node::new(NodeKind::Peripheral)
            .with_label(peripheral.name.clone())
            .with_name(name)
            .with_address(address);
        node.source = Some(peripheral.label.clone());
        node.offset = Some(offset);
        node.size = Some(peripheral.size);
        node.reg = Some(format!("<{} {}>", hex(address), hex(peripheral.size)));

        match entry {
            Some(entry) => {
                node.compatible = entry.compatible.clone();
                node.private_data = entry.private_data.clone();
                node.status = Some(Status::Okay);
            }
            None => {
                debug!("{}: no driver entry, disabled", peripheral.label);
                node.status = Some(Status::Disabled);
            }
        }

        if kind.is_controller() {
            node.interrupts_extended = self.fan_out(entry);
            if kind == PeripheralKind::Plic && self.zephyr() {
                let base = require_address(self.store, kind.keyword())?;
                node.reg = Some(plic_reg(base)?);
            }
        } else {
            node.interrupts = peripheral.interrupts.clone();
            if self.zephyr() {
                // the Zephyr GPIO driver takes a single interrupt
                if kind == PeripheralKind::Gpio {
                    node.interrupts.truncate(1);
                }
                if !node.interrupts.is_empty() {
                    node.interrupt_priority = Some(1);
                }
            }
            if self.has_clock() {
                node.clocks = Some(format!("<&{CLOCK_LABEL} 0>"));
            }
        }
        Ok(node)
    }

    /// One `&<intc><core> <irq>` entry per core and declared source,
    /// core-major.
    fn fan_out(&self, entry: Option<&DriverEntry>) -> Vec<String> {
        let Some(entry) = entry else {
            return Vec::new();
        };
        let prefix = self.intc_prefix();
        (0..self.inventory.cpu.core_count)
            .flat_map(|core| {
                entry
                    .interrupts_extended
                    .iter()
                    .map(move |irq| format!("&{prefix}{core} {irq}"))
            })
            .collect()
    }

    /// Memory nodes by key.
    fn memory(&self) -> Result<Vec<(String, Node)>> {
        let layout = &self.inventory.memory;
        if self.zephyr() {
            let mut nodes = Vec::new();
            for (label, region) in [
                ("external_ram", layout.external),
                ("ram0", layout.internal),
            ] {
                if let Some(region) = region {
                    nodes.push((label.to_string(), memory_node(Some(label), region, true)));
                }
            }
            return Ok(nodes);
        }

        let region = match self.profile.uimage_address()? {
            Some(load) => layout.usable_external(load)?,
            None => layout.external,
        };
        match region.or(layout.internal) {
            Some(region) => Ok(vec![("memory".into(), memory_node(None, region, false))]),
            None => {
                warn!("the header declares no memory, no memory node written");
                Ok(Vec::new())
            }
        }
    }

    fn chosen(&self) -> Node {
        let mut chosen = Node::new(NodeKind::Chosen).with_name("chosen");
        chosen.extra = self.profile.chosen.clone();
        if self.zephyr() {
            let memory = &self.inventory.memory;
            let label = match self.target.memory {
                MemorySelection::External if memory.external.is_some() => Some("external_ram"),
                MemorySelection::External => {
                    warn!("no external memory on this SoC, using internal memory");
                    memory.internal.map(|_| "ram0")
                }
                MemorySelection::Internal => memory.internal.map(|_| "ram0"),
            };
            if let Some(label) = label {
                chosen
                    .extra
                    .insert("zephyr,sram".into(), Value::String(format!("&{label}")));
            }
        }
        chosen
    }

    fn aliases(&self) -> Node {
        let mut aliases = Node::new(NodeKind::Aliases).with_name("aliases");
        aliases.extra = self.profile.aliases.clone();
        aliases
    }
}

/// Zephyr `reg` of the PLIC: one address/size pair per register window.
fn plic_reg(base: u64) -> Result<String> {
    let mut cells = Vec::with_capacity(PLIC_WINDOWS.len());
    for (offset, size) in PLIC_WINDOWS {
        let address = base.checked_add(offset).ok_or_else(|| HeaderError::InvalidNumber {
            symbol: "SYSTEM_PLIC_CTRL".into(),
            value: hex(base),
        })?;
        cells.push(format!("{} {:#010x}", hex(address), size));
    }
    Ok(format!("<{}>", cells.join(" ")))
}

fn apply_entry(node: &mut Node, entry: Option<&DriverEntry>) {
    if let Some(entry) = entry {
        node.compatible = entry.compatible.clone();
        node.private_data.extend(entry.private_data.iter().cloned());
    }
}

fn memory_node(label: Option<&str>, region: MemoryRegion, zephyr: bool) -> Node {
    let mut node = Node::new(NodeKind::Memory)
        .with_name("memory")
        .with_address(region.address);
    node.label = label.map(str::to_string);
    node.device_type = Some("memory".into());
    node.size = Some(region.size);
    node.reg = Some(if zephyr {
        format!("<{} DT_SIZE_K({})>", hex(region.address), region.size / 1024)
    } else {
        format!("<{} {}>", hex(region.address), hex(region.size))
    });
    node
}
