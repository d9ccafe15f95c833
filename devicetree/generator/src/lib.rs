// Licensed under the Apache-2.0 license

//! Device tree generation for Sapphire SoCs.
//!
//! Turns a parsed `soc.h` into a device tree for Linux, U-Boot or Zephyr:
//!
//! ```text
//! MacroStore → SocInventory → Assembler (+ DriverDatabase) → Node tree
//!                                        UserConfig::apply ──┘     │
//!                                                   Dtsi / Dts ←───┘
//! ```
//!
//! ## Usage
//!
//! ```
//! use sapphire_dt_generator::{generate, DriverDatabase, Target, TargetOs, UserConfig};
//!
//! let header = "#define SYSTEM_BMB_PERIPHERAL_BMB 0x10000000\n\
//!               #define SYSTEM_BMB_PERIPHERAL_BMB_SIZE 0x10000000\n\
//!               #define SYSTEM_UART_0_IO_CTRL 0x10000000\n\
//!               #define SYSTEM_UART_0_IO_CTRL_SIZE 0x1000\n";
//! let db = DriverDatabase::builtin().unwrap();
//! let target = Target::new(TargetOs::Linux, "ti60");
//! let out = generate(header, &db, &target, &UserConfig::default()).unwrap();
//! assert!(out.dtsi.contains("uart0: uart@0 {"));
//! ```
//!
//! ## Module Organization
//!
//! - [`drivers`]: the driver capability database
//! - [`target`]: target OS and run options
//! - [`node`]: the node model and its JSON form
//! - [`assemble`]: bus placement and tree assembly
//! - [`user`]: user override, append and child directives
//! - [`render`]: `.dtsi` / `.dts` text

pub mod assemble;
pub mod drivers;
pub mod node;
pub mod render;
pub mod target;
pub mod user;

mod error;

use log::info;
use sapphire_dt_header::{BusFamily, MacroStore, PeripheralKind, SocInventory};

pub use assemble::Assembler;
pub use drivers::{DriverDatabase, DriverEntry, OsProfile};
pub use error::{GenError, Result};
pub use node::{node_header, Node, NodeKind, Status};
pub use render::{Dts, Dtsi};
pub use target::{MemorySelection, Target, TargetOs};
pub use user::UserConfig;

/// The outcome of one generation run.
#[derive(Clone, Debug)]
pub struct Generated {
    pub tree: Node,
    pub dtsi: String,
    pub dts: String,
}

impl Generated {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.tree)?)
    }
}

/// Runs the whole pipeline on header text: inventory, assembly, user
/// directives and rendering.
pub fn generate(
    header: &str,
    db: &DriverDatabase,
    target: &Target,
    user: &UserConfig,
) -> Result<Generated> {
    let store = MacroStore::parse(header);
    info!("{} macros read from the SoC header", store.len());

    let inventory = SocInventory::build(&store, &PeripheralKind::ALL, &BusFamily::ALL)?;
    let mut tree = Assembler::new(&store, &inventory, db, target).assemble()?;
    user.apply(&mut tree)?;

    let dtsi = Dtsi { root: &tree }.to_string();
    let dts = Dts {
        root: &tree,
        dtsi: &target.dtsi_name(),
    }
    .to_string();
    Ok(Generated { tree, dtsi, dts })
}
