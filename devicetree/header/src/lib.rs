// Licensed under the Apache-2.0 license

//! Reader for the `soc.h` header generated alongside a Sapphire SoC bitstream.
//!
//! The header is a flat list of `#define SYMBOL VALUE` lines describing the
//! memory map, the peripherals, the buses and the CPU features of the SoC.
//! This crate turns that flat namespace into a structured [`SocInventory`].
//!
//! ## Usage
//!
//! ```
//! use sapphire_dt_header::{BusFamily, MacroStore, PeripheralKind, SocInventory};
//!
//! let store = MacroStore::parse(
//!     "#define SYSTEM_BMB_PERIPHERAL_BMB 0x10000000\n\
//!      #define SYSTEM_BMB_PERIPHERAL_BMB_SIZE 0x10000000\n\
//!      #define SYSTEM_UART_0_IO_CTRL 0x10000000\n\
//!      #define SYSTEM_UART_0_IO_CTRL_SIZE 0x1000\n",
//! );
//! let inventory =
//!     SocInventory::build(&store, &PeripheralKind::ALL, &BusFamily::ALL).unwrap();
//! assert_eq!(inventory.peripherals().count(), 1);
//! assert_eq!(inventory.buses.len(), 1);
//! ```
//!
//! ## Module Organization
//!
//! - [`store`]: the ordered macro store and its lookup operations
//! - [`value`]: numeric parsing of macro values
//! - [`peripheral`]: per-instance peripheral extraction
//! - [`bus`]: bus extraction and address-range containment
//! - [`cpu`]: core count, caches and ISA string
//! - [`memory`]: internal and external memory regions
//! - [`inventory`]: the composed [`SocInventory`]

pub mod bus;
pub mod cpu;
pub mod inventory;
pub mod memory;
pub mod peripheral;
pub mod store;
pub mod value;

mod error;

pub use bus::{BusFamily, BusInstance};
pub use cpu::{CacheGeometry, Caches, CoreMetadata, CpuMetadata, IsaExtensions};
pub use error::{HeaderError, Result};
pub use inventory::SocInventory;
pub use memory::{MemoryLayout, MemoryRegion};
pub use peripheral::{PeripheralInstance, PeripheralKind};
pub use store::{MacroEntry, MacroStore, Match, Symbol};
