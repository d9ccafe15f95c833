// Licensed under the Apache-2.0 license

//! The driver capability database.
//!
//! A JSON document listing, per target OS, which peripheral kinds have a
//! driver, the `compatible` strings and extra properties of each driver, and
//! the OS-level `chosen`/`aliases` defaults. A default database is compiled
//! into the binary; a replacement can be loaded at run time.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use sapphire_dt_header::value::parse_int;
use sapphire_dt_header::PeripheralKind;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::target::TargetOs;
use crate::{GenError, Result};

const BUILTIN_DRIVERS: &str = include_str!("../data/drivers.json");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverDatabase {
    pub dt_version: String,
    pub model: String,
    #[serde(default)]
    pub devkits: Vec<String>,
    pub os: OsTable,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OsTable {
    pub linux: OsProfile,
    pub zephyr: OsProfile,
    pub uboot: OsProfile,
}

/// Driver support and defaults for one target OS.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OsProfile {
    /// Upper-case peripheral kinds that have a driver on this OS. Kinds not
    /// listed are left out of the tree entirely.
    pub peripherals: Vec<String>,
    /// Entries for bus peripherals and for the `bus`/`clock` parent nodes.
    pub drivers: IndexMap<String, DriverEntry>,
    /// Entries for the `cpu` and per-core `intc` nodes.
    pub controller: IndexMap<String, DriverEntry>,
    pub chosen: Map<String, Value>,
    pub aliases: Map<String, Value>,
    pub memory_mapped: Option<MemoryMapped>,
    /// `#include` targets of the SoC dtsi, e.g. `<mem.h>`.
    pub includes: Vec<String>,
    /// Extra root node properties.
    pub root: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverEntry {
    /// Node name to use instead of the lower-case kind.
    pub name: Option<String>,
    pub compatible: Vec<String>,
    /// Property lines copied verbatim into the node.
    pub private_data: Vec<String>,
    /// Interrupt sources fanned out per core on interrupt controllers.
    pub interrupts_extended: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryMapped {
    /// Load address of the kernel image in external memory.
    pub uimage: String,
}

impl DriverDatabase {
    /// The database compiled into the tool.
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DRIVERS)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| GenError::DriverDatabase(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| GenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn profile(&self, os: TargetOs) -> &OsProfile {
        match os {
            TargetOs::Linux => &self.os.linux,
            TargetOs::Zephyr => &self.os.zephyr,
            TargetOs::UBoot => &self.os.uboot,
        }
    }

    /// The devkit whose name contains `name`, ignoring case.
    pub fn board(&self, name: &str) -> Result<&str> {
        let wanted = name.to_lowercase();
        self.devkits
            .iter()
            .find(|devkit| devkit.to_lowercase().contains(&wanted))
            .map(String::as_str)
            .ok_or_else(|| GenError::UnsupportedBoard {
                board: name.to_string(),
            })
    }
}

impl OsProfile {
    /// The peripheral kinds with a driver on this OS.
    pub fn whitelist(&self) -> Result<Vec<PeripheralKind>> {
        self.peripherals
            .iter()
            .map(|kind| kind.parse().map_err(GenError::DriverDatabase))
            .collect()
    }

    pub fn driver(&self, key: &str) -> Option<&DriverEntry> {
        self.drivers.get(key)
    }

    pub fn controller(&self, key: &str) -> Option<&DriverEntry> {
        self.controller.get(key)
    }

    pub fn uimage_address(&self) -> Result<Option<u64>> {
        let Some(mapped) = &self.memory_mapped else {
            return Ok(None);
        };
        parse_int(&mapped.uimage).map(Some).ok_or_else(|| {
            GenError::DriverDatabase(format!(
                "memory_mapped.uimage '{}' is not a number",
                mapped.uimage
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_parses() {
        let db = DriverDatabase::builtin().unwrap();
        assert_eq!(db.dt_version, "/dts-v1/");
        for os in [TargetOs::Linux, TargetOs::Zephyr, TargetOs::UBoot] {
            let profile = db.profile(os);
            assert!(!profile.whitelist().unwrap().is_empty());
            assert!(profile.driver("plic").is_some());
            assert!(profile.controller("intc").is_some());
        }
    }

    #[test]
    fn test_zephyr_whitelist() {
        let db = DriverDatabase::builtin().unwrap();
        let kinds = db.profile(TargetOs::Zephyr).whitelist().unwrap();
        assert!(!kinds.contains(&PeripheralKind::I2c));
        assert!(!kinds.contains(&PeripheralKind::Spi));
        assert!(kinds.contains(&PeripheralKind::Uart));
    }

    #[test]
    fn test_board_lookup() {
        let db = DriverDatabase::builtin().unwrap();
        assert_eq!(db.board("ti60").unwrap(), "Ti60F225");
        assert_eq!(db.board("T120").unwrap(), "T120F324");
        assert!(matches!(
            db.board("t99"),
            Err(GenError::UnsupportedBoard { .. })
        ));
    }

    #[test]
    fn test_uimage_address() {
        let db = DriverDatabase::builtin().unwrap();
        assert_eq!(
            db.profile(TargetOs::Linux).uimage_address().unwrap(),
            Some(0x40_0000)
        );
        assert_eq!(db.profile(TargetOs::Zephyr).uimage_address().unwrap(), None);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let profile = OsProfile {
            peripherals: vec!["UART".into(), "CAN".into()],
            ..Default::default()
        };
        assert!(matches!(
            profile.whitelist(),
            Err(GenError::DriverDatabase(_))
        ));
    }

    #[test]
    fn test_malformed_database() {
        assert!(matches!(
            DriverDatabase::from_json("{\"model\": 1}"),
            Err(GenError::DriverDatabase(_))
        ));
    }
}
