// Licensed under the Apache-2.0 license

//! Bus extraction and address-range containment.
//!
//! A SoC has at most one BMB peripheral bus and any number of AXI buses,
//! lettered from `A`:
//!
//! ```text
//! #define SYSTEM_BMB_PERIPHERAL_BMB       0xf8000000
//! #define SYSTEM_BMB_PERIPHERAL_BMB_SIZE  0x400000
//! #define SYSTEM_AXI_A_BMB                0xe1000000
//! #define SYSTEM_AXI_A_BMB_SIZE           0x100000
//! ```

use std::fmt;
use std::str::FromStr;

use crate::store::MacroStore;
use crate::value::parse_int;
use crate::{HeaderError, Result};

const BMB_KEYWORD: &str = "BMB_PERIPHERAL_BMB";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BusFamily {
    Bmb,
    Axi,
}

impl BusFamily {
    pub const ALL: [BusFamily; 2] = [BusFamily::Bmb, BusFamily::Axi];

    pub fn key(self) -> &'static str {
        match self {
            BusFamily::Bmb => "bmb",
            BusFamily::Axi => "axi",
        }
    }
}

impl fmt::Display for BusFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for BusFamily {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bmb" => Ok(BusFamily::Bmb),
            "axi" => Ok(BusFamily::Axi),
            _ => Err(format!("unknown bus family '{s}'")),
        }
    }
}

/// One bus and the address window it decodes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusInstance {
    pub family: BusFamily,
    /// Lower-case label, e.g. `bmb` or `axi_a`.
    pub label: String,
    pub address: u64,
    pub size: u64,
}

impl BusInstance {
    /// Start and end of the window. The end saturates at `u64::MAX`.
    pub fn range(&self) -> (u64, u64) {
        (self.address, self.address.saturating_add(self.size))
    }

    /// True when `[address, address + size]` lies inside the window. Both
    /// bounds are inclusive, so a peripheral ending exactly at the end of the
    /// bus is contained.
    pub fn contains(&self, address: u64, size: u64) -> bool {
        let (start, end) = self.range();
        start <= address && address.saturating_add(size) <= end
    }

    /// Offset of `address` relative to the start of the bus.
    pub fn offset_of(&self, address: u64) -> u64 {
        address.saturating_sub(self.address)
    }
}

/// Resolves every bus of `family`.
pub fn resolve(store: &MacroStore, family: BusFamily) -> Result<Vec<BusInstance>> {
    match family {
        BusFamily::Bmb => {
            if store.count_ending_with(&format!("{BMB_KEYWORD}_SIZE")) == 0 {
                return Ok(Vec::new());
            }
            Ok(vec![instance(store, family, "bmb", BMB_KEYWORD)?])
        }
        BusFamily::Axi => (0..count_axi(store))
            .map(|i| {
                let letter = char::from(b'A' + i as u8);
                let keyword = format!("SYSTEM_AXI_{letter}_BMB");
                instance(
                    store,
                    family,
                    &format!("axi_{}", letter.to_ascii_lowercase()),
                    &keyword,
                )
            })
            .collect(),
    }
}

/// AXI buses are declared as `SYSTEM_AXI_<letter>_BMB_SIZE`.
fn count_axi(store: &MacroStore) -> usize {
    store
        .entries()
        .iter()
        .filter(|entry| {
            let segments = entry.symbol.segments();
            segments.len() == 5
                && segments[0] == "SYSTEM"
                && segments[1] == "AXI"
                && segments[2].len() == 1
                && segments[3] == "BMB"
                && segments[4] == "SIZE"
        })
        .count()
        .min(26)
}

fn instance(
    store: &MacroStore,
    family: BusFamily,
    label: &str,
    keyword: &str,
) -> Result<BusInstance> {
    let size_keyword = format!("{keyword}_SIZE");
    let address = lookup(store, keyword, &format!("Address for bus {label}"))?;
    let size = lookup(store, &size_keyword, &format!("Size for bus {label}"))?;
    Ok(BusInstance {
        family,
        label: label.to_string(),
        address,
        size,
    })
}

fn lookup(store: &MacroStore, keyword: &str, what: &str) -> Result<u64> {
    let value = store
        .last_ending_with(keyword)
        .ok_or_else(|| HeaderError::missing(what, keyword))?;
    parse_int(value).ok_or_else(|| HeaderError::InvalidNumber {
        symbol: keyword.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bmb() {
        let store = MacroStore::parse(
            "#define SYSTEM_BMB_PERIPHERAL_BMB 0xf8000000\n\
             #define SYSTEM_BMB_PERIPHERAL_BMB_SIZE 0x400000\n",
        );
        let buses = resolve(&store, BusFamily::Bmb).unwrap();
        assert_eq!(buses.len(), 1);
        assert_eq!(buses[0].label, "bmb");
        assert_eq!(buses[0].range(), (0xf800_0000, 0xf840_0000));
        assert!(resolve(&store, BusFamily::Axi).unwrap().is_empty());
    }

    #[test]
    fn test_axi_lettering() {
        let store = MacroStore::parse(
            "#define SYSTEM_AXI_A_BMB 0xe1000000\n\
             #define SYSTEM_AXI_A_BMB_SIZE 0x100000\n\
             #define SYSTEM_AXI_B_BMB 0xe2000000\n\
             #define SYSTEM_AXI_B_BMB_SIZE 0x200000\n\
             #define SYSTEM_AXI_SLAVE_0_INPUT_SIZE 0x1000\n",
        );
        let buses = resolve(&store, BusFamily::Axi).unwrap();
        let labels: Vec<_> = buses.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["axi_a", "axi_b"]);
        assert_eq!(buses[1].address, 0xe200_0000);
        assert_eq!(buses[1].size, 0x20_0000);
    }

    #[test]
    fn test_missing_bus_address_is_fatal() {
        let store = MacroStore::parse("#define SYSTEM_BMB_PERIPHERAL_BMB_SIZE 0x400000\n");
        assert!(matches!(
            resolve(&store, BusFamily::Bmb),
            Err(HeaderError::MissingMandatoryValue { .. })
        ));
    }

    #[test]
    fn test_contains_boundaries() {
        let bus = BusInstance {
            family: BusFamily::Bmb,
            label: "bmb".into(),
            address: 0x1000_0000,
            size: 0x1000_0000,
        };
        assert!(bus.contains(0x1000_0000, 0x1000));
        // ends exactly at the end of the bus
        assert!(bus.contains(0x1fff_f000, 0x1000));
        assert!(bus.contains(0x1000_0000, 0x1000_0000));
        assert!(!bus.contains(0x1fff_f000, 0x1001));
        assert!(!bus.contains(0x0fff_ffff, 0x10));
        assert_eq!(bus.offset_of(0x1001_0000), 0x1_0000);
    }

    #[test]
    fn test_family_from_str() {
        assert_eq!("AXI".parse::<BusFamily>(), Ok(BusFamily::Axi));
        assert!("ahb".parse::<BusFamily>().is_err());
    }
}
