// Licensed under the Apache-2.0 license

//! Internal (on-chip) and external (DDR) memory regions.

use crate::store::MacroStore;
use crate::value::parse_int;
use crate::{HeaderError, Result};

const INTERNAL: &str = "SYSTEM_RAM_A_CTRL";
const EXTERNAL: &str = "SYSTEM_DDR_BMB";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemoryRegion {
    pub address: u64,
    pub size: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryLayout {
    pub internal: Option<MemoryRegion>,
    pub external: Option<MemoryRegion>,
}

impl MemoryLayout {
    pub fn resolve(store: &MacroStore) -> Self {
        Self {
            internal: region(store, INTERNAL),
            external: region(store, EXTERNAL),
        }
    }

    /// The part of external memory left to the operating system when the
    /// boot image is loaded at `load`: it starts at `load` and spans
    /// `size - load`.
    pub fn usable_external(&self, load: u64) -> Result<Option<MemoryRegion>> {
        let Some(external) = self.external else {
            return Ok(None);
        };
        let size = external
            .size
            .checked_sub(load)
            .ok_or(HeaderError::LoadAddressOutOfRange {
                load,
                size: external.size,
            })?;
        Ok(Some(MemoryRegion {
            address: load,
            size,
        }))
    }
}

fn region(store: &MacroStore, symbol: &str) -> Option<MemoryRegion> {
    let address = store.value(symbol).and_then(parse_int)?;
    let size = store
        .value(&format!("{symbol}_SIZE"))
        .and_then(parse_int)?;
    Some(MemoryRegion { address, size })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "#define SYSTEM_RAM_A_CTRL 0xf9000000\n\
                          #define SYSTEM_RAM_A_CTRL_SIZE 0x10000\n\
                          #define SYSTEM_DDR_BMB 0x00001000\n\
                          #define SYSTEM_DDR_BMB_SIZE 0x40000000\n";

    #[test]
    fn test_resolve() {
        let layout = MemoryLayout::resolve(&MacroStore::parse(HEADER));
        assert_eq!(
            layout.internal,
            Some(MemoryRegion {
                address: 0xf900_0000,
                size: 0x1_0000
            })
        );
        assert_eq!(layout.external.map(|r| r.size), Some(0x4000_0000));
    }

    #[test]
    fn test_usable_external() {
        let layout = MemoryLayout::resolve(&MacroStore::parse(HEADER));
        assert_eq!(
            layout.usable_external(0x0040_0000),
            Ok(Some(MemoryRegion {
                address: 0x0040_0000,
                size: 0x3fc0_0000
            }))
        );
        assert_eq!(
            layout.usable_external(0x8000_0000),
            Err(HeaderError::LoadAddressOutOfRange {
                load: 0x8000_0000,
                size: 0x4000_0000
            })
        );
    }

    #[test]
    fn test_no_external_memory() {
        let layout = MemoryLayout::resolve(&MacroStore::parse(""));
        assert_eq!(layout, MemoryLayout::default());
        assert_eq!(layout.usable_external(0x40_0000), Ok(None));
    }
}
