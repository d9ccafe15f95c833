// Licensed under the Apache-2.0 license

use indexmap::IndexMap;
use log::debug;

use crate::bus::{self, BusFamily, BusInstance};
use crate::cpu::CpuMetadata;
use crate::memory::MemoryLayout;
use crate::peripheral::{self, PeripheralInstance, PeripheralKind};
use crate::store::MacroStore;
use crate::Result;

/// Everything the header declares, grouped and typed.
///
/// Peripherals and buses are not cross-referenced here; placing peripherals
/// on buses is left to the consumer, once every bus is known.
#[derive(Clone, Debug)]
pub struct SocInventory {
    /// Instances by kind, then by instance name (`uart0`, `plic`, ...).
    /// Kinds are in order of first appearance in the header.
    pub peripherals: IndexMap<PeripheralKind, IndexMap<String, PeripheralInstance>>,
    /// Buses by label (`bmb`, `axi_a`, ...).
    pub buses: IndexMap<String, BusInstance>,
    pub cpu: CpuMetadata,
    pub memory: MemoryLayout,
}

impl SocInventory {
    pub fn build(
        store: &MacroStore,
        kinds: &[PeripheralKind],
        families: &[BusFamily],
    ) -> Result<Self> {
        let mut peripherals = IndexMap::new();
        for kind in peripheral::present_kinds(store, kinds) {
            // e.g. CLINT_HZ alone does not declare a CLINT
            if kind.is_controller() && peripheral::count(store, kind) == 0 {
                continue;
            }
            let instances: IndexMap<_, _> = peripheral::resolve(store, kind)
                .into_iter()
                .map(|p| (p.name.clone(), p))
                .collect();
            if instances.is_empty() {
                continue;
            }
            debug!("{kind}: {} instance(s)", instances.len());
            peripherals.insert(kind, instances);
        }

        let mut buses = IndexMap::new();
        for family in families {
            for bus in bus::resolve(store, *family)? {
                debug!("bus {} at {:#x}, size {:#x}", bus.label, bus.address, bus.size);
                buses.insert(bus.label.clone(), bus);
            }
        }

        Ok(Self {
            peripherals,
            buses,
            cpu: CpuMetadata::resolve(store),
            memory: MemoryLayout::resolve(store),
        })
    }

    /// All peripheral instances, kind by kind.
    pub fn peripherals(&self) -> impl Iterator<Item = &PeripheralInstance> {
        self.peripherals.values().flat_map(|instances| instances.values())
    }

    /// The first instance of `kind`, for the singleton controller kinds.
    pub fn peripheral(&self, kind: PeripheralKind) -> Option<&PeripheralInstance> {
        self.peripherals
            .get(&kind)
            .and_then(|instances| instances.values().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"
#define SYSTEM_CLINT_HZ 50000000
#define SYSTEM_CORES_0_SUPERVISOR 1
#define SYSTEM_CORES_1_SUPERVISOR 1
#define SYSTEM_BMB_PERIPHERAL_BMB 0xf8000000
#define SYSTEM_BMB_PERIPHERAL_BMB_SIZE 0x1000000
#define SYSTEM_AXI_A_BMB 0xe0000000
#define SYSTEM_AXI_A_BMB_SIZE 0x100000
#define SYSTEM_PLIC_CTRL 0xf8c00000
#define SYSTEM_PLIC_CTRL_SIZE 0x400000
#define SYSTEM_UART_0_IO_CTRL 0xf8010000
#define SYSTEM_UART_0_IO_CTRL_SIZE 0x40
#define SYSTEM_PLIC_SYSTEM_UART_0_IO_INTERRUPT 1
#define SYSTEM_SPI_0_IO_CTRL 0xf8014000
#define SYSTEM_SPI_0_IO_CTRL_SIZE 0x100
"#;

    #[test]
    fn test_build() {
        let store = MacroStore::parse(HEADER);
        let inventory =
            SocInventory::build(&store, &PeripheralKind::ALL, &BusFamily::ALL).unwrap();

        let kinds: Vec<_> = inventory.peripherals.keys().copied().collect();
        assert_eq!(
            kinds,
            [PeripheralKind::Plic, PeripheralKind::Uart, PeripheralKind::Spi]
        );
        assert_eq!(inventory.peripherals().count(), 3);
        assert_eq!(
            inventory.peripheral(PeripheralKind::Plic).unwrap().address,
            0xf8c0_0000
        );
        assert!(inventory.peripheral(PeripheralKind::Clint).is_none());

        let buses: Vec<_> = inventory.buses.keys().map(String::as_str).collect();
        assert_eq!(buses, ["bmb", "axi_a"]);
        assert_eq!(inventory.cpu.core_count, 2);
        assert_eq!(inventory.memory, MemoryLayout::default());
    }

    #[test]
    fn test_requested_kinds_only() {
        let store = MacroStore::parse(HEADER);
        let inventory = SocInventory::build(&store, &[PeripheralKind::Spi], &[]).unwrap();
        assert_eq!(inventory.peripherals().count(), 1);
        assert!(inventory.buses.is_empty());
    }
}
