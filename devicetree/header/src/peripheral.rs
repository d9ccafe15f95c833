// Licensed under the Apache-2.0 license

//! Per-instance peripheral extraction.
//!
//! For an enumerable kind such as `UART`, the instances are `UART_0`,
//! `UART_1`, ... up to the number of control-register macros declared for the
//! kind. Controller kinds (`PLIC`, `CLINT`, `RAM`) always have exactly one
//! instance named by the bare keyword.
//!
//! ```text
//! #define SYSTEM_UART_0_IO_CTRL                  0xf8010000   -> address
//! #define SYSTEM_UART_0_IO_CTRL_SIZE             0x40         -> size
//! #define SYSTEM_PLIC_SYSTEM_UART_0_IO_INTERRUPT 1            -> interrupts[0]
//! ```

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use log::{debug, warn};

use crate::store::MacroStore;
use crate::value::{is_digits, parse_int};
use crate::{HeaderError, Result};

/// The peripheral kinds a Sapphire SoC header can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeripheralKind {
    Uart,
    I2c,
    Spi,
    Gpio,
    ApbSlave,
    AxiSlave,
    Clint,
    Plic,
    Ram,
}

impl PeripheralKind {
    pub const ALL: [PeripheralKind; 9] = [
        PeripheralKind::Uart,
        PeripheralKind::I2c,
        PeripheralKind::Spi,
        PeripheralKind::Gpio,
        PeripheralKind::ApbSlave,
        PeripheralKind::Clint,
        PeripheralKind::Plic,
        PeripheralKind::AxiSlave,
        PeripheralKind::Ram,
    ];

    /// The upper-case keyword used in macro symbols.
    pub fn keyword(self) -> &'static str {
        match self {
            PeripheralKind::Uart => "UART",
            PeripheralKind::I2c => "I2C",
            PeripheralKind::Spi => "SPI",
            PeripheralKind::Gpio => "GPIO",
            PeripheralKind::ApbSlave => "APB_SLAVE",
            PeripheralKind::AxiSlave => "AXI_SLAVE",
            PeripheralKind::Clint => "CLINT",
            PeripheralKind::Plic => "PLIC",
            PeripheralKind::Ram => "RAM",
        }
    }

    /// The lower-case key used by the driver database and for node names.
    pub fn key(self) -> String {
        self.keyword().to_lowercase()
    }

    /// Singleton system peripherals with a fixed name.
    pub fn is_controller(self) -> bool {
        matches!(
            self,
            PeripheralKind::Plic | PeripheralKind::Clint | PeripheralKind::Ram
        )
    }

    /// Slave ports expose an `INPUT` window instead of a `CTRL` register.
    fn is_slave_port(self) -> bool {
        matches!(self, PeripheralKind::ApbSlave | PeripheralKind::AxiSlave)
    }
}

impl fmt::Display for PeripheralKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for PeripheralKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        PeripheralKind::ALL
            .into_iter()
            .find(|kind| kind.keyword() == upper)
            .ok_or_else(|| format!("unknown peripheral type '{s}'"))
    }
}

/// One physical occurrence of a peripheral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeripheralInstance {
    pub kind: PeripheralKind,
    /// Instance index, `None` for controller kinds.
    pub index: Option<usize>,
    /// Node name, e.g. `uart0` or `plic`.
    pub name: String,
    /// Macro label, e.g. `UART_0` or `PLIC`.
    pub label: String,
    pub address: u64,
    pub size: u64,
    pub interrupts: Vec<u32>,
}

impl PeripheralInstance {
    /// First address past the end of the register window.
    pub fn end(&self) -> u64 {
        self.address.saturating_add(self.size)
    }
}

/// Resolves every instance of `kind` declared in the header.
pub fn resolve(store: &MacroStore, kind: PeripheralKind) -> Vec<PeripheralInstance> {
    let count = if kind.is_controller() {
        1
    } else {
        count(store, kind)
    };
    (0..count).map(|i| instance(store, kind, i)).collect()
}

/// Number of instances of an enumerable kind: the distinct control-register
/// symbols declared for it, size macros excluded. A redefined symbol counts
/// once.
pub fn count(store: &MacroStore, kind: PeripheralKind) -> usize {
    store
        .properties_for_excluding(kind.keyword(), "SIZE")
        .filter(|entry| entry.symbol.ends_with(control_marker(kind)))
        .map(|entry| entry.symbol.as_str())
        .collect::<IndexSet<_>>()
        .len()
}

/// The kinds of `whitelist` that appear in the header, in order of first
/// appearance.
pub fn present_kinds(store: &MacroStore, whitelist: &[PeripheralKind]) -> Vec<PeripheralKind> {
    let mut kinds = Vec::new();
    for entry in store.entries() {
        for kind in whitelist {
            if entry.symbol.contains(kind.keyword()) && !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
    }
    kinds
}

/// Address of the control register of `label`, which must be declared.
pub fn require_address(store: &MacroStore, label: &str) -> Result<u64> {
    let value = store
        .properties_for(label)
        .filter(|entry| entry.symbol.ends_with("CTRL") || entry.symbol.ends_with("INPUT"))
        .last()
        .ok_or_else(|| {
            HeaderError::missing(
                format!("Address for {label}"),
                format!("SYSTEM_{label}_CTRL"),
            )
        })?;
    resolve_int(store, &value.value).ok_or_else(|| HeaderError::InvalidNumber {
        symbol: value.symbol.as_str().to_string(),
        value: value.value.clone(),
    })
}

fn control_marker(kind: PeripheralKind) -> &'static str {
    if kind.is_slave_port() {
        "INPUT"
    } else {
        "CTRL"
    }
}

fn instance(store: &MacroStore, kind: PeripheralKind, index: usize) -> PeripheralInstance {
    let (label, name, index) = if kind.is_controller() {
        (kind.keyword().to_string(), kind.key(), None)
    } else {
        (
            format!("{}_{}", kind.keyword(), index),
            format!("{}{}", kind.key(), index),
            Some(index),
        )
    };

    let mut address = None;
    let mut size = None;
    for entry in store.properties_for(&label) {
        if entry.symbol.ends_with("CTRL") || entry.symbol.ends_with("INPUT") {
            address = resolve_int(store, &entry.value);
        }
        if entry.symbol.ends_with("CTRL_SIZE") || entry.symbol.ends_with("INPUT_SIZE") {
            size = resolve_int(store, &entry.value);
        }
    }
    if address.is_none() || size.is_none() {
        debug!("{label}: address or size not declared, using 0");
    }

    let interrupts = if kind.is_controller() {
        Vec::new()
    } else {
        interrupts(store, &label)
    };

    PeripheralInstance {
        kind,
        index,
        name,
        label,
        address: address.unwrap_or(0),
        size: size.unwrap_or(0),
        interrupts,
    }
}

/// Interrupt lines of an instance, in declaration order. Symbolic values are
/// dereferenced.
pub fn interrupts(store: &MacroStore, label: &str) -> Vec<u32> {
    store
        .properties_for(label)
        .filter(|entry| {
            entry.symbol.has_segment("INTERRUPT") || entry.symbol.has_segment("INTERRUPTS")
        })
        .map(|entry| {
            let value = if is_digits(&entry.value) {
                entry.value.as_str()
            } else {
                store.dereference(&entry.value)
            };
            parse_int(value)
                .and_then(|irq| u32::try_from(irq).ok())
                .unwrap_or_else(|| {
                    warn!(
                        "{}: interrupt '{}' does not resolve to a number, using 0",
                        entry.symbol.as_str(),
                        entry.value
                    );
                    0
                })
        })
        .collect()
}

fn resolve_int(store: &MacroStore, value: &str) -> Option<u64> {
    parse_int(value).or_else(|| parse_int(store.dereference(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"
#define SYSTEM_CLINT_HZ 50000000
#define SYSTEM_CLINT_CTRL 0xf8b00000
#define SYSTEM_CLINT_CTRL_SIZE 0x10000
#define SYSTEM_PLIC_CTRL 0xf8c00000
#define SYSTEM_PLIC_CTRL_SIZE 0x400000
#define SYSTEM_UART_0_IO_CTRL 0xf8010000
#define SYSTEM_UART_0_IO_CTRL_SIZE 0x40
#define SYSTEM_PLIC_SYSTEM_UART_0_IO_INTERRUPT 1
#define SYSTEM_UART_1_IO_CTRL 0xf8011000
#define SYSTEM_UART_1_IO_CTRL_SIZE 0x40
#define SYSTEM_PLIC_SYSTEM_UART_1_IO_INTERRUPT SYSTEM_PLIC_USER_INTERRUPT_B_INTERRUPT
#define SYSTEM_PLIC_USER_INTERRUPT_B_INTERRUPT 9
#define SYSTEM_GPIO_0_IO_CTRL 0xf8015000
#define SYSTEM_GPIO_0_IO_CTRL_SIZE 0x100
#define SYSTEM_PLIC_SYSTEM_GPIO_0_IO_INTERRUPTS_0 12
#define SYSTEM_PLIC_SYSTEM_GPIO_0_IO_INTERRUPTS_1 13
#define SYSTEM_SPI_0_IO_CTRL 0xf8014000
#define IO_APB_SLAVE_0_INPUT 0xf8100000
#define IO_APB_SLAVE_0_INPUT_SIZE 0x10000
"#;

    #[test]
    fn test_count() {
        let store = MacroStore::parse(HEADER);
        assert_eq!(count(&store, PeripheralKind::Uart), 2);
        assert_eq!(count(&store, PeripheralKind::Gpio), 1);
        assert_eq!(count(&store, PeripheralKind::I2c), 0);
        assert_eq!(count(&store, PeripheralKind::ApbSlave), 1);
    }

    #[test]
    fn test_redefined_control_register_counts_once() {
        let store = MacroStore::parse(
            "#define SYSTEM_UART_0_IO_CTRL 0xf8010000\n\
             #define SYSTEM_UART_0_IO_CTRL 0xf8011000\n\
             #define SYSTEM_UART_0_IO_CTRL_SIZE 0x40\n",
        );
        assert_eq!(count(&store, PeripheralKind::Uart), 1);

        let uarts = resolve(&store, PeripheralKind::Uart);
        assert_eq!(uarts.len(), 1);
        assert_eq!(uarts[0].name, "uart0");
        assert_eq!(uarts[0].address, 0xf801_1000);
        assert_eq!(uarts[0].size, 0x40);
    }

    #[test]
    fn test_instances_are_contiguous() {
        let store = MacroStore::parse(HEADER);
        let uarts = resolve(&store, PeripheralKind::Uart);
        assert_eq!(uarts.len(), 2);
        for (i, uart) in uarts.iter().enumerate() {
            assert_eq!(uart.index, Some(i));
            assert_eq!(uart.name, format!("uart{i}"));
            assert_eq!(uart.label, format!("UART_{i}"));
        }
        assert_eq!(uarts[0].address, 0xf801_0000);
        assert_eq!(uarts[0].size, 0x40);
        assert_eq!(uarts[0].interrupts, [1]);
    }

    #[test]
    fn test_symbolic_interrupt_is_dereferenced() {
        let store = MacroStore::parse(HEADER);
        let uarts = resolve(&store, PeripheralKind::Uart);
        assert_eq!(uarts[1].interrupts, [9]);
    }

    #[test]
    fn test_multiple_interrupts_are_kept_in_order() {
        let store = MacroStore::parse(HEADER);
        let gpio = resolve(&store, PeripheralKind::Gpio);
        assert_eq!(gpio[0].interrupts, [12, 13]);
    }

    #[test]
    fn test_controllers_are_singletons() {
        let store = MacroStore::parse(HEADER);
        let plic = resolve(&store, PeripheralKind::Plic);
        assert_eq!(plic.len(), 1);
        assert_eq!(plic[0].name, "plic");
        assert_eq!(plic[0].label, "PLIC");
        assert_eq!(plic[0].index, None);
        assert_eq!(plic[0].address, 0xf8c0_0000);
        assert!(plic[0].interrupts.is_empty());

        let clint = resolve(&store, PeripheralKind::Clint);
        assert_eq!(clint[0].address, 0xf8b0_0000);
        assert_eq!(clint[0].size, 0x10000);
    }

    #[test]
    fn test_missing_size_is_a_placeholder() {
        let store = MacroStore::parse(HEADER);
        let spi = resolve(&store, PeripheralKind::Spi);
        assert_eq!(spi.len(), 1);
        assert_eq!(spi[0].address, 0xf801_4000);
        assert_eq!(spi[0].size, 0);
    }

    #[test]
    fn test_slave_port() {
        let store = MacroStore::parse(HEADER);
        let apb = resolve(&store, PeripheralKind::ApbSlave);
        assert_eq!(apb[0].name, "apb_slave0");
        assert_eq!(apb[0].address, 0xf810_0000);
        assert_eq!(apb[0].size, 0x10000);
    }

    #[test]
    fn test_present_kinds() {
        let store = MacroStore::parse(HEADER);
        let kinds = present_kinds(&store, &PeripheralKind::ALL);
        assert_eq!(
            kinds,
            [
                PeripheralKind::Clint,
                PeripheralKind::Plic,
                PeripheralKind::Uart,
                PeripheralKind::Gpio,
                PeripheralKind::Spi,
                PeripheralKind::ApbSlave,
            ]
        );
    }

    #[test]
    fn test_require_address() {
        let store = MacroStore::parse(HEADER);
        assert_eq!(require_address(&store, "PLIC"), Ok(0xf8c0_0000));
        assert!(matches!(
            require_address(&store, "I2C_0"),
            Err(HeaderError::MissingMandatoryValue { .. })
        ));
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("uart".parse::<PeripheralKind>(), Ok(PeripheralKind::Uart));
        assert_eq!(
            "APB_SLAVE".parse::<PeripheralKind>(),
            Ok(PeripheralKind::ApbSlave)
        );
        assert!("can".parse::<PeripheralKind>().is_err());
    }
}
