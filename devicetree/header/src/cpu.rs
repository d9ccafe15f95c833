// Licensed under the Apache-2.0 license

//! Core count, cache geometry, ISA string and system frequency.

use crate::store::MacroStore;
use crate::value::parse_int;

const ISA_PREFIX: &str = "SYSTEM_RISCV_ISA";

/// Instruction set extensions implemented by every core.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IsaExtensions {
    pub multiply: bool,
    pub atomic: bool,
    pub compressed: bool,
    pub single_float: bool,
    pub double_float: bool,
}

impl IsaExtensions {
    pub fn resolve(store: &MacroStore) -> Self {
        let flag = |ext: &str| {
            store
                .value(&format!("{ISA_PREFIX}_EXT_{ext}"))
                .and_then(parse_int)
                == Some(1)
        };
        Self {
            multiply: flag("M"),
            atomic: flag("A"),
            compressed: flag("C"),
            single_float: flag("F"),
            double_float: flag("D"),
        }
    }

    /// The RISC-V ISA string. Extension letters are always appended in the
    /// order `m`, `a`, `c`, `f`, `d`.
    pub fn isa_string(&self) -> String {
        let mut isa = String::from("rv32i");
        for (enabled, letter) in [
            (self.multiply, 'm'),
            (self.atomic, 'a'),
            (self.compressed, 'c'),
            (self.single_float, 'f'),
            (self.double_float, 'd'),
        ] {
            if enabled {
                isa.push(letter);
            }
        }
        isa
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheGeometry {
    pub sets: u64,
    pub size: u64,
    /// Line size in bytes, when declared.
    pub block: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caches {
    pub icache: CacheGeometry,
    pub dcache: CacheGeometry,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoreMetadata {
    pub index: usize,
    /// Present only when way and size are declared for both caches.
    pub caches: Option<Caches>,
    pub mmu: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CpuMetadata {
    pub core_count: usize,
    pub isa: IsaExtensions,
    pub cores: Vec<CoreMetadata>,
    /// System clock in Hz, from the last `CLINT_HZ` macro.
    pub frequency: Option<u64>,
}

impl CpuMetadata {
    pub fn resolve(store: &MacroStore) -> Self {
        let core_count = store.count_ending_with("SUPERVISOR").max(1);
        let cores = (0..core_count).map(|i| core(store, i)).collect();
        Self {
            core_count,
            isa: IsaExtensions::resolve(store),
            cores,
            frequency: store.last_ending_with("CLINT_HZ").and_then(parse_int),
        }
    }

    pub fn isa_string(&self) -> String {
        self.isa.isa_string()
    }
}

fn core(store: &MacroStore, index: usize) -> CoreMetadata {
    let prefix = format!("SYSTEM_CORES_{index}");
    let get = |suffix: &str| {
        store
            .value(&format!("{prefix}_{suffix}"))
            .and_then(parse_int)
    };

    let block = get("BYTES_PER_LINE");
    let caches = match (
        get("ICACHE_WAY"),
        get("ICACHE_SIZE"),
        get("DCACHE_WAY"),
        get("DCACHE_SIZE"),
    ) {
        (Some(i_sets), Some(i_size), Some(d_sets), Some(d_size)) => Some(Caches {
            icache: CacheGeometry {
                sets: i_sets,
                size: i_size,
                block,
            },
            dcache: CacheGeometry {
                sets: d_sets,
                size: d_size,
                block,
            },
        }),
        _ => None,
    };

    let supervisor = store
        .value(&format!("{prefix}_SUPERVISOR"))
        .and_then(parse_int)
        .is_some_and(|v| v != 0);

    CoreMetadata {
        index,
        caches,
        mmu: supervisor || get("MMU") == Some(1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isa_order_is_fixed() {
        // flags declared out of order
        let store = MacroStore::parse(
            "#define SYSTEM_RISCV_ISA_EXT_D 1\n\
             #define SYSTEM_RISCV_ISA_EXT_C 1\n\
             #define SYSTEM_RISCV_ISA_EXT_F 1\n\
             #define SYSTEM_RISCV_ISA_EXT_A 1\n\
             #define SYSTEM_RISCV_ISA_EXT_M 1\n",
        );
        assert_eq!(IsaExtensions::resolve(&store).isa_string(), "rv32imacfd");
    }

    #[test]
    fn test_isa_partial() {
        let store = MacroStore::parse(
            "#define SYSTEM_RISCV_ISA_EXT_M 1\n\
             #define SYSTEM_RISCV_ISA_EXT_A 0\n\
             #define SYSTEM_RISCV_ISA_EXT_C 1\n",
        );
        assert_eq!(IsaExtensions::resolve(&store).isa_string(), "rv32imc");
        assert_eq!(IsaExtensions::default().isa_string(), "rv32i");
    }

    #[test]
    fn test_core_count_defaults_to_one() {
        let cpu = CpuMetadata::resolve(&MacroStore::parse(""));
        assert_eq!(cpu.core_count, 1);
        assert_eq!(cpu.cores.len(), 1);
        assert_eq!(cpu.frequency, None);
        assert!(!cpu.cores[0].mmu);
    }

    #[test]
    fn test_supervisor_cores() {
        let store = MacroStore::parse(
            "#define SYSTEM_CLINT_HZ 100000000\n\
             #define SYSTEM_CORES_0_SUPERVISOR 1\n\
             #define SYSTEM_CORES_1_SUPERVISOR 1\n",
        );
        let cpu = CpuMetadata::resolve(&store);
        assert_eq!(cpu.core_count, 2);
        assert!(cpu.cores.iter().all(|c| c.mmu));
        assert_eq!(cpu.frequency, Some(100_000_000));
    }

    #[test]
    fn test_caches_need_way_and_size() {
        let store = MacroStore::parse(
            "#define SYSTEM_CORES_0_ICACHE_WAY 1\n\
             #define SYSTEM_CORES_0_ICACHE_SIZE 4096\n\
             #define SYSTEM_CORES_0_DCACHE_WAY 1\n\
             #define SYSTEM_CORES_0_DCACHE_SIZE 4096\n\
             #define SYSTEM_CORES_0_BYTES_PER_LINE 64\n",
        );
        let cpu = CpuMetadata::resolve(&store);
        let caches = cpu.cores[0].caches.unwrap();
        assert_eq!(caches.icache.sets, 1);
        assert_eq!(caches.dcache.size, 4096);
        assert_eq!(caches.dcache.block, Some(64));

        let store = MacroStore::parse("#define SYSTEM_CORES_0_ICACHE_WAY 1\n");
        assert_eq!(CpuMetadata::resolve(&store).cores[0].caches, None);
    }
}
