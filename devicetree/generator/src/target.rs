// Licensed under the Apache-2.0 license

use std::fmt;
use std::str::FromStr;

/// The boot environment a device tree is generated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetOs {
    Linux,
    Zephyr,
    UBoot,
}

impl TargetOs {
    /// Key of the target in the driver database.
    pub fn key(self) -> &'static str {
        match self {
            TargetOs::Linux => "linux",
            TargetOs::Zephyr => "zephyr",
            TargetOs::UBoot => "uboot",
        }
    }

    pub fn is_zephyr(self) -> bool {
        self == TargetOs::Zephyr
    }
}

impl fmt::Display for TargetOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TargetOs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(TargetOs::Linux),
            "zephyr" => Ok(TargetOs::Zephyr),
            "uboot" | "u-boot" => Ok(TargetOs::UBoot),
            _ => Err(format!("unknown target OS '{s}'")),
        }
    }
}

/// Which memory the Zephyr `chosen` node points the kernel at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MemorySelection {
    #[default]
    Internal,
    External,
}

/// Everything about a generation run that does not come from the header.
#[derive(Clone, Debug)]
pub struct Target {
    pub os: TargetOs,
    /// Devkit name as given by the user; matched against the database.
    pub board: String,
    pub memory: MemorySelection,
    /// Zephyr SoC name, used for the dtsi file name and the include line.
    pub soc_name: Option<String>,
    /// Overrides the dtsi file name on Linux and U-Boot.
    pub outfile: Option<String>,
}

impl Target {
    pub fn new(os: TargetOs, board: impl Into<String>) -> Self {
        Self {
            os,
            board: board.into(),
            memory: if os.is_zephyr() {
                MemorySelection::Internal
            } else {
                MemorySelection::External
            },
            soc_name: None,
            outfile: None,
        }
    }

    pub fn with_memory(mut self, memory: MemorySelection) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_soc_name(mut self, soc_name: impl Into<String>) -> Self {
        self.soc_name = Some(soc_name.into());
        self
    }

    pub fn with_outfile(mut self, outfile: impl Into<String>) -> Self {
        self.outfile = Some(outfile.into());
        self
    }

    /// File name of the SoC-level include.
    pub fn dtsi_name(&self) -> String {
        match (&self.soc_name, &self.outfile, self.os) {
            (Some(soc), _, TargetOs::Zephyr) => format!("sapphire_soc_{soc}.dtsi"),
            (_, Some(outfile), os) if !os.is_zephyr() => outfile.clone(),
            _ => "sapphire.dtsi".to_string(),
        }
    }

    /// File name of the board-level source.
    pub fn dts_name(&self, zephyr_board: Option<&str>) -> String {
        match (self.os, zephyr_board) {
            (TargetOs::Zephyr, Some(board)) => format!("{board}.dts"),
            (os, _) => format!("{}.dts", os.key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!("Linux".parse::<TargetOs>(), Ok(TargetOs::Linux));
        assert_eq!("u-boot".parse::<TargetOs>(), Ok(TargetOs::UBoot));
        assert!("freertos".parse::<TargetOs>().is_err());
    }

    #[test]
    fn test_defaults() {
        let linux = Target::new(TargetOs::Linux, "ti60");
        assert_eq!(linux.memory, MemorySelection::External);
        assert_eq!(linux.dtsi_name(), "sapphire.dtsi");

        let zephyr = Target::new(TargetOs::Zephyr, "ti60").with_soc_name("ti60");
        assert_eq!(zephyr.memory, MemorySelection::Internal);
        assert_eq!(zephyr.dtsi_name(), "sapphire_soc_ti60.dtsi");
    }

    #[test]
    fn test_file_names() {
        let uboot = Target::new(TargetOs::UBoot, "t120").with_outfile("board.dtsi");
        assert_eq!(uboot.dtsi_name(), "board.dtsi");
        assert_eq!(uboot.dts_name(None), "uboot.dts");

        // the Zephyr dtsi name always follows the SoC name
        let zephyr = Target::new(TargetOs::Zephyr, "ti60")
            .with_soc_name("efx")
            .with_outfile("board.dtsi");
        assert_eq!(zephyr.dtsi_name(), "sapphire_soc_efx.dtsi");
        assert_eq!(zephyr.dts_name(Some("ti60_dev")), "ti60_dev.dts");
    }
}
