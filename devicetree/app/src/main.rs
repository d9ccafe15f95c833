// Licensed under the Apache-2.0 license

mod run;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;
use sapphire_dt_generator::{MemorySelection, Target, TargetOs};
use simple_logger::SimpleLogger;

use crate::run::Request;

#[derive(Parser, Debug)]
#[command(
    name = "sapphire-dt",
    author,
    version,
    about = "Generate Linux, U-Boot and Zephyr device trees from a Sapphire SoC header"
)]
struct Cli {
    /// Path to soc.h
    #[arg(value_name = "SOC_H")]
    soc: PathBuf,

    /// Development kit name such as t120, ti60
    board: String,

    /// Output directory, recreated on every run
    #[arg(short, long, default_value = "dts", env = "SAPPHIRE_DT_DIR")]
    dir: PathBuf,

    /// Override the SoC dtsi file name (Linux and U-Boot only)
    #[arg(short, long)]
    outfile: Option<String>,

    /// Also save the node tree as sapphire.json
    #[arg(short, long)]
    json: bool,

    /// User directive file; may be repeated, later files win
    #[arg(short, long = "user-config", value_name = "FILE")]
    user_config: Vec<PathBuf>,

    /// Alternate driver database
    #[arg(long, value_name = "FILE", env = "SAPPHIRE_DT_DRIVERS")]
    drivers: Option<PathBuf>,

    /// More logging; repeat for trace output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    os: OsCommand,
}

#[derive(Subcommand, Debug)]
enum OsCommand {
    /// Linux kernel device tree
    Linux,
    /// U-Boot device tree
    #[command(alias = "u-boot")]
    Uboot,
    /// Zephyr SoC dtsi and board dts
    Zephyr(ZephyrArgs),
}

#[derive(Args, Debug)]
struct ZephyrArgs {
    /// Custom SoC name for the Zephyr SoC dtsi
    socname: String,

    /// Zephyr board name
    zephyrboard: String,

    /// Run from external memory; falls back to internal memory when the SoC has none
    #[arg(long, visible_alias = "em")]
    extmemory: bool,
}

impl Cli {
    fn level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    fn into_request(self) -> Request {
        let (target, zephyr_board) = match self.os {
            OsCommand::Linux => (Target::new(TargetOs::Linux, &self.board), None),
            OsCommand::Uboot => (Target::new(TargetOs::UBoot, &self.board), None),
            OsCommand::Zephyr(zephyr) => {
                let memory = if zephyr.extmemory {
                    MemorySelection::External
                } else {
                    MemorySelection::Internal
                };
                let target = Target::new(TargetOs::Zephyr, &self.board)
                    .with_soc_name(zephyr.socname)
                    .with_memory(memory);
                (target, Some(zephyr.zephyrboard))
            }
        };
        let target = match self.outfile {
            Some(outfile) => target.with_outfile(outfile),
            None => target,
        };
        Request {
            soc: self.soc,
            target,
            dir: self.dir,
            zephyr_board,
            json: self.json,
            user_configs: self.user_config,
            drivers: self.drivers,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    SimpleLogger::new().with_level(cli.level()).init()?;

    run::run(&cli.into_request())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_linux_request() {
        let args = "sapphire-dt soc.h ti60 -j -o board.dtsi -u a.json -u b.json linux";
        let cli = Cli::try_parse_from(args.split_whitespace()).unwrap();
        assert_eq!(cli.level(), LevelFilter::Info);
        let request = cli.into_request();
        assert_eq!(request.target.os, TargetOs::Linux);
        assert_eq!(request.target.dtsi_name(), "board.dtsi");
        assert_eq!(
            request.user_configs,
            [PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
        assert!(request.json);
    }

    #[test]
    fn test_zephyr_request() {
        let args = "sapphire-dt -vv soc.h ti60 zephyr efx ti60_dev --extmemory";
        let cli = Cli::try_parse_from(args.split_whitespace()).unwrap();
        assert_eq!(cli.level(), LevelFilter::Trace);
        let request = cli.into_request();
        assert_eq!(request.target.memory, MemorySelection::External);
        assert_eq!(request.target.dtsi_name(), "sapphire_soc_efx.dtsi");
        assert_eq!(request.zephyr_board.as_deref(), Some("ti60_dev"));
    }

    #[test]
    fn test_quiet_and_verbose_conflict() {
        let args = "sapphire-dt -q -v soc.h ti60 linux";
        assert!(Cli::try_parse_from(args.split_whitespace()).is_err());
    }
}
