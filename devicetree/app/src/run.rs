// Licensed under the Apache-2.0 license

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};
use sapphire_dt_generator::{generate, DriverDatabase, Generated, Target, UserConfig};

/// Inputs and outputs of one generator run, as resolved from the command line.
#[derive(Clone, Debug)]
pub struct Request {
    pub soc: PathBuf,
    pub target: Target,
    pub dir: PathBuf,
    /// Zephyr board name; names the board dts.
    pub zephyr_board: Option<String>,
    pub json: bool,
    pub user_configs: Vec<PathBuf>,
    pub drivers: Option<PathBuf>,
}

/// Generates the device tree and writes it into `request.dir`.
///
/// Every input is read and the tree fully built before the output directory
/// is touched, so a failed run leaves the previous output in place.
pub fn run(request: &Request) -> Result<Vec<PathBuf>> {
    let header = fs::read_to_string(&request.soc)
        .with_context(|| format!("failed to read SoC header {}", request.soc.display()))?;

    let db = match &request.drivers {
        Some(path) => DriverDatabase::load(path)
            .with_context(|| format!("failed to load driver database {}", path.display()))?,
        None => DriverDatabase::builtin()?,
    };

    let mut user = UserConfig::default();
    for path in &request.user_configs {
        user.merge(UserConfig::load(path)?);
        debug!("user directives read from {}", path.display());
    }

    let generated = generate(&header, &db, &request.target, &user).with_context(|| {
        format!(
            "failed to generate a device tree from {}",
            request.soc.display()
        )
    })?;

    write_outputs(request, &generated)
}

fn write_outputs(request: &Request, generated: &Generated) -> Result<Vec<PathBuf>> {
    recreate_dir(&request.dir)?;

    let mut written = vec![];
    let dtsi = request.dir.join(request.target.dtsi_name());
    write_file(&dtsi, &generated.dtsi)?;
    info!("SoC device tree source stored in {}", dtsi.display());
    written.push(dtsi);

    let dts = request
        .dir
        .join(request.target.dts_name(request.zephyr_board.as_deref()));
    write_file(&dts, &generated.dts)?;
    info!("Board device tree source stored in {}", dts.display());
    written.push(dts);

    if request.json {
        let json = request.dir.join("sapphire.json");
        write_file(&json, &generated.to_json()?)?;
        info!("Device tree JSON stored in {}", json.display());
        written.push(json);
    }
    Ok(written)
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)
            .with_context(|| format!("failed to remove output directory {}", dir.display()))?;
    }
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
