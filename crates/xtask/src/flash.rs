use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

use crate::cli::BuildArgs;
use crate::constants::{app_elf, CHIP};

pub fn flash_firmware(
    args: &BuildArgs,
    force: bool,
    softdevice: Option<&Path>,
) -> Result<()> {
    // First build the firmware
    crate::build::build_firmware(args)?;

    if force {
        println!("Erasing chip...");
        let mut cmd = Command::new("probe-rs");
        cmd.args(["erase", "--chip", CHIP, "--allow-erase-all"]);
        let status = cmd.status().context("Failed to erase chip")?;
        if !status.success() {
            anyhow::bail!("Failed to erase chip");
        }
    }

    if let Some(hex) = softdevice {
        println!("Flashing SoftDevice {}...", hex.display());
        let mut cmd = Command::new("probe-rs");
        cmd.args(["download", "--chip", CHIP, "--binary-format", "hex"])
            .arg(hex)
            .args(["--preverify", "--restore-unwritten"]);

        let status = cmd.status().context("Failed to flash SoftDevice")?;
        if !status.success() {
            anyhow::bail!("Failed to flash SoftDevice");
        }
    }

    println!("Checking/Flashing App...");
    let app_path = app_elf(args.release);
    let mut cmd = Command::new("probe-rs");
    cmd.args([
        "download",
        "--chip",
        CHIP,
        &app_path,
        "--preverify",
        "--restore-unwritten",
    ]);

    let status = cmd.status().context("Failed to flash application")?;
    if !status.success() {
        anyhow::bail!("Failed to flash application");
    }

    Ok(())
}
