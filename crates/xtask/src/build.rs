use crate::cli::BuildArgs;
use crate::constants::{APP_MANIFEST, TARGET};
use anyhow::{Context, Result};
use std::process::Command;

pub fn build_firmware(args: &BuildArgs) -> Result<()> {
    println!("Building application...");
    let mut cargo_build = Command::new("cargo");
    cargo_build
        .arg("build")
        .arg("--no-default-features")
        .arg("--manifest-path")
        .arg(APP_MANIFEST)
        .arg("--target")
        .arg(TARGET);

    if args.release {
        cargo_build.arg("--release");
    }

    if let Some(features) = args.feature_list() {
        cargo_build.args(["--features", &features]);
    }

    let status = cargo_build
        .status()
        .with_context(|| format!("Failed to build {}", APP_MANIFEST))?;

    if !status.success() {
        anyhow::bail!("Build failed for {}", APP_MANIFEST);
    }

    Ok(())
}

pub fn test_host() -> Result<()> {
    let status = Command::new("cargo")
        .args(["test", "-p", "sampler-core"])
        .status()
        .context("Failed to run tests")?;

    if !status.success() {
        anyhow::bail!("Tests failed");
    }

    Ok(())
}
