mod build;
mod cli;
mod constants;
mod flash;
mod rtt;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use constants::app_elf;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build { build } => {
            build::build_firmware(build)?;
            println!("Build complete!");
        }
        Commands::Flash { build, force, softdevice } => {
            flash::flash_firmware(build, *force, softdevice.as_deref())?;
        }
        Commands::Run { build } => {
            flash::flash_firmware(build, false, None)?;

            println!("Attaching RTT...");
            rtt::attach(&app_elf(build.release))?;
        }
        Commands::Attach { release } => {
            rtt::attach(&app_elf(*release))?;
        }
        Commands::Test => build::test_host()?,
    }

    Ok(())
}
