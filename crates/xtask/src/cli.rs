use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that builds the firmware.
#[derive(Args, Clone)]
pub struct BuildArgs {
    /// Extra cargo features, comma separated
    #[arg(long)]
    pub features: Option<String>,

    #[arg(long)]
    pub release: bool,

    /// Serve a static value instead of streaming samples
    #[arg(long)]
    pub read_variant: bool,
}

impl BuildArgs {
    /// Feature list passed to cargo, if any.
    pub fn feature_list(&self) -> Option<String> {
        let mut features: Vec<&str> = self
            .features
            .as_deref()
            .map(|f| f.split(',').filter(|f| !f.is_empty()).collect())
            .unwrap_or_default();
        if self.read_variant {
            features.push("read-variant");
        }
        (!features.is_empty()).then(|| features.join(","))
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the firmware
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build and flash the firmware
    Flash {
        #[command(flatten)]
        build: BuildArgs,

        /// Erase the whole chip first
        #[arg(long)]
        force: bool,

        /// SoftDevice hex to program before the application
        #[arg(long)]
        softdevice: Option<PathBuf>,
    },
    /// Build, flash, and run with RTT logging
    Run {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Attach to target and show RTT logs
    Attach {
        #[arg(long)]
        release: bool,
    },
    /// Run the host test suite
    Test,
}
