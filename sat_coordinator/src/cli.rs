//! command-line entry point (§10 ambient stack): the config path, an optional
//! log-level override, and a satellite-id override for running several nodes
//! from one shared config during local testing.

use std::path::PathBuf;

use clap::Parser;

use crate::task::SatId;

#[derive(Parser, Debug)]
#[command(version, about = "on-board coordination core for the satellite constellation")]
pub struct Cli {
    /// path to the cluster config file (RON, or JSON if the extension is `.json`)
    #[arg(long)]
    pub config: PathBuf,

    /// overrides `RUST_LOG` for this process
    #[arg(long)]
    pub log_level: Option<String>,

    /// overrides the config file's notion of "which satellite am I" - useful for
    /// running several nodes against one shared cluster config in local testing
    #[arg(long)]
    pub satellite_id: Option<SatId>,
}
