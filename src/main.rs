mod device;
mod inspect;
mod layout;
mod report;

use std::{io, path::PathBuf, process::ExitCode};

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Dump the MBR partition table and drive identity of a block device.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Block device (or disk image) to inspect, e.g. /dev/sda
    device: PathBuf,
    /// Skip the HDIO_GET_IDENTITY query, for plain image files
    #[arg(long)]
    no_identity: bool,
    /// Print the disk signature and debug logs
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let opts = inspect::Options {
        skip_identity: args.no_identity,
        verbose: args.verbose,
    };
    let stdout = io::stdout();
    match inspect::inspect(&args.device, &opts, &mut stdout.lock()) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            debug!(state = ?e.state(), "inspection aborted");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
