//! scpflash - SCP boot flash utility
//!
//! Reads, writes and erases the boot flash behind the SCP firmware service.
//!
//! # Architecture
//!
//! Every command talks to the flash through the [`ScpControl`] request
//! surface, wrapped in the chunking client library:
//! - **Device node** (`/dev/scp`) - requests cross into the kernel driver
//!   as ioctls
//! - **Emulated device** (`--emulate`) - an in-process device session over
//!   an in-memory flash, for trying the tool without hardware
//!
//! so the read, write and erase workflows are the same for both.

mod cli;
mod commands;
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use commands::Region;
use error::ToolError;
use scpflash_core::control::ScpControl;
use scpflash_lib::{ScpLib, ScpNode};

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match (cli.verbose, cli.quiet) {
        (0, false) => {} // default (info)
        (0, true) => log::set_max_level(log::LevelFilter::Warn),
        (1, _) => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), ToolError> {
    if let Commands::Partitions = cli.command {
        commands::partitions::run_partitions();
        return Ok(());
    }

    #[cfg(feature = "emulator")]
    let emulated: scpflash_driver::ScpDevice<scpflash_emulator::EmulatedMonitor>;

    let control: Box<dyn ScpControl + '_> = if cli.emulate {
        #[cfg(feature = "emulator")]
        {
            log::info!("Using emulated flash");
            emulated =
                scpflash_driver::ScpDevice::new(scpflash_emulator::EmulatedMonitor::new_default());
            Box::new(emulated.acquire()?)
        }
        #[cfg(not(feature = "emulator"))]
        {
            return Err(ToolError::EmulationUnavailable);
        }
    } else {
        log::debug!("Opening {}", cli.device.display());
        Box::new(ScpNode::open_path(&cli.device)?)
    };

    let mut lib = ScpLib::new(control);
    let geometry = lib.flash_info().map_err(|e| {
        log::error!("Failed to retrieve flash information");
        e
    })?;
    log::info!(
        "Flash: {} sectors of {} bytes ({} bytes usable)",
        geometry.sector_count,
        geometry.sector_size,
        geometry.total_size
    );

    let quiet = cli.quiet;
    match cli.command {
        Commands::Read { file, region } => {
            commands::read::run_read(&mut lib, &file, Region::resolve(&region)?, quiet)
        }
        Commands::Write {
            file,
            region,
            skip,
            no_verify,
            yes,
        } => commands::write::run_write(
            &mut lib,
            &file,
            Region::resolve(&region)?,
            skip,
            !no_verify,
            yes,
            quiet,
        ),
        Commands::Erase { region, yes } => {
            commands::erase::run_erase(&mut lib, Region::resolve(&region)?, yes, quiet)
        }
        Commands::Version => commands::version::run_version(&mut lib),
        Commands::Partitions => Ok(()),
    }
}
