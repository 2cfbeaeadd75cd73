//! resfs command line tool
//!
//! Builds the global file manager from the resfs configuration (optionally
//! with a gadget package mounted as the default manager) and runs a single
//! file operation against it.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use resfs_shared::{init_logging, setup_global_file_manager, MountConfig, ResfsConfig, VERSION};

mod commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Gadget package (directory or .gg archive) served as the default manager
    #[arg(short, long)]
    package: Option<PathBuf>,

    /// Locale for localized lookups, e.g. zh-CN
    #[arg(short, long)]
    locale: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List files under a directory
    Ls {
        #[arg(default_value = "")]
        dir: String,
    },
    /// Print a file to stdout
    Cat { file: String },
    /// Store a host file
    Put {
        file: String,
        source: PathBuf,
        /// Replace an existing file
        #[arg(long)]
        overwrite: bool,
    },
    /// Remove a file
    Rm { file: String },
    /// Extract a file onto disk and print its path
    Extract {
        file: String,
        /// Target path; a scratch directory is used when omitted
        #[arg(long)]
        into: Option<PathBuf>,
    },
    /// Show size, timestamp and location of a file
    Stat { file: String },
    /// Show registered prefixes
    Mounts,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        ResfsConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(locale) = args.locale {
        config.locale = Some(locale);
    }
    if args.debug {
        config.logging.level = "debug".to_string();
    }
    init_logging(&config.logging);
    info!("Starting resfs v{}", VERSION);

    if let Some(package) = args.package {
        debug!("Serving package {:?} as the default manager", package);
        config.mounts.retain(|mount| !mount.prefix.is_empty());
        config.mounts.push(MountConfig {
            prefix: String::new(),
            path: package,
            create: false,
            localized: true,
        });
    }
    config.validate().context("Invalid configuration")?;

    let mut wrapper =
        setup_global_file_manager(&config).context("Failed to set up file managers")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Ls { dir } => commands::list(&mut wrapper, &dir, &mut out)?,
        Command::Cat { file } => commands::cat(&mut wrapper, &file, &mut out)?,
        Command::Put {
            file,
            source,
            overwrite,
        } => commands::put(&mut wrapper, &file, &source, overwrite)?,
        Command::Rm { file } => commands::remove(&mut wrapper, &file)?,
        Command::Extract { file, into } => {
            commands::extract(&mut wrapper, &file, into.as_deref(), &mut out)?
        }
        Command::Stat { file } => commands::stat(&mut wrapper, &file, &mut out)?,
        Command::Mounts => commands::mounts(&wrapper, &mut out)?,
    }
    out.flush()?;
    Ok(())
}
