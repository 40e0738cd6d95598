mod config;
mod controller;
mod flash_args;
mod runner;
mod sdkconfig;
mod table;
mod util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use partition_common::{Bank, Layout};

use crate::config::{parse_flash_size, BuildArgs, LayoutArgs, Session, MIB};
use crate::controller::{Controller, State};
use crate::runner::CommandRunner;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    /// Log every line of the build output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Args,
}

#[derive(Subcommand, Debug)]
enum Args {
    /// Build the firmware, resizing the app partition to fit it
    Build(BuildArgs),
    /// Print or write the partition table without building
    Plan {
        #[command(flatten)]
        layout: LayoutArgs,

        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Validate a partition table left by an earlier build
    Check {
        path: Option<PathBuf>,

        /// Find the table through the build's sdkconfig instead
        #[arg(long, conflicts_with = "path")]
        sdkconfig: Option<PathBuf>,

        #[arg(long, value_parser = parse_flash_size, default_value = "4")]
        flash_size: u32,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        true => log::LevelFilter::Debug,
        false => log::LevelFilter::Info,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .init();

    let code = match run(cli.command).await {
        Ok(()) => 0,
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(args: Args) -> Result<(), util::Error> {
    match args {
        Args::Build(args) => build(args).await,
        Args::Plan { layout, out } => {
            let app_size = layout
                .app_size()?
                .unwrap_or(partition_common::layout::DEFAULT_APP_SIZE);
            let plan = Layout::new(
                app_size,
                layout.flash_size_mb()? * MIB,
                Bank::from_ota(layout.ota),
            )?;

            match out {
                Some(path) => {
                    table::save(&path, &plan).await?;
                    log::info!("partition table written to {}", path.display());
                }
                None => print!("{}", plan),
            }
            Ok(())
        }
        Args::Check {
            path,
            sdkconfig,
            flash_size,
        } => {
            let path = match (path, sdkconfig) {
                (Some(path), _) => path,
                (None, Some(sdkconfig)) => {
                    let text = tokio::fs::read_to_string(&sdkconfig).await?;
                    sdkconfig::table_filename(&text).map(PathBuf::from).ok_or_else(|| {
                        util::Error::Other(format!(
                            "{} names no partition table",
                            sdkconfig.display()
                        ))
                    })?
                }
                (None, None) => {
                    return Err(util::Error::Other(
                        "pass a table path or --sdkconfig".to_string(),
                    ))
                }
            };

            let layout = table::load(&path, flash_size * MIB).await?;
            for r in layout.regions() {
                let (kind, sub) = r.subkind().codes();
                println!("{:<10} {:#04x}/{:#04x} {:#010x} {:#010x}", r.name(), kind, sub, r.offset(), r.size());
            }
            println!(
                "{:?} bank, app partition {:#x} bytes, {:#x} of {:#x} bytes used",
                layout.bank(),
                layout.app_size(),
                layout.regions().last().map(|r| r.end()).unwrap_or_default(),
                layout.capacity()
            );
            Ok(())
        }
    }
}

async fn build(args: BuildArgs) -> Result<(), util::Error> {
    let session = Session::from_args(&args)?;
    let runner = CommandRunner::new(&args.command)?;

    log::info!(
        "{} with {}MB flash, {:?} bank, app partition {}",
        session.board,
        session.flash_size_mb,
        session.bank,
        match session.app_size {
            Some(size) => format!("pinned at {:#x}", size),
            None => "sized from the build".to_string(),
        }
    );

    let mut controller = Controller::new(session, runner)?;
    log::debug!("initial partition table:\n{}", controller.layout());

    let report = match controller.run().await {
        Ok(report) => report,
        Err(e) => {
            if controller.state() == State::Done && controller.passes() > 1 {
                log::error!("giving up after the resized rebuild");
            }
            return Err(e);
        }
    };

    println!(
        "app partition {:#x} bytes, binary {:#x} bytes, {} build pass(es)",
        report.layout.app_size(),
        report.binary_size,
        report.passes
    );
    if let Some(resize) = report.resize {
        log::info!("partition table resized: {:?}", resize);
    }
    if let Some(flash) = report.flash {
        if let Some(chip) = &flash.chip {
            log::info!("flash images for {}:", chip);
        }
        for image in flash.images {
            println!("{:#x} {}", image.offset, image.path.display());
        }
    }

    Ok(())
}
