use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use omaha_payload::parsing::EntryKind;
use omaha_payload::{extract_resource, ExtractOptions, ExtractReport, TarOutput};
use tracing_subscriber::{filter::LevelFilter, util::SubscriberInitExt, EnvFilter};

/// Extract the files packed into an installer payload resource.
#[derive(Parser)]
#[command(name = "omaha-extract", author, version, about, long_about = None)]
struct Cli {
    /// Raw payload resource (LZMA + BCJ2 + tar)
    resource: PathBuf,

    /// Directory to extract into
    #[arg(default_value = "extracted")]
    output_dir: PathBuf,

    /// List the archive entries instead of extracting them
    #[arg(short, long)]
    list: bool,

    /// Keep the decoded tar image as `_payload.tar` in the output directory
    #[arg(long)]
    keep_tar: bool,

    /// Do not search for a tar header when the image does not start with one
    #[arg(long)]
    no_scan: bool,

    /// Show per-entry and header details
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn options(&self) -> ExtractOptions {
        ExtractOptions {
            output_dir: self.output_dir.clone(),
            keep_tar_image: self.keep_tar,
            scan_for_magic: !self.no_scan,
            list_only: self.list,
        }
    }

    fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::DEBUG
        } else if self.quiet {
            LevelFilter::WARN
        } else {
            LevelFilter::INFO
        }
    }
}

fn init_logging(level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .finish()
        .try_init()?;
    Ok(())
}

fn print_listing(report: &ExtractReport) {
    if let TarOutput::Listed { entries, .. } = &report.tar {
        for entry in entries {
            match entry.kind {
                EntryKind::Directory => println!("{:>12}  {}", "<dir>", entry.path),
                EntryKind::File => println!("{:>12}  {}", entry.size, entry.path),
            }
        }
        println!("{} entries", entries.len());
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.level()) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match extract_resource(&cli.resource, &cli.options()) {
        Ok(report) => {
            print_listing(&report);
            let stop = report.tar.stop_reason();
            if stop.is_clean() {
                tracing::info!("done ({})", stop);
            } else {
                tracing::warn!("done with errors ({})", stop);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
