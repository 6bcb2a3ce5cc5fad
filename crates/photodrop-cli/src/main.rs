use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use photodrop_core::report::{ErrorResponse, UploadResponse};
use photodrop_core::staging::{self, IntakeLimits};
use photodrop_core::{
    CancellationToken, ExifDateResolver, FileOutcome, IngestControl, IngestOptions, SharedConfig,
};

#[derive(Parser)]
#[command(name = "photodrop", version, about = "File phone uploads into capture-date folders")]
struct Cli {
    /// Configuration file holding the upload root
    #[arg(
        long,
        global = true,
        env = "PHOTODROP_CONFIG",
        default_value = photodrop_core::config::CONFIG_FILENAME
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload files and file them by capture date
    Ingest {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Device name appended to the date folder (e.g. 2024-03-05-PhoneA)
        #[arg(short, long)]
        prefix: Option<String>,

        /// Print the upload response as JSON
        #[arg(long)]
        json: bool,

        /// Also write the upload response to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Show or change the upload root
    Root {
        #[command(subcommand)]
        action: Option<RootAction>,
    },
    /// Count files per date folder
    Stats {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RootAction {
    /// Point uploads at an existing directory
    Set { path: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photodrop=info,photodrop_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = SharedConfig::open(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::Ingest {
            files,
            prefix,
            json,
            report,
        } => run_ingest(&config, files, prefix, json, report),
        Command::Root { action: None } => {
            let root = config.snapshot_root();
            println!("{} (exists: {})", root.display(), root.is_dir());
            Ok(())
        }
        Command::Root {
            action: Some(RootAction::Set { path }),
        } => {
            let root = config.set_upload_root(&path)?;
            println!("Upload path updated successfully: {}", root.display());
            Ok(())
        }
        Command::Stats { json } => {
            let stats = photodrop_core::stats::collect_stats(&config.snapshot_root())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                for folder in &stats {
                    println!("{:<32} {:>6}", folder.date, folder.file_count);
                }
            }
            Ok(())
        }
    }
}

fn run_ingest(
    config: &SharedConfig,
    sources: Vec<PathBuf>,
    prefix: Option<String>,
    json: bool,
    report: Option<PathBuf>,
) -> anyhow::Result<()> {
    let t_total = std::time::Instant::now();
    // Read once: a concurrent `root set` must not split this batch.
    let root = config.snapshot_root();

    let staging_dir = staging::staging_dir(&root);
    let files = match staging::stage_files(&sources, &staging_dir, &IntakeLimits::default()) {
        Ok(files) => files,
        Err(e) if json && e.is_client_error() => {
            println!("{}", serde_json::to_string_pretty(&ErrorResponse::new(&e))?);
            std::process::exit(2);
        }
        Err(e) => return Err(e).context("upload rejected"),
    };

    let token = CancellationToken::new();
    {
        let token = token.clone();
        ctrlc::set_handler(move || {
            eprintln!("\nCancelling after the current file...");
            token.cancel();
        })?;
    }

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("[{bar:30}] {pos}/{len} {msg}")?.progress_chars("=> "),
    );
    let progress = {
        let bar = bar.clone();
        move |stage: &str, current: u64, _total: u64, message: &str| {
            if stage == "file" {
                bar.set_position(current + 1);
                bar.set_message(message.to_string());
            }
        }
    };

    let options = IngestOptions {
        device_prefix: prefix,
    };
    let control = IngestControl::new().with_cancel_token(token);
    let batch = photodrop_core::ingest_with(
        &ExifDateResolver,
        &files,
        &root,
        &options,
        &control,
        &progress,
    )?;
    bar.finish_and_clear();

    if let Some(path) = &report {
        photodrop_core::report::write_report(&batch, path)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&UploadResponse::from(&batch))?);
    } else {
        for result in &batch.results {
            match &result.outcome {
                FileOutcome::Filed {
                    destination_folder, ..
                } => println!("{} -> {}/", result.filename, destination_folder),
                FileOutcome::Failed { error_message } => {
                    println!("{} FAILED: {}", result.filename, error_message)
                }
            }
        }
        eprintln!(
            "Done! {} files processed, {} filed, {} failed, {} live photo(s) ({:.2}s)",
            batch.files_processed,
            batch.succeeded(),
            batch.failed(),
            batch.paired_group_count,
            t_total.elapsed().as_secs_f64()
        );
    }

    Ok(())
}
