use anyhow::{ensure, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tempo_batch::{
    batch::run_batch,
    config::{InteractiveSpeeds, SpeedMap},
    discover::{discover_audio_files, group_by_speed_folder},
    transcode::FfmpegRunner,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tempo-batch")]
#[command(about = "Batch-convert audio files to a faster tempo with per-folder speeds")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Input directory containing audio files
    pub input_dir: PathBuf,

    /// Output directory for processed files
    pub output_dir: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Verbosity comes from RUST_LOG; the CLI stays two positional arguments.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    ensure!(
        args.input_dir.is_dir(),
        "input directory {} does not exist or is not a directory",
        args.input_dir.display()
    );

    let mut prompts = InteractiveSpeeds;
    let speeds = SpeedMap::resolve(&args.input_dir, &mut prompts)
        .context("failed to collect folder speeds")?;

    let files = discover_audio_files(&args.input_dir);
    if files.is_empty() {
        warn!(
            "no .mp3 or .m4a files found under {}",
            args.input_dir.display()
        );
    } else {
        info!(
            "found {} audio file(s) under {}",
            files.len(),
            args.input_dir.display()
        );
    }

    let groups = group_by_speed_folder(files, &speeds);
    let report = run_batch(&speeds, &groups, &args.output_dir, FfmpegRunner)?;

    // Per-file failures are reported above; they never change the exit code.
    info!(
        "done: {} converted, {} skipped, {} failed",
        report.converted(),
        report.skipped(),
        report.failed()
    );

    Ok(())
}
