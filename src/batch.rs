use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::SpeedMap;
use crate::transcode::{
    CodecHint, EngineRunner, TranscodeRequest, TranscodeResult, Transcoder,
};

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Converted on the given 1-based fallback tier.
    Converted { tier: usize },
    /// The destination already existed; no engine invocation was made.
    SkippedExists,
    /// Every fallback tier failed.
    Failed,
}

/// Record of one file's trip through the batch. Transient; nothing is
/// persisted across runs.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub speed: f64,
    pub outcome: Outcome,
}

/// Aggregated results for a whole run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<FileRecord>,
}

impl BatchReport {
    pub fn converted(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Converted { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::SkippedExists))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed))
    }

    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

/// Creation date of `path` as `YYYY-MM-DD`, falling back to the
/// modification time on filesystems without birth times.
pub fn creation_date(path: &Path) -> Result<String> {
    let metadata =
        fs::metadata(path).with_context(|| format!("failed to stat {}", path.display()))?;
    let stamp = metadata
        .created()
        .or_else(|_| metadata.modified())
        .with_context(|| format!("no timestamp available for {}", path.display()))?;

    Ok(DateTime::<Local>::from(stamp).format("%Y-%m-%d").to_string())
}

/// Destination path for `file`: the input-relative subdirectory mirrored
/// under `output_root`, with the filename prefixed by the creation date.
pub fn destination_for(file: &Path, input_root: &Path, output_root: &Path) -> Result<PathBuf> {
    let relative = file
        .strip_prefix(input_root)
        .with_context(|| format!("{} is outside the input directory", file.display()))?;
    let name = file
        .file_name()
        .with_context(|| format!("{} has no file name", file.display()))?;
    let date = creation_date(file)?;

    let mut dest = output_root.join(relative.parent().unwrap_or_else(|| Path::new("")));
    dest.push(format!("{}-{}", date, name.to_string_lossy()));
    Ok(dest)
}

/// Process every grouped file sequentially. Individual failures are
/// recorded and logged; only the invalid-speed and unreadable-input
/// startup errors abort a run, never a file.
pub fn run_batch<R: EngineRunner>(
    speeds: &SpeedMap,
    groups: &BTreeMap<PathBuf, Vec<PathBuf>>,
    output_root: &Path,
    runner: R,
) -> Result<BatchReport> {
    fs::create_dir_all(output_root)
        .with_context(|| format!("failed to create output directory {}", output_root.display()))?;

    let input_root = speeds.root();
    let transcoder = Transcoder::new(runner);
    let mut report = BatchReport::default();

    for (folder, files) in groups {
        let speed = speeds.speed_for(folder);
        info!(
            "processing {} file(s) in '{}' with speed {}x",
            files.len(),
            group_label(folder, input_root),
            speed
        );

        for file in files {
            let record = process_file(&transcoder, file, input_root, output_root, speed);
            report.records.push(record);
        }
    }

    Ok(report)
}

fn process_file<R: EngineRunner>(
    transcoder: &Transcoder<R>,
    file: &Path,
    input_root: &Path,
    output_root: &Path,
    speed: f64,
) -> FileRecord {
    let destination = match destination_for(file, input_root, output_root) {
        Ok(dest) => dest,
        Err(e) => {
            error!("cannot resolve destination for {}: {:#}", file.display(), e);
            return FileRecord {
                source: file.to_path_buf(),
                destination: PathBuf::new(),
                speed,
                outcome: Outcome::Failed,
            };
        }
    };

    let mut record = FileRecord {
        source: file.to_path_buf(),
        destination: destination.clone(),
        speed,
        outcome: Outcome::Failed,
    };

    // Skip-if-exists is the sole resume mechanism: re-running the batch
    // over the same directories converts nothing new.
    if destination.exists() {
        info!("skipping {} (output already exists)", file.display());
        record.outcome = Outcome::SkippedExists;
        return record;
    }

    if let Some(parent) = destination.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            error!(
                "failed to create output directory {}: {}",
                parent.display(),
                e
            );
            return record;
        }
    }

    info!(
        "processing: {} -> {} (speed: {}x)",
        file.display(),
        destination.display(),
        speed
    );

    let request = TranscodeRequest {
        input: file.to_path_buf(),
        output: destination,
        speed,
        codec: CodecHint::from_path(file),
    };

    record.outcome = match transcoder.transcode(&request) {
        TranscodeResult::Converted { tier } => {
            if tier == 1 {
                info!("successfully processed: {}", request.output.display());
            } else {
                info!(
                    "successfully processed with fallback tier {}: {}",
                    tier,
                    request.output.display()
                );
            }
            Outcome::Converted { tier }
        }
        TranscodeResult::Failed { .. } => {
            error!("all engine variants failed for {}", file.display());
            Outcome::Failed
        }
    };

    record
}

fn group_label(folder: &Path, input_root: &Path) -> String {
    match folder.strip_prefix(input_root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => "main folder".to_string(),
    }
}
