//! Tempo Batch - batch audio speed-up tool
//!
//! This crate batch-converts audio files to a faster playback speed while
//! preserving pitch, by driving ffmpeg as an external process. It features:
//!
//! - Per-folder speed settings collected once up front (interactive or canned)
//! - Nearest-ancestor speed inheritance for nested folders
//! - Date-prefixed output filenames mirroring the input directory layout
//! - A three-tier command fallback ladder when the engine rejects a file
//! - Skip-if-output-exists as the sole resume mechanism
//!
//! # Example
//!
//! ```no_run
//! use tempo_batch::{
//!     batch::run_batch,
//!     config::{FixedSpeeds, SpeedMap},
//!     discover::{discover_audio_files, group_by_speed_folder},
//!     transcode::FfmpegRunner,
//! };
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let input = Path::new("recordings");
//!
//!     // One speed for the root folder, one per immediate subfolder.
//!     let mut source = FixedSpeeds::new([1.5, 2.0]);
//!     let speeds = SpeedMap::resolve(input, &mut source)?;
//!
//!     let files = discover_audio_files(input);
//!     let groups = group_by_speed_folder(files, &speeds);
//!     let report = run_batch(&speeds, &groups, Path::new("converted"), FfmpegRunner)?;
//!
//!     println!("{} converted, {} skipped", report.converted(), report.skipped());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod config;
pub mod discover;
pub mod transcode;

// Re-export commonly used types for convenience
pub use batch::{BatchReport, FileRecord, Outcome};
pub use config::{FixedSpeeds, InteractiveSpeeds, SpeedMap, SpeedSource, DEFAULT_SPEED};
pub use discover::{discover_audio_files, group_by_speed_folder, AUDIO_EXTENSIONS};
pub use transcode::{
    CodecHint, EngineCommand, EngineRunner, FfmpegRunner, TranscodeRequest, Transcoder,
};

// Error types
use thiserror::Error;

/// Errors that can occur in the tempo-batch pipeline
#[derive(Error, Debug)]
pub enum TempoBatchError {
    /// The speed entered for a folder did not parse as a number
    #[error("invalid speed {input:?} for {folder}: expected a number like 1.5 or 2.0")]
    InvalidSpeed { folder: String, input: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
