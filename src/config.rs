use anyhow::{Context, Result};
use std::collections::{HashMap, VecDeque};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::TempoBatchError;

/// Speed applied to any folder with no explicit or inherited entry.
pub const DEFAULT_SPEED: f64 = 2.0;

/// Supplies one playback speed per prompted folder.
///
/// The batch driver never touches stdin directly; it asks a `SpeedSource`
/// so tests can supply canned values instead of interactive input.
pub trait SpeedSource {
    /// Return the speed for the folder described by `label`.
    fn speed_for(&mut self, label: &str) -> Result<f64>;
}

/// Interactive source that prompts on stdout and reads one line from stdin.
pub struct InteractiveSpeeds;

impl SpeedSource for InteractiveSpeeds {
    fn speed_for(&mut self, label: &str) -> Result<f64> {
        print!("Enter playback speed for {} (e.g., 1.5, 2.0): ", label);
        io::stdout().flush().context("failed to flush stdout")?;

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("failed to read speed from stdin")?;

        Ok(parse_speed(label, &line)?)
    }
}

/// Parse a raw prompt answer as a speed multiplier.
pub fn parse_speed(label: &str, raw: &str) -> std::result::Result<f64, TempoBatchError> {
    let trimmed = raw.trim();
    trimmed.parse::<f64>().map_err(|_| TempoBatchError::InvalidSpeed {
        folder: label.to_string(),
        input: trimmed.to_string(),
    })
}

/// Canned source yielding a fixed sequence of speeds, in prompt order.
pub struct FixedSpeeds {
    speeds: VecDeque<f64>,
}

impl FixedSpeeds {
    pub fn new(speeds: impl IntoIterator<Item = f64>) -> Self {
        Self {
            speeds: speeds.into_iter().collect(),
        }
    }
}

impl SpeedSource for FixedSpeeds {
    fn speed_for(&mut self, label: &str) -> Result<f64> {
        self.speeds
            .pop_front()
            .with_context(|| format!("no speed supplied for {}", label))
    }
}

/// Immutable mapping from folder to speed multiplier, built once before
/// any file is processed.
#[derive(Debug, Clone)]
pub struct SpeedMap {
    root: PathBuf,
    speeds: HashMap<PathBuf, f64>,
}

impl SpeedMap {
    /// Collect one speed for the input root and one for each immediate
    /// subfolder. Deeper folders are never prompted; they inherit through
    /// [`SpeedMap::group_key`] at grouping time.
    pub fn resolve(root: &Path, source: &mut dyn SpeedSource) -> Result<Self> {
        let root_name = folder_name(root);

        let mut subfolders: Vec<PathBuf> = std::fs::read_dir(root)
            .with_context(|| format!("failed to list input directory {}", root.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        subfolders.sort();

        if !subfolders.is_empty() {
            println!("\nSetting playback speeds for each subfolder:");
            println!("-------------------------------------------");
        }

        let mut speeds = HashMap::new();
        let root_speed = source.speed_for(&format!("main folder '{}'", root_name))?;
        speeds.insert(root.to_path_buf(), root_speed);

        for folder in &subfolders {
            let speed = source.speed_for(&format!("subfolder '{}'", folder_name(folder)))?;
            speeds.insert(folder.clone(), speed);
        }

        debug!("collected speeds for {} folder(s)", speeds.len());
        Ok(Self {
            root: root.to_path_buf(),
            speeds,
        })
    }

    /// Build a map from already-known speeds without prompting.
    pub fn with_speeds(root: &Path, speeds: HashMap<PathBuf, f64>) -> Self {
        Self {
            root: root.to_path_buf(),
            speeds,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The nearest ancestor of `dir` (including `dir` itself) with a
    /// configured speed, falling back to the input root. The first match
    /// walking upward wins, so a folder never belongs to two keys.
    pub fn group_key(&self, dir: &Path) -> &Path {
        let mut current = dir;
        loop {
            if let Some((key, _)) = self.speeds.get_key_value(current) {
                return key;
            }
            if current == self.root {
                return &self.root;
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => return &self.root,
            }
        }
    }

    /// Resolved speed for files directly inside `dir`.
    pub fn speed_for(&self, dir: &Path) -> f64 {
        self.speeds
            .get(self.group_key(dir))
            .copied()
            .unwrap_or(DEFAULT_SPEED)
    }
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
