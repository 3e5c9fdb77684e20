use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// External engine executable invoked for every conversion.
pub const ENGINE_PROGRAM: &str = "ffmpeg";

/// Which encoder family a source file should be re-encoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecHint {
    Mp3,
    Aac,
}

impl CodecHint {
    /// Derive the codec from the source file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("mp3") => CodecHint::Mp3,
            _ => CodecHint::Aac,
        }
    }
}

/// One file to convert: where it is, where it goes, how fast.
#[derive(Debug, Clone)]
pub struct TranscodeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub speed: f64,
    pub codec: CodecHint,
}

/// A single invocation of the external engine.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub program: &'static str,
    pub args: Vec<OsString>,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// The three command variants tried in order, each strictly simpler than
/// the one before it.
///
/// Tier 1 selects the audio stream explicitly, sets the target codec and
/// quality, and copies source metadata. Tier 2 drops stream selection and
/// metadata but keeps the encoder settings. Tier 3 keeps only the tempo
/// filter and lets the engine pick its defaults, so its output container
/// may not match the extension.
pub fn fallback_tiers(req: &TranscodeRequest) -> Vec<EngineCommand> {
    let filter = format!("atempo={}", req.speed);

    let full_codec: &[&str] = match req.codec {
        CodecHint::Mp3 => &[
            "-c:a",
            "libmp3lame",
            "-q:a",
            "2",
            "-map_metadata",
            "0",
            "-id3v2_version",
            "3",
        ],
        CodecHint::Aac => &["-c:a", "aac", "-b:a", "192k", "-map_metadata", "0"],
    };
    let simple_codec: &[&str] = match req.codec {
        CodecHint::Mp3 => &["-c:a", "libmp3lame", "-q:a", "2"],
        CodecHint::Aac => &["-c:a", "aac", "-b:a", "192k"],
    };

    let build = |stream_flags: &[&str], codec_flags: &[&str]| {
        let mut args: Vec<OsString> = vec!["-i".into(), req.input.as_os_str().to_os_string()];
        args.extend(stream_flags.iter().copied().map(OsString::from));
        args.push("-filter:a".into());
        args.push(filter.clone().into());
        args.extend(codec_flags.iter().copied().map(OsString::from));
        args.push(req.output.as_os_str().to_os_string());
        EngineCommand {
            program: ENGINE_PROGRAM,
            args,
        }
    };

    vec![
        build(&["-map", "0:a"], full_codec),
        build(&["-vn"], simple_codec),
        build(&["-vn"], &[]),
    ]
}

/// Result of one engine invocation.
#[derive(Debug)]
pub enum RunStatus {
    Success,
    Failure { diagnostics: String },
}

/// Narrow seam over the external engine so tests can run without ffmpeg.
pub trait EngineRunner {
    fn run(&self, cmd: &EngineCommand) -> RunStatus;
}

impl<R: EngineRunner + ?Sized> EngineRunner for &R {
    fn run(&self, cmd: &EngineCommand) -> RunStatus {
        (**self).run(cmd)
    }
}

/// Runs the real engine, blocking until it exits with output fully buffered.
pub struct FfmpegRunner;

impl EngineRunner for FfmpegRunner {
    fn run(&self, cmd: &EngineCommand) -> RunStatus {
        match Command::new(cmd.program).args(&cmd.args).output() {
            Ok(output) if output.status.success() => RunStatus::Success,
            Ok(output) => RunStatus::Failure {
                diagnostics: decode_diagnostics(&output.stderr),
            },
            Err(e) => RunStatus::Failure {
                diagnostics: format!("failed to run {}: {}", cmd.program, e),
            },
        }
    }
}

/// Decode engine stderr for reporting. UTF-8 when valid, otherwise Latin-1
/// so every byte keeps a printable representation. Never fails.
pub fn decode_diagnostics(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// What happened to one conversion after the fallback ladder ran.
#[derive(Debug)]
pub enum TranscodeResult {
    /// Converted on the given 1-based tier.
    Converted { tier: usize },
    /// Every tier failed; diagnostics collected per attempt.
    Failed { attempts: Vec<String> },
}

/// Drives the fallback ladder for one file at a time.
pub struct Transcoder<R: EngineRunner> {
    runner: R,
}

impl<R: EngineRunner> Transcoder<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Try each fallback tier in order; the first success wins. A failure
    /// on the last tier marks the file failed without aborting the batch.
    pub fn transcode(&self, req: &TranscodeRequest) -> TranscodeResult {
        let tiers = fallback_tiers(req);
        let total = tiers.len();
        let mut attempts = Vec::new();

        for (idx, cmd) in tiers.into_iter().enumerate() {
            let tier = idx + 1;
            debug!("tier {}/{}: {}", tier, total, cmd);

            match self.runner.run(&cmd) {
                RunStatus::Success => return TranscodeResult::Converted { tier },
                RunStatus::Failure { diagnostics } => {
                    warn!(
                        "engine failed (tier {}/{}) for {}: {}",
                        tier,
                        total,
                        req.input.display(),
                        diagnostics.trim()
                    );
                    // A half-written file would make the next tier refuse
                    // to overwrite the output.
                    if req.output.exists() {
                        if let Err(e) = std::fs::remove_file(&req.output) {
                            warn!(
                                "could not remove partial output {}: {}",
                                req.output.display(),
                                e
                            );
                        }
                    }
                    attempts.push(diagnostics);
                }
            }
        }

        TranscodeResult::Failed { attempts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn request(name: &str, speed: f64) -> TranscodeRequest {
        let input = PathBuf::from(format!("in/{}", name));
        TranscodeRequest {
            codec: CodecHint::from_path(&input),
            output: PathBuf::from(format!("out/{}", name)),
            input,
            speed,
        }
    }

    /// Fails the first `failures` invocations, then succeeds.
    struct FlakyRunner {
        failures: Cell<usize>,
        calls: Cell<usize>,
    }

    impl FlakyRunner {
        fn new(failures: usize) -> Self {
            Self {
                failures: Cell::new(failures),
                calls: Cell::new(0),
            }
        }
    }

    impl EngineRunner for FlakyRunner {
        fn run(&self, _cmd: &EngineCommand) -> RunStatus {
            self.calls.set(self.calls.get() + 1);
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                RunStatus::Failure {
                    diagnostics: "simulated engine failure".to_string(),
                }
            } else {
                RunStatus::Success
            }
        }
    }

    #[test]
    fn test_codec_hint_from_path() {
        assert_eq!(CodecHint::from_path(Path::new("a.mp3")), CodecHint::Mp3);
        assert_eq!(CodecHint::from_path(Path::new("a.MP3")), CodecHint::Mp3);
        assert_eq!(CodecHint::from_path(Path::new("b.m4a")), CodecHint::Aac);
    }

    #[test]
    fn test_tiers_shrink_strictly() {
        for name in ["a.mp3", "b.m4a"] {
            let tiers = fallback_tiers(&request(name, 1.5));
            assert_eq!(tiers.len(), 3);
            assert!(tiers[0].args.len() > tiers[1].args.len());
            assert!(tiers[1].args.len() > tiers[2].args.len());

            // The tempo filter survives every tier.
            for tier in &tiers {
                assert!(tier.args.contains(&OsString::from("atempo=1.5")));
            }
        }
    }

    #[test]
    fn test_mp3_tier_flags() {
        let tiers = fallback_tiers(&request("a.mp3", 1.5));

        assert!(tiers[0].args.contains(&OsString::from("libmp3lame")));
        assert!(tiers[0].args.contains(&OsString::from("-id3v2_version")));
        assert!(tiers[0].args.contains(&OsString::from("-map_metadata")));

        assert!(tiers[1].args.contains(&OsString::from("libmp3lame")));
        assert!(!tiers[1].args.contains(&OsString::from("-map_metadata")));

        assert!(!tiers[2].args.contains(&OsString::from("-c:a")));
    }

    #[test]
    fn test_m4a_tier_flags() {
        let tiers = fallback_tiers(&request("b.m4a", 2.5));

        assert!(tiers[0].args.contains(&OsString::from("aac")));
        assert!(tiers[0].args.contains(&OsString::from("192k")));
        assert!(!tiers[0].args.contains(&OsString::from("-id3v2_version")));

        assert!(tiers[1].args.contains(&OsString::from("192k")));
        assert!(!tiers[2].args.contains(&OsString::from("-b:a")));
    }

    #[test]
    fn test_decode_diagnostics() {
        assert_eq!(decode_diagnostics(b"plain error"), "plain error");
        // Invalid UTF-8 degrades to Latin-1, keeping every byte.
        assert_eq!(decode_diagnostics(&[0xff, 0x20, b'o', b'k']), "\u{ff} ok");
        assert_eq!(decode_diagnostics(b""), "");
    }

    #[test]
    fn test_ladder_escalates_until_success() {
        let runner = FlakyRunner::new(2);
        let transcoder = Transcoder::new(runner);

        match transcoder.transcode(&request("a.mp3", 1.5)) {
            TranscodeResult::Converted { tier } => assert_eq!(tier, 3),
            TranscodeResult::Failed { .. } => panic!("expected tier 3 success"),
        }
        assert_eq!(transcoder.runner.calls.get(), 3);
    }

    #[test]
    fn test_ladder_exhaustion_reports_all_attempts() {
        let runner = FlakyRunner::new(usize::MAX);
        let transcoder = Transcoder::new(runner);

        match transcoder.transcode(&request("a.mp3", 1.5)) {
            TranscodeResult::Failed { attempts } => assert_eq!(attempts.len(), 3),
            TranscodeResult::Converted { .. } => panic!("expected exhaustion"),
        }
        assert_eq!(transcoder.runner.calls.get(), 3);
    }

    #[test]
    fn test_first_tier_success_stops_ladder() {
        let runner = FlakyRunner::new(0);
        let transcoder = Transcoder::new(runner);

        match transcoder.transcode(&request("b.m4a", 2.0)) {
            TranscodeResult::Converted { tier } => assert_eq!(tier, 1),
            TranscodeResult::Failed { .. } => panic!("expected tier 1 success"),
        }
        assert_eq!(transcoder.runner.calls.get(), 1);
    }
}
