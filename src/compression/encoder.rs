//! External encoder seam.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::{CompressionConfig, QualityProfile};
use crate::constants::compression::ENCODER_POLL_INTERVAL_MS;
use crate::errors::PipelineError;

/// Re-encodes one file with a quality profile.
///
/// Implementations write `target` (which may already exist) and report failure
/// as [`PipelineError::Encoder`] or [`PipelineError::EncoderTimeout`].
pub trait Encoder {
    /// Encode `source` into `target` with `profile`; `target` is left absent on failure.
    fn encode(
        &self,
        source: &Path,
        target: &Path,
        profile: &QualityProfile,
    ) -> Result<(), PipelineError>;
}

/// Runs `ffmpeg` (or a compatible program) as a subprocess with a wall-clock limit.
#[derive(Clone, Debug)]
pub struct FfmpegEncoder {
    program: PathBuf,
    timeout: Duration,
    poll_interval: Duration,
}

impl FfmpegEncoder {
    /// Encoder running `program` with a `timeout` per encode.
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            poll_interval: Duration::from_millis(ENCODER_POLL_INTERVAL_MS),
        }
    }

    /// Encoder using the configured program and timeout.
    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(&config.encoder_program, config.encoder_timeout)
    }

    /// Command line for one encode, program excluded.
    pub fn arguments(source: &Path, target: &Path, profile: &QualityProfile) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-y", "-nostdin", "-loglevel", "error", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(source.as_os_str().to_owned());
        for arg in [
            "-c:v".to_string(),
            profile.codec.clone(),
            "-b:v".to_string(),
            profile.bitrate.clone(),
            "-vf".to_string(),
            format!("scale={}:{}", profile.width, profile.height),
            "-r".to_string(),
            profile.framerate.to_string(),
            "-an".to_string(),
        ] {
            args.push(arg.into());
        }
        args.push(target.as_os_str().to_owned());
        args
    }
}

impl Encoder for FfmpegEncoder {
    fn encode(
        &self,
        source: &Path,
        target: &Path,
        profile: &QualityProfile,
    ) -> Result<(), PipelineError> {
        let encoder_err = |reason: String| PipelineError::Encoder {
            path: source.to_path_buf(),
            reason,
        };
        debug!(
            program = %self.program.display(),
            source = %source.display(),
            tier = %profile.tier,
            "[videos:encoder] starting"
        );
        let mut child = Command::new(&self.program)
            .args(Self::arguments(source, target, profile))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                encoder_err(format!("failed to start {}: {err}", self.program.display()))
            })?;

        let stderr_handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                buf
            })
        });

        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(PipelineError::EncoderTimeout {
                    path: source.to_path_buf(),
                    seconds: self.timeout.as_secs(),
                });
            }
            thread::sleep(self.poll_interval);
        };

        let stderr = stderr_handle
            .and_then(|handle| handle.join().ok())
            .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
            .unwrap_or_default();
        if !status.success() {
            let last_line = stderr.lines().last().unwrap_or("no diagnostics");
            return Err(encoder_err(format!("{status}: {last_line}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::QualityTier;

    #[test]
    fn arguments_follow_profile() {
        let profile = QualityProfile::for_tier(QualityTier::Standard);
        let args = FfmpegEncoder::arguments(Path::new("in.webm"), Path::new("out.webm"), &profile);
        let args: Vec<String> = args
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -nostdin -loglevel error -i in.webm"));
        assert!(joined.contains("-c:v libvpx-vp9 -b:v 1M -vf scale=1280:720 -r 24 -an"));
        assert_eq!(args.last().map(String::as_str), Some("out.webm"));
    }

    #[test]
    fn missing_program_is_an_item_scoped_encoder_error() {
        let encoder = FfmpegEncoder::new("/nonexistent/encoder-binary", Duration::from_secs(1));
        let profile = QualityProfile::for_tier(QualityTier::High);
        let err = encoder
            .encode(Path::new("in.webm"), Path::new("out.webm"), &profile)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Encoder { .. }));
        assert!(err.is_item_scoped());
    }
}
