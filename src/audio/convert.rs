use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, ScribeError};

use super::MediaTranscoder;

const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(300);

/// Check that ffmpeg is installed and accessible. Run once at startup.
pub fn check_ffmpeg() -> Result<()> {
    let output = std::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| {
            ScribeError::Conversion(format!(
                "ffmpeg not found. Install FFmpeg and ensure it's in PATH: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ScribeError::Conversion("ffmpeg check failed".to_string()));
    }

    debug!("ffmpeg is available");
    Ok(())
}

/// m4a uploads are refused by the speech API often enough that they are
/// always re-encoded before any transcription or splitting.
pub fn needs_normalization(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("m4a"))
        .unwrap_or(false)
}

/// Transcoder backed by the ffmpeg binary. Output is mono 16 kHz 64 kbps
/// mp3, which keeps a ten-minute segment around 5 MB.
pub struct FfmpegTranscoder;

#[async_trait]
impl MediaTranscoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        window: Option<(f64, f64)>,
    ) -> Result<()> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-y");
        if let Some((start, duration)) = window {
            cmd.args(["-ss", &format!("{start:.3}"), "-t", &format!("{duration:.3}")]);
        }
        cmd.arg("-i").arg(input).args([
            "-vn", "-acodec", "libmp3lame", "-ar", "16000", "-ac", "1", "-b:a", "64k",
        ]);
        cmd.arg(output);

        let result = tokio::time::timeout(TRANSCODE_TIMEOUT, cmd.output()).await;

        let outcome = match result {
            Ok(Ok(out)) if out.status.success() => Ok(()),
            Ok(Ok(out)) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                let tail: String = stderr.lines().rev().take(3).collect::<Vec<_>>().join(" | ");
                Err(ScribeError::Conversion(format!("ffmpeg failed: {tail}")))
            }
            Ok(Err(e)) => Err(ScribeError::Conversion(format!("failed to run ffmpeg: {e}"))),
            Err(_) => Err(ScribeError::Conversion("ffmpeg timed out".to_string())),
        };

        if outcome.is_err() {
            // never leave a partially written output behind
            let _ = tokio::fs::remove_file(output).await;
            return outcome;
        }

        ensure_usable_output(output).await
    }
}

/// A zero-byte file means ffmpeg exited cleanly without writing audio,
/// which happens with some truncated m4a inputs. Treat it like a failed
/// conversion and remove the husk.
async fn ensure_usable_output(output: &Path) -> Result<()> {
    let size = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        let _ = tokio::fs::remove_file(output).await;
        return Err(ScribeError::Conversion(
            "ffmpeg reported success but produced no usable output".to_string(),
        ));
    }
    Ok(())
}
