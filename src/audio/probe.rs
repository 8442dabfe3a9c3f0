use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Result, ScribeError};

use super::MediaProber;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Check that ffprobe is installed and accessible. Run once at startup.
pub fn check_ffprobe() -> Result<()> {
    let output = std::process::Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            ScribeError::Probe(format!(
                "ffprobe not found. Install FFmpeg (includes ffprobe) and ensure it's in PATH: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ScribeError::Probe("ffprobe check failed".to_string()));
    }

    debug!("ffprobe is available");
    Ok(())
}

/// Duration probe backed by the ffprobe binary.
pub struct FfprobeProber;

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn duration_secs(&self, input: &Path) -> Result<f64> {
        let invocation = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(input)
            .output();

        let output = tokio::time::timeout(PROBE_TIMEOUT, invocation)
            .await
            .map_err(|_| ScribeError::Probe("ffprobe timed out".to_string()))?
            .map_err(|e| ScribeError::Probe(format!("failed to run ffprobe: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScribeError::Probe(format!(
                "ffprobe failed: {}",
                stderr.trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        let secs: f64 = raw.trim().parse().map_err(|e| {
            ScribeError::Probe(format!("unparseable duration '{}': {e}", raw.trim()))
        })?;

        debug!("probed {:.2}s for {}", secs, input.display());
        Ok(secs)
    }
}
