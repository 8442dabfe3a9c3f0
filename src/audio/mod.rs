pub mod convert;
pub mod probe;
pub mod split;

pub use convert::{check_ffmpeg, needs_normalization, FfmpegTranscoder};
pub use probe::{check_ffprobe, FfprobeProber};
pub use split::{generate_segments, segment_count};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Read-only media inspection: duration without transcoding.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn duration_secs(&self, input: &Path) -> Result<f64>;
}

/// Re-encode a media file, optionally cutting a `(start, duration)` window
/// in seconds. Output format is whatever the implementation targets; here
/// it is speech-friendly mono mp3.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        window: Option<(f64, f64)>,
    ) -> Result<()>;
}

/// A time-bounded slice of the original audio, re-encoded for the API.
#[derive(Debug, Clone)]
pub struct Segment {
    pub index: usize,
    pub path: PathBuf,
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Collision-safe temp-file name: timestamp plus a random suffix, so
/// concurrent requests sharing one temp dir never clash.
pub fn unique_name(prefix: &str, ext: &str) -> String {
    let ts = chrono::Utc::now().timestamp_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{prefix}_{ts}_{}.{ext}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_names_do_not_collide() {
        let a = unique_name("upload", "mp3");
        let b = unique_name("upload", "mp3");
        assert_ne!(a, b);
        assert!(a.starts_with("upload_"));
        assert!(a.ends_with(".mp3"));
    }
}
