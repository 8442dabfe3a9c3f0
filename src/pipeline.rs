use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audio::{
    generate_segments, needs_normalization, unique_name, MediaProber, MediaTranscoder,
};
use crate::config::Limits;
use crate::error::{ApiFailure, Result, ScribeError};
use crate::transcribe::Transcriber;

/// An upload already sitting on disk, owned by the current request.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub path: PathBuf,
    pub filename: String,
    pub size_bytes: u64,
    pub media_type: String,
}

/// What a pipeline run produces. The handler turns this into a stored record.
#[derive(Debug)]
pub struct PipelineOutput {
    pub text: String,
    pub word_count: usize,
    pub duration_secs: Option<f64>,
    pub total_chunks: Option<u32>,
}

/// Number of non-empty whitespace-delimited tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Removes every tracked file on drop, so no exit path of a request can
/// leave artifacts in the temp dir.
#[derive(Debug, Default)]
struct TempArtifacts {
    files: Vec<PathBuf>,
}

impl TempArtifacts {
    fn track(&mut self, path: &Path) {
        self.files.push(path.to_path_buf());
    }
}

impl Drop for TempArtifacts {
    fn drop(&mut self) {
        for path in &self.files {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!("failed to remove temp file {}: {e}", path.display());
                } else {
                    debug!("removed temp file {}", path.display());
                }
            }
        }
    }
}

/// Sequential transcription pipeline: normalize, probe, decide, split,
/// transcribe each segment in order, stitch.
pub struct TranscriptionPipeline {
    prober: Arc<dyn MediaProber>,
    transcoder: Arc<dyn MediaTranscoder>,
    transcriber: Arc<dyn Transcriber>,
    limits: Limits,
    temp_dir: PathBuf,
}

impl TranscriptionPipeline {
    pub fn new(
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn MediaTranscoder>,
        transcriber: Arc<dyn Transcriber>,
        limits: Limits,
        temp_dir: PathBuf,
    ) -> Self {
        Self {
            prober,
            transcoder,
            transcriber,
            limits,
            temp_dir,
        }
    }

    pub async fn run(&self, upload: &UploadedAudio) -> Result<PipelineOutput> {
        let mut artifacts = TempArtifacts::default();
        artifacts.track(&upload.path);
        self.run_tracked(upload, &mut artifacts).await
    }

    async fn run_tracked(
        &self,
        upload: &UploadedAudio,
        artifacts: &mut TempArtifacts,
    ) -> Result<PipelineOutput> {
        let mut work_path = upload.path.clone();

        if needs_normalization(&upload.path) {
            info!("normalizing {} to mp3 before transcription", upload.filename);
            let converted = self.temp_dir.join(unique_name("converted", "mp3"));
            artifacts.track(&converted);
            self.transcoder
                .transcode(&upload.path, &converted, None)
                .await?;
            // the source is no longer needed once the converted copy exists
            if let Err(e) = tokio::fs::remove_file(&upload.path).await {
                warn!("failed to remove original upload early: {e}");
            }
            work_path = converted;
        }

        let size_bytes = tokio::fs::metadata(&work_path).await?.len();

        let duration = match self.prober.duration_secs(&work_path).await {
            Ok(secs) => Some(secs),
            Err(e) => {
                warn!("duration probe failed, deciding on size alone: {e}");
                None
            }
        };

        let over_size = size_bytes > self.limits.max_direct_bytes;

        let (text, total_chunks) = match duration {
            Some(total) if over_size || total > self.limits.max_direct_secs => {
                let (text, chunks) = self
                    .transcribe_chunked(&work_path, total, &upload.filename, artifacts)
                    .await?;
                (text, Some(chunks))
            }
            _ => {
                if over_size {
                    // without a duration the segment count is unknowable,
                    // so the call goes out single-shot and the API's own
                    // size limit has the last word
                    warn!(
                        "{} exceeds the direct-size threshold but its duration is unknown; \
                         transcribing single-shot",
                        upload.filename
                    );
                }
                debug!("transcribing {} in one call", upload.filename);
                let text = self
                    .transcriber
                    .transcribe(&work_path, &upload.filename)
                    .await
                    .map_err(ScribeError::Transcription)?;
                (text.trim().to_string(), None)
            }
        };

        Ok(PipelineOutput {
            word_count: word_count(&text),
            duration_secs: duration,
            total_chunks,
            text,
        })
    }

    /// Split into fixed-duration segments and transcribe them strictly in
    /// index order, one call in flight at a time. A failed segment becomes
    /// an inline placeholder; the run only fails when every segment does.
    async fn transcribe_chunked(
        &self,
        path: &Path,
        total_secs: f64,
        source_name: &str,
        artifacts: &mut TempArtifacts,
    ) -> Result<(String, u32)> {
        let segments = generate_segments(
            self.transcoder.as_ref(),
            path,
            total_secs,
            &self.limits,
            &self.temp_dir,
        )
        .await?;

        for segment in &segments {
            artifacts.track(&segment.path);
        }

        let total = segments.len();
        info!("transcribing {total} segments sequentially");

        let mut text = String::new();
        let mut failures = 0usize;
        let mut first_failure: Option<ApiFailure> = None;

        for segment in &segments {
            let outcome = self.transcriber.transcribe(&segment.path, source_name).await;

            // delete immediately so peak disk usage stays near one
            // segment beyond the original file
            if let Err(e) = tokio::fs::remove_file(&segment.path).await {
                warn!(
                    "failed to remove segment {}: {e}",
                    segment.path.display()
                );
            }

            let piece = match outcome {
                Ok(t) => t.trim().to_string(),
                Err(e) => {
                    warn!("segment {} failed: {e}", segment.index);
                    failures += 1;
                    if first_failure.is_none() {
                        first_failure = Some(e.clone());
                    }
                    format!("[segment {} failed: {}]", segment.index, e.user_message())
                }
            };

            if piece.is_empty() {
                continue;
            }
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&piece);
        }

        if failures == total {
            // a transcript made of nothing but placeholders is a failure,
            // not a result
            let failure = first_failure
                .unwrap_or_else(|| ApiFailure::Other("all segments failed".to_string()));
            return Err(ScribeError::Transcription(failure));
        }

        if failures > 0 {
            info!("{failures}/{total} segments failed; placeholders inserted");
        }

        Ok((text, total as u32))
    }
}
