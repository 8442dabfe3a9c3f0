use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::Limits;
use crate::error::{Result, ScribeError};

use super::{unique_name, MediaTranscoder, Segment};

/// Number of fixed-duration segments needed to cover `total_secs`.
pub fn segment_count(total_secs: f64, chunk_secs: f64) -> usize {
    (total_secs / chunk_secs).ceil().max(1.0) as usize
}

/// Cut the input into fixed-duration segments via the transcoder.
///
/// Segments whose output is missing or smaller than the corruption
/// threshold are deleted and skipped, shrinking the effective list.
/// Producing zero usable segments is an error.
pub async fn generate_segments(
    transcoder: &dyn MediaTranscoder,
    input: &Path,
    total_secs: f64,
    limits: &Limits,
    out_dir: &Path,
) -> Result<Vec<Segment>> {
    let count = segment_count(total_secs, limits.chunk_secs);
    info!(
        "splitting {:.1}s of audio into {} segments of {:.0}s",
        total_secs, count, limits.chunk_secs
    );

    let mut segments = Vec::with_capacity(count);

    for index in 0..count {
        let start = index as f64 * limits.chunk_secs;
        let duration = (total_secs - start).min(limits.chunk_secs);
        let path = out_dir.join(unique_name(&format!("segment{index:03}"), "mp3"));

        if let Err(e) = transcoder
            .transcode(input, &path, Some((start, duration)))
            .await
        {
            warn!("segment {index} transcode failed, skipping: {e}");
            continue;
        }

        let size = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };

        if size <= limits.min_segment_bytes {
            warn!(
                "segment {index} is {size} bytes (min {}), discarding as corrupt",
                limits.min_segment_bytes
            );
            let _ = tokio::fs::remove_file(&path).await;
            continue;
        }

        debug!("segment {index}: {start:.1}s +{duration:.1}s, {size} bytes");
        segments.push(Segment {
            index,
            path,
            start_secs: start,
            duration_secs: duration,
        });
    }

    if segments.is_empty() {
        return Err(ScribeError::Conversion(
            "audio split produced no usable segments".to_string(),
        ));
    }

    Ok(segments)
}
