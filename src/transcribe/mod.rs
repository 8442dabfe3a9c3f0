pub mod whisper;

pub use whisper::WhisperClient;

use crate::error::ApiFailure;
use async_trait::async_trait;
use std::path::Path;

/// Speech transcription capability: one audio file in, transcript text out.
/// Failures come back classified so callers can map them to user messages.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio file. `source_name` is the client-facing name
    /// of the original upload; the on-disk file may be a re-encoded copy
    /// or a cut segment of it, so classification of container-specific
    /// failures keys on the source name, not the path.
    async fn transcribe(&self, audio: &Path, source_name: &str) -> Result<String, ApiFailure>;

    fn name(&self) -> &'static str;
}
