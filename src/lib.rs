pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod transcribe;

pub use config::Config;
pub use error::{ApiFailure, Result, ScribeError};
pub use pipeline::{PipelineOutput, TranscriptionPipeline, UploadedAudio};
