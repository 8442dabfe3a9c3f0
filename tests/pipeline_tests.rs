//! End-to-end pipeline behavior against stubbed media and speech
//! capabilities: split decisions, ordering, placeholders, and the
//! no-temp-files-left-behind guarantee.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use audioscribe::audio::{MediaProber, MediaTranscoder};
use audioscribe::config::Limits;
use audioscribe::error::{ApiFailure, Result, ScribeError};
use audioscribe::pipeline::{TranscriptionPipeline, UploadedAudio};
use audioscribe::transcribe::Transcriber;

struct StubProber {
    duration: Option<f64>,
}

#[async_trait]
impl MediaProber for StubProber {
    async fn duration_secs(&self, _input: &Path) -> Result<f64> {
        self.duration
            .ok_or_else(|| ScribeError::Probe("stub probe failure".to_string()))
    }
}

#[derive(Default)]
struct StubTranscoder {
    /// Windows requested, in call order. `None` is a full re-encode.
    windows: Mutex<Vec<Option<(f64, f64)>>>,
    fail_full_reencode: bool,
}

#[async_trait]
impl MediaTranscoder for StubTranscoder {
    async fn transcode(
        &self,
        _input: &Path,
        output: &Path,
        window: Option<(f64, f64)>,
    ) -> Result<()> {
        self.windows.lock().unwrap().push(window);
        if window.is_none() && self.fail_full_reencode {
            return Err(ScribeError::Conversion("stub conversion failure".to_string()));
        }
        tokio::fs::write(output, vec![0u8; 4096]).await?;
        Ok(())
    }
}

struct ScriptedTranscriber {
    fail_on: HashSet<usize>,
    calls: AtomicUsize,
    seen_paths: Mutex<Vec<PathBuf>>,
    seen_names: Mutex<Vec<String>>,
}

impl ScriptedTranscriber {
    fn ok() -> Self {
        Self::failing_on(&[])
    }

    fn failing_on(indices: &[usize]) -> Self {
        Self {
            fail_on: indices.iter().copied().collect(),
            calls: AtomicUsize::new(0),
            seen_paths: Mutex::new(Vec::new()),
            seen_names: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        audio: &Path,
        source_name: &str,
    ) -> std::result::Result<String, ApiFailure> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_paths.lock().unwrap().push(audio.to_path_buf());
        self.seen_names.lock().unwrap().push(source_name.to_string());
        if self.fail_on.contains(&n) {
            return Err(ApiFailure::Other("scripted failure".to_string()));
        }
        Ok(format!("part {n}"))
    }

    fn name(&self) -> &'static str {
        "Scripted"
    }
}

fn test_limits() -> Limits {
    Limits {
        max_upload_bytes: 1024 * 1024,
        max_direct_bytes: 10_000,
        max_direct_secs: 600.0,
        chunk_secs: 600.0,
        min_segment_bytes: 16,
    }
}

struct Harness {
    temp: tempfile::TempDir,
    transcoder: Arc<StubTranscoder>,
    transcriber: Arc<ScriptedTranscriber>,
    pipeline: TranscriptionPipeline,
}

fn harness(
    duration: Option<f64>,
    transcoder: StubTranscoder,
    transcriber: ScriptedTranscriber,
) -> Harness {
    let temp = tempfile::tempdir().unwrap();
    let prober = Arc::new(StubProber { duration });
    let transcoder = Arc::new(transcoder);
    let transcriber = Arc::new(transcriber);
    let pipeline = TranscriptionPipeline::new(
        prober,
        transcoder.clone(),
        transcriber.clone(),
        test_limits(),
        temp.path().to_path_buf(),
    );
    Harness {
        temp,
        transcoder,
        transcriber,
        pipeline,
    }
}

fn write_upload(h: &Harness, name: &str, bytes: usize) -> UploadedAudio {
    let path = h.temp.path().join(name);
    std::fs::write(&path, vec![0u8; bytes]).unwrap();
    UploadedAudio {
        path,
        filename: name.to_string(),
        size_bytes: bytes as u64,
        media_type: "audio/mpeg".to_string(),
    }
}

fn temp_file_count(h: &Harness) -> usize {
    std::fs::read_dir(h.temp.path()).unwrap().count()
}

#[tokio::test]
async fn short_small_file_is_transcribed_in_one_call() {
    let h = harness(
        Some(180.0),
        StubTranscoder::default(),
        ScriptedTranscriber::ok(),
    );
    let upload = write_upload(&h, "short.mp3", 5_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    assert_eq!(h.transcriber.call_count(), 1);
    assert!(h.transcoder.windows.lock().unwrap().is_empty());
    assert_eq!(output.total_chunks, None);
    assert_eq!(output.duration_secs, Some(180.0));
    assert_eq!(output.text, "part 0");
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn long_audio_is_split_and_joined_in_order() {
    // 25 minutes at 10-minute chunks: three segments
    let h = harness(
        Some(1500.0),
        StubTranscoder::default(),
        ScriptedTranscriber::ok(),
    );
    let upload = write_upload(&h, "long.wav", 5_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    assert_eq!(h.transcriber.call_count(), 3);
    assert_eq!(output.total_chunks, Some(3));
    assert_eq!(output.text, "part 0 part 1 part 2");
    assert_eq!(output.word_count, 6);
    assert_eq!(temp_file_count(&h), 0);

    let windows = h.transcoder.windows.lock().unwrap();
    assert_eq!(
        *windows,
        vec![
            Some((0.0, 600.0)),
            Some((600.0, 600.0)),
            Some((1200.0, 300.0))
        ]
    );
}

#[tokio::test]
async fn oversized_file_splits_even_when_duration_is_short() {
    let h = harness(
        Some(300.0),
        StubTranscoder::default(),
        ScriptedTranscriber::ok(),
    );
    let upload = write_upload(&h, "dense.mp3", 50_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    assert_eq!(output.total_chunks, Some(1));
    assert_eq!(h.transcriber.call_count(), 1);
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn failed_segment_becomes_an_ordered_placeholder() {
    let h = harness(
        Some(1500.0),
        StubTranscoder::default(),
        ScriptedTranscriber::failing_on(&[1]),
    );
    let upload = write_upload(&h, "flaky.mp3", 5_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    let part0 = output.text.find("part 0").unwrap();
    let placeholder = output.text.find("[segment 1 failed:").unwrap();
    let part2 = output.text.find("part 2").unwrap();
    assert!(part0 < placeholder && placeholder < part2);
    assert_eq!(output.total_chunks, Some(3));
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn all_segments_failing_fails_the_request() {
    let h = harness(
        Some(1500.0),
        StubTranscoder::default(),
        ScriptedTranscriber::failing_on(&[0, 1, 2]),
    );
    let upload = write_upload(&h, "doomed.mp3", 5_000);

    let result = h.pipeline.run(&upload).await;

    assert!(matches!(result, Err(ScribeError::Transcription(_))));
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn probe_failure_falls_back_to_single_shot() {
    let h = harness(None, StubTranscoder::default(), ScriptedTranscriber::ok());
    // over the size threshold, but the duration is unknown
    let upload = write_upload(&h, "mystery.mp3", 50_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    assert_eq!(h.transcriber.call_count(), 1);
    assert_eq!(output.total_chunks, None);
    assert_eq!(output.duration_secs, None);
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn m4a_upload_is_normalized_before_transcription() {
    let h = harness(
        Some(60.0),
        StubTranscoder::default(),
        ScriptedTranscriber::ok(),
    );
    let upload = write_upload(&h, "memo.m4a", 5_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    // one full re-encode, no windowed cuts
    assert_eq!(*h.transcoder.windows.lock().unwrap(), vec![None]);
    assert!(!upload.path.exists());
    assert_eq!(output.text, "part 0");

    let seen = h.transcriber.seen_paths.lock().unwrap();
    assert!(seen[0].extension().unwrap() == "mp3");
    // the original container name still reaches the transcriber so
    // container-specific failures classify correctly
    assert_eq!(
        *h.transcriber.seen_names.lock().unwrap(),
        vec!["memo.m4a".to_string()]
    );
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn conversion_failure_aborts_and_cleans_up() {
    let transcoder = StubTranscoder {
        fail_full_reencode: true,
        ..StubTranscoder::default()
    };
    let h = harness(Some(60.0), transcoder, ScriptedTranscriber::ok());
    let upload = write_upload(&h, "memo.m4a", 5_000);

    let result = h.pipeline.run(&upload).await;

    assert!(matches!(result, Err(ScribeError::Conversion(_))));
    assert_eq!(h.transcriber.call_count(), 0);
    assert_eq!(temp_file_count(&h), 0);
}

#[tokio::test]
async fn word_count_matches_whitespace_tokens() {
    let h = harness(
        Some(1500.0),
        StubTranscoder::default(),
        ScriptedTranscriber::ok(),
    );
    let upload = write_upload(&h, "long.mp3", 5_000);

    let output = h.pipeline.run(&upload).await.unwrap();

    assert_eq!(output.word_count, output.text.split_whitespace().count());
}

#[tokio::test]
async fn probed_duration_flows_to_the_output() {
    let h = harness(
        Some(42.5),
        StubTranscoder::default(),
        ScriptedTranscriber::ok(),
    );
    let upload = write_upload(&h, "tiny.ogg", 100);

    let output = h.pipeline.run(&upload).await.unwrap();
    assert_eq!(output.duration_secs, Some(42.5));
}
