use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactDescriptor, DELIMITER, OUTPUT_FILE_NAME};
use crate::media::{MediaSource, OutputProfile, Transcoder, MP3_128K};
use crate::registry::SharedRegistry;

pub const INVALID_REQUEST_MESSAGE: &str = "Invalid URL or missing title";
pub const SOURCE_FETCH_MESSAGE: &str = "Error converting the video";
pub const TRANSCODE_MESSAGE: &str = "Error converting the audio";
pub const TIMEOUT_MESSAGE: &str = "Conversion timed out";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Requested,
    Fetching,
    Transcoding,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    Fetch,
    Transcode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("source fetch failed: {0}")]
    SourceFetchError(String),
    #[error("transcode failed: {0}")]
    TranscodeError(String),
    #[error("{stage:?} stage timed out after {}s", .after.as_secs())]
    Timeout { stage: JobStage, after: Duration },
}

impl FailureReason {
    /// Text sent to the requesting connection.
    pub fn client_message(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => INVALID_REQUEST_MESSAGE,
            Self::SourceFetchError(_) => SOURCE_FETCH_MESSAGE,
            Self::TranscodeError(_) => TRANSCODE_MESSAGE,
            Self::Timeout { .. } => TIMEOUT_MESSAGE,
        }
    }
}

/// One requested conversion, owned by the session that created it.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: Uuid,
    pub source_id: String,
    pub title: String,
    pub state: JobState,
    pub outcome: Option<Result<ArtifactDescriptor, FailureReason>>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ConversionJob {
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            title: title.into(),
            state: JobState::Requested,
            outcome: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    fn advance(&mut self, state: JobState) {
        debug!(job_id = %self.id, from = ?self.state, to = ?state, "Job state transition");
        self.state = state;
    }

    fn finish(&mut self, outcome: Result<ArtifactDescriptor, FailureReason>) {
        self.advance(if outcome.is_ok() {
            JobState::Succeeded
        } else {
            JobState::Failed
        });
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        let finished_at = self.finished_at?;
        Some((finished_at - self.created_at).num_milliseconds().max(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTimeouts {
    pub fetch: Duration,
    pub transcode: Duration,
}

impl Default for JobTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(60),
            transcode: Duration::from_secs(30 * 60),
        }
    }
}

/// Runs conversion jobs against the external source and transcode
/// capabilities. Cheap to clone; jobs from different connections run fully
/// in parallel.
#[derive(Clone)]
pub struct JobRunner {
    media_dir: PathBuf,
    source: Arc<dyn MediaSource>,
    transcoder: Arc<dyn Transcoder>,
    registry: SharedRegistry,
    timeouts: JobTimeouts,
    profile: OutputProfile,
}

impl JobRunner {
    pub fn new(
        media_dir: PathBuf,
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
        registry: SharedRegistry,
        timeouts: JobTimeouts,
    ) -> Self {
        Self {
            media_dir,
            source,
            transcoder,
            registry,
            timeouts,
            profile: MP3_128K,
        }
    }

    pub fn media_dir(&self) -> &Path {
        &self.media_dir
    }

    /// Run `job` to completion. On success the artifact is also appended to
    /// the registry's pending list.
    pub async fn run(&self, job: &mut ConversionJob) -> Result<ArtifactDescriptor, FailureReason> {
        let outcome = self.execute(job).await;
        match &outcome {
            Ok(descriptor) => {
                self.registry.push_pending(descriptor.clone()).await;
                info!(
                    job_id = %job.id,
                    title = %job.title,
                    link = %descriptor.relative_link(),
                    "Conversion completed"
                );
            }
            Err(reason) => {
                warn!(job_id = %job.id, title = %job.title, error = %reason, "Conversion failed");
            }
        }
        job.finish(outcome.clone());
        outcome
    }

    async fn execute(&self, job: &mut ConversionJob) -> Result<ArtifactDescriptor, FailureReason> {
        validate_request(&job.source_id, &job.title)?;
        let descriptor = ArtifactDescriptor::for_title(&job.title)
            .map_err(|err| FailureReason::InvalidRequest(err.to_string()))?;

        let output_dir = self.media_dir.join(&job.title);
        ensure_output_dir(&output_dir)
            .await
            .map_err(|err| FailureReason::TranscodeError(format!("{err:#}")))?;
        let output_path = output_dir.join(OUTPUT_FILE_NAME);

        job.advance(JobState::Fetching);
        let stream = with_timeout(
            JobStage::Fetch,
            self.timeouts.fetch,
            self.source.fetch(&job.source_id),
        )
        .await?
        .map_err(|err| FailureReason::SourceFetchError(format!("{err:#}")))?;

        job.advance(JobState::Transcoding);
        with_timeout(
            JobStage::Transcode,
            self.timeouts.transcode,
            self.transcoder
                .transcode(&stream, &self.profile, &output_path),
        )
        .await?
        .map_err(|err| FailureReason::TranscodeError(format!("{err:#}")))?;

        if !tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
            return Err(FailureReason::TranscodeError(format!(
                "transcoder reported success but {} is missing",
                output_path.display()
            )));
        }

        Ok(descriptor)
    }
}

/// Both fields must be present; the title doubles as a folder name, so it
/// must also be a single safe path segment.
pub fn validate_request(source_id: &str, title: &str) -> Result<(), FailureReason> {
    if source_id.trim().is_empty() {
        return Err(FailureReason::InvalidRequest("missing source url".into()));
    }
    if title.trim().is_empty() {
        return Err(FailureReason::InvalidRequest("missing title".into()));
    }
    if title.contains('/') || title.contains('\\') || title.contains('\0') {
        return Err(FailureReason::InvalidRequest(
            "title must not contain path separators".into(),
        ));
    }
    if title == "." || title == ".." {
        return Err(FailureReason::InvalidRequest(
            "title must not be a relative path component".into(),
        ));
    }
    if title.contains(DELIMITER) {
        return Err(FailureReason::InvalidRequest(format!(
            "title must not contain '{DELIMITER}'"
        )));
    }
    Ok(())
}

async fn ensure_output_dir(dir: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create output folder: {}", dir.display()))?;
    debug!(dir = %dir.display(), "Output folder ready");
    Ok(())
}

async fn with_timeout<T>(
    stage: JobStage,
    after: Duration,
    fut: impl Future<Output = T>,
) -> Result<T, FailureReason> {
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| FailureReason::Timeout { stage, after })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use crate::media::{MediaSource, OutputProfile, SourceStream, Transcoder};

    /// Source that resolves any id unless it is listed as failing.
    #[derive(Default)]
    pub struct FakeSource {
        pub failing_ids: Vec<String>,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl MediaSource for FakeSource {
        async fn fetch(&self, source_id: &str) -> Result<SourceStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.failing_ids.iter().any(|id| id == source_id) {
                bail!("video unavailable: {source_id}");
            }
            Ok(SourceStream {
                source_id: source_id.to_string(),
                source_title: None,
                stream_location: format!("fake://{source_id}"),
            })
        }
    }

    /// Transcoder that writes a small placeholder file.
    #[derive(Default)]
    pub struct FakeTranscoder {
        pub fail: bool,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn transcode(
            &self,
            input: &SourceStream,
            profile: &OutputProfile,
            output: &Path,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                bail!("encoder crashed");
            }
            let body = format!("{}@{}", input.stream_location, profile.bitrate);
            tokio::fs::write(output, body).await?;
            Ok(())
        }
    }
}
