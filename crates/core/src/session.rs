//! One realtime connection's lifecycle:
//! `Opening → Syncing → Replaying → Idle ⇄ Running → Closed`.
//!
//! The session is transport-agnostic. It reads [`ChannelEvent`]s from a
//! stream and writes [`OutboundMessage`]s to a channel; the WebSocket route
//! adapts a socket to both.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::job::{ConversionJob, FailureReason, JobRunner};
use crate::message::{ChannelEvent, InboundMessage, OutboundMessage};
use crate::registry::SharedRegistry;
use crate::replay::{ReplayQueue, ReplayReport, UnreachablePolicy};
use crate::verify::AvailabilityVerifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Opening,
    Syncing,
    Replaying,
    Idle,
    Running,
    Closed,
}

/// Everything a session needs from the process; cheap to clone per
/// connection.
#[derive(Clone)]
pub struct SessionContext {
    pub registry: SharedRegistry,
    pub runner: JobRunner,
    pub verifier: Arc<dyn AvailabilityVerifier>,
    pub policy: UnreachablePolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub replay: ReplayReport,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub rejected_messages: usize,
    /// A job was still running when the connection closed; its artifact is
    /// recorded but was not delivered.
    pub abandoned_job: bool,
}

pub struct ChannelSession {
    id: Uuid,
    ctx: SessionContext,
    outbound: mpsc::Sender<OutboundMessage>,
    phase: watch::Sender<SessionPhase>,
    backlog: VecDeque<ChannelEvent>,
    summary: SessionSummary,
}

impl ChannelSession {
    pub fn new(ctx: SessionContext, outbound: mpsc::Sender<OutboundMessage>) -> Self {
        let (phase, _) = watch::channel(SessionPhase::Opening);
        Self {
            id: Uuid::new_v4(),
            ctx,
            outbound,
            phase,
            backlog: VecDeque::new(),
            summary: SessionSummary::default(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// Drive the session until the inbound stream closes.
    pub async fn run<S>(mut self, inbound: S) -> SessionSummary
    where
        S: Stream<Item = ChannelEvent> + Send,
    {
        let mut inbound = std::pin::pin!(inbound);
        info!(session_id = %self.id, "Client connected");

        self.enter(SessionPhase::Syncing);
        match self.ctx.registry.sync_from_store().await {
            Ok(outcome) => debug!(
                session_id = %self.id,
                added = outcome.added,
                discarded = outcome.discarded,
                "Registry synced"
            ),
            Err(err) => warn!(
                session_id = %self.id,
                error = %err,
                "Failed to load persisted registry; continuing with in-memory registry"
            ),
        }

        self.enter(SessionPhase::Replaying);
        let queue = ReplayQueue::seed(self.ctx.registry.descriptors().await);
        let queued = queue.len();
        self.summary.replay = queue
            .drain(
                self.ctx.verifier.as_ref(),
                &self.ctx.registry,
                self.ctx.policy,
                &self.outbound,
            )
            .await;
        info!(
            session_id = %self.id,
            queued,
            delivered = self.summary.replay.delivered.len(),
            dropped = self.summary.replay.dropped.len(),
            registry_reset = self.summary.replay.registry_reset,
            "Replay finished"
        );

        self.enter(SessionPhase::Idle);
        loop {
            let event = match self.backlog.pop_front() {
                Some(event) => Some(event),
                None => inbound.next().await,
            };

            match event {
                Some(ChannelEvent::Text(text)) => {
                    if !self.handle_text(&text, &mut inbound).await {
                        break;
                    }
                }
                Some(ChannelEvent::Close) | None => break,
            }
        }

        self.enter(SessionPhase::Closed);
        info!(session_id = %self.id, "Client disconnected");
        self.summary
    }

    /// Returns `false` once the connection is gone.
    async fn handle_text<S>(&mut self, text: &str, inbound: &mut std::pin::Pin<&mut S>) -> bool
    where
        S: Stream<Item = ChannelEvent> + Send,
    {
        debug!(session_id = %self.id, message = %text, "Received channel message");
        let (url, title) = match InboundMessage::parse(text) {
            InboundMessage::Convert { url, title } => (url, title),
            InboundMessage::Invalid { reason } => {
                self.summary.rejected_messages += 1;
                debug!(session_id = %self.id, %reason, "Rejected channel message");
                let failure = FailureReason::InvalidRequest(reason);
                return self.send(OutboundMessage::failed(&failure)).await;
            }
        };

        self.enter(SessionPhase::Running);
        let mut job_task = self.spawn_job(ConversionJob::new(url, title));

        let outcome = loop {
            tokio::select! {
                joined = &mut job_task => break joined,
                event = inbound.next() => match event {
                    Some(ChannelEvent::Text(text)) => self.backlog.push_back(ChannelEvent::Text(text)),
                    Some(ChannelEvent::Close) | None => {
                        self.summary.abandoned_job = true;
                        info!(
                            session_id = %self.id,
                            "Connection closed while a conversion is running; result will be recorded but not delivered"
                        );
                        return false;
                    }
                },
            }
        };

        let message = match outcome {
            Ok(Ok(descriptor)) => {
                self.summary.jobs_succeeded += 1;
                OutboundMessage::delivered(&descriptor)
            }
            Ok(Err(reason)) => {
                self.summary.jobs_failed += 1;
                OutboundMessage::failed(&reason)
            }
            Err(join_err) => {
                self.summary.jobs_failed += 1;
                warn!(session_id = %self.id, error = %join_err, "Conversion task aborted");
                OutboundMessage::failed(&FailureReason::TranscodeError(join_err.to_string()))
            }
        };

        let connected = self.send(message).await;
        if connected {
            self.enter(SessionPhase::Idle);
        }
        connected
    }

    /// Run the job on its own task so closing the connection never cancels
    /// the conversion. A successful artifact is flushed into the registry
    /// before the result is handed back.
    fn spawn_job(
        &self,
        mut job: ConversionJob,
    ) -> tokio::task::JoinHandle<Result<crate::artifact::ArtifactDescriptor, FailureReason>> {
        let runner = self.ctx.runner.clone();
        let registry = self.ctx.registry.clone();
        let session_id = self.id;

        tokio::spawn(async move {
            info!(
                session_id = %session_id,
                job_id = %job.id,
                title = %job.title,
                "Conversion requested"
            );
            let outcome = runner.run(&mut job).await;
            if outcome.is_ok() {
                if let Err(err) = registry.flush_pending().await {
                    warn!(
                        job_id = %job.id,
                        error = %err,
                        "Failed to persist registry; artifact kept in memory only"
                    );
                }
            }
            debug!(job_id = %job.id, duration_ms = ?job.duration_ms(), "Conversion task finished");
            outcome
        })
    }

    async fn send(&self, message: OutboundMessage) -> bool {
        if self.outbound.send(message).await.is_err() {
            debug!(session_id = %self.id, "Outbound channel closed");
            return false;
        }
        true
    }

    fn enter(&self, phase: SessionPhase) {
        debug!(session_id = %self.id, ?phase, "Session phase");
        self.phase.send_replace(phase);
    }
}
