use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactDescriptor;
use crate::message::OutboundMessage;
use crate::registry::SharedRegistry;
use crate::verify::{Availability, AvailabilityVerifier};

/// What to do with the registry when a replayed artifact cannot be served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnreachablePolicy {
    /// Wipe the registry and the persisted snapshot.
    #[default]
    ResetRegistry,
    /// Remove only the unreachable entries and persist the rest.
    DropEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub delivered: Vec<ArtifactDescriptor>,
    pub dropped: Vec<ArtifactDescriptor>,
    /// Entries never verified because the connection went away.
    pub abandoned: usize,
    pub registry_reset: bool,
}

/// Per-connection FIFO of artifacts awaiting verification and replay.
#[derive(Debug, Default)]
pub struct ReplayQueue {
    entries: VecDeque<ArtifactDescriptor>,
}

impl ReplayQueue {
    pub fn seed(descriptors: impl IntoIterator<Item = ArtifactDescriptor>) -> Self {
        Self {
            entries: descriptors.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Verify entries in order, pushing reachable ones to `outbound`. Any
    /// unreachable entry triggers `policy` once the queue is drained.
    pub async fn drain(
        mut self,
        verifier: &dyn AvailabilityVerifier,
        registry: &SharedRegistry,
        policy: UnreachablePolicy,
        outbound: &mpsc::Sender<OutboundMessage>,
    ) -> ReplayReport {
        let mut report = ReplayReport::default();

        while let Some(descriptor) = self.entries.pop_front() {
            match verifier.verify(&descriptor).await {
                Availability::Reachable => {
                    if outbound
                        .send(OutboundMessage::delivered(&descriptor))
                        .await
                        .is_err()
                    {
                        report.abandoned = self.entries.len() + 1;
                        debug!(
                            abandoned = report.abandoned,
                            "Connection closed during replay"
                        );
                        break;
                    }
                    report.delivered.push(descriptor);
                }
                Availability::Unreachable => {
                    info!(link = %descriptor.relative_link(), "Replayed artifact no longer exists");
                    report.dropped.push(descriptor);
                }
            }
        }

        if !report.dropped.is_empty() {
            report.registry_reset = apply_policy(registry, policy, &report.dropped).await;
        }

        report
    }
}

async fn apply_policy(
    registry: &SharedRegistry,
    policy: UnreachablePolicy,
    dropped: &[ArtifactDescriptor],
) -> bool {
    match policy {
        UnreachablePolicy::ResetRegistry => {
            if let Err(err) = registry.reset().await {
                warn!(error = %err, "Failed to clear persisted registry; continuing in memory");
            }
            true
        }
        UnreachablePolicy::DropEntry => {
            match registry
                .remove_and_persist(|descriptor| dropped.contains(descriptor))
                .await
            {
                Ok(removed) => debug!(removed = removed.len(), "Dropped unreachable artifacts"),
                Err(err) => {
                    warn!(error = %err, "Failed to persist pruned registry; continuing in memory")
                }
            }
            false
        }
    }
}
