use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::artifact::ArtifactDescriptor;

const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Reachable,
    Unreachable,
}

#[async_trait]
pub trait AvailabilityVerifier: Send + Sync {
    async fn verify(&self, descriptor: &ArtifactDescriptor) -> Availability;
}

/// Probes an artifact through the same HTTP path a client would use. Sends
/// `HEAD` so the file body never crosses the wire.
#[derive(Debug, Clone)]
pub struct HttpProbeVerifier {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpProbeVerifier {
    pub fn new(base_url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(PROBE_CONNECT_TIMEOUT)
            .timeout(PROBE_REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .context("failed to build HTTP client for availability probes")?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn probe_url(&self, descriptor: &ArtifactDescriptor) -> Result<Url> {
        self.base_url
            .join(descriptor.relative_link())
            .with_context(|| format!("invalid artifact link: {}", descriptor.relative_link()))
    }
}

#[async_trait]
impl AvailabilityVerifier for HttpProbeVerifier {
    async fn verify(&self, descriptor: &ArtifactDescriptor) -> Availability {
        let url = match self.probe_url(descriptor) {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Artifact link cannot be probed");
                return Availability::Unreachable;
            }
        };

        match self.client.head(url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%url, "Artifact reachable");
                Availability::Reachable
            }
            Ok(response) => {
                debug!(%url, status = response.status().as_u16(), "Artifact probe rejected");
                Availability::Unreachable
            }
            Err(err) => {
                warn!(%url, error = %err, "Artifact probe failed");
                Availability::Unreachable
            }
        }
    }
}
