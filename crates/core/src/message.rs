//! Wire messages of the realtime channel.
//!
//! Replay deliveries and conversion results share one outbound shape; the
//! inbound side carries only conversion requests.

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactDescriptor;
use crate::job::{FailureReason, INVALID_REQUEST_MESSAGE};

pub const SUCCESS_MARKER: &str = "done";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    Success {
        success: String,
        link: String,
        text_content: String,
    },
    Error {
        error: String,
    },
}

impl OutboundMessage {
    pub fn delivered(descriptor: &ArtifactDescriptor) -> Self {
        Self::Success {
            success: SUCCESS_MARKER.to_string(),
            link: descriptor.relative_link().to_string(),
            text_content: descriptor.title().to_string(),
        }
    }

    pub fn failed(reason: &FailureReason) -> Self {
        Self::Error {
            error: reason.client_message().to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Events a transport feeds into a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Text(String),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Convert { url: String, title: String },
    Invalid { reason: String },
}

#[derive(Debug, Deserialize)]
struct ConvertRequest {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl InboundMessage {
    pub fn parse(text: &str) -> Self {
        let request: ConvertRequest = match serde_json::from_str(text) {
            Ok(request) => request,
            Err(err) => {
                return Self::Invalid {
                    reason: format!("malformed request: {err}"),
                }
            }
        };

        match (request.url, request.title) {
            (Some(url), Some(title)) if !url.trim().is_empty() && !title.trim().is_empty() => {
                Self::Convert { url, title }
            }
            _ => Self::Invalid {
                reason: INVALID_REQUEST_MESSAGE.to_string(),
            },
        }
    }
}
