//! Events delivered to clients over the event stream.

use serde::Serialize;
use serde_json::Number;

use crate::agent_output::AgentOutput;

/// A typed event of the outbound stream.
///
/// Every logical stream ends with exactly one `Complete` or `Error`,
/// preceded by any number of `Progress` events.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A stage of the pipeline has started.
    Progress(Progress),
    /// The pipeline has finished with a result.
    Complete(CompletePayload),
    /// The pipeline has failed.
    Error(ErrorPayload),
}

/// Payload of a progress event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// What is happening.
    pub message: String,
    /// The current step, starting from 1.
    pub step: u32,
    /// The number of steps of the pipeline.
    pub total_steps: u32,
    /// Fine-grained progress reported by the rendering service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<Number>,
}

/// Payload of a complete event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CompletePayload {
    /// A coaching reply.
    Coaching {
        /// The coach's message.
        message: String,
        /// The problem breakdown, only present for fresh problems.
        #[serde(skip_serializing_if = "Option::is_none")]
        decomposition: Option<AgentOutput>,
    },
    /// A rendered visualization.
    #[serde(rename_all = "camelCase")]
    Visualization {
        /// Absolute URL of the video.
        video_url: String,
        /// Identifier assigned by the rendering service.
        video_id: String,
        /// The narration of the video.
        explanation: String,
        /// A note about partial success.
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
}

/// Payload of an error event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    /// The error message.
    pub error: String,
    /// A hint about what the user could do.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// A generic summary shown next to the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StreamEvent {
    /// Creates a progress event without a percentage.
    pub fn progress<S: Into<String>>(
        message: S,
        step: u32,
        total_steps: u32,
    ) -> Self {
        StreamEvent::Progress(Progress {
            message: message.into(),
            step,
            total_steps,
            percentage: None,
        })
    }

    /// Creates an error event carrying only the message.
    pub fn error<S: Into<String>>(error: S) -> Self {
        StreamEvent::Error(ErrorPayload {
            error: error.into(),
            details: None,
            message: None,
        })
    }

    /// Returns whether this event ends a stream.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Progress(_))
    }
}
