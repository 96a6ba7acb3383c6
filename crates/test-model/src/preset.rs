use serde::{Deserialize, Serialize};

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PresetEvent {
    #[serde(rename = "message_delta")]
    MessageDelta(String),
}

/// How a scripted request should fail.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetFailure {
    /// `send_request` itself fails.
    Request(String),
    /// The response fails after delivering all of its events.
    Stream(String),
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the request fails as described.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PresetFailure>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// Creates a response whose whole text arrives as one delta.
    #[inline]
    pub fn with_text<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a response that fails when it's requested.
    #[inline]
    pub fn failing<S: Into<String>>(message: S) -> Self {
        Self {
            events: vec![],
            failure: Some(PresetFailure::Request(message.into())),
        }
    }

    /// Makes the response fail after its events are delivered.
    #[inline]
    pub fn with_stream_failure<S: Into<String>>(mut self, message: S) -> Self {
        self.failure = Some(PresetFailure::Stream(message.into()));
        self
    }

    /// Returns the whole text this response delivers.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .map(|PresetEvent::MessageDelta(delta)| delta.as_str())
            .collect()
    }
}
