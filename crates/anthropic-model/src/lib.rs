//! A model provider for the Anthropic Messages API.
//!
//! Requests are sent without streaming, the whole reply is surfaced as a
//! single message delta followed by the completion event.

#[macro_use]
extern crate tracing;

mod config;
mod types;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use qed_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use reqwest::Client;

pub use config::{AnthropicConfig, AnthropicConfigBuilder};
use types::{ErrorResponse, MessagesResponse};

/// Errors from [`AnthropicProvider`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("No text content in response")]
    NoTextContent,
}

impl ModelProviderError for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::RateLimited { .. } => ErrorKind::RateLimitExceeded,
            Error::Http(err) if err.is_timeout() => ErrorKind::Timeout,
            _ => ErrorKind::Other,
        }
    }
}

/// Anthropic model provider.
#[derive(Clone, Debug)]
pub struct AnthropicProvider {
    http: Client,
    config: Arc<AnthropicConfig>,
}

impl AnthropicProvider {
    /// Creates a new provider with the given configuration.
    #[inline]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            http: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl ModelProvider for AnthropicProvider {
    type Error = Error;
    type Response = AnthropicResponse;

    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let request = types::create_request(req, &self.config.model);
        let resp_fut = self
            .http
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", AnthropicConfig::API_VERSION)
            .json(&request)
            .send();

        async move {
            let response = resp_fut.await?;
            let status = response.status().as_u16();

            if status == 429 {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok());
                return Err(Error::RateLimited { retry_after });
            }

            if status >= 400 {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "(no body)".into());
                debug!("messages request failed with {status}: {body}");
                let message = serde_json::from_str::<ErrorResponse>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(Error::Api { status, message });
            }

            let resp: MessagesResponse =
                response.json().await.map_err(|e| {
                    Error::InvalidResponse(format!(
                        "failed to parse response: {e}"
                    ))
                })?;
            AnthropicResponse::from_message(resp)
        }
    }
}

/// A fully received reply, replayed through the event interface.
pub struct AnthropicResponse {
    text: Option<String>,
    finish_reason: Option<ModelFinishReason>,
}

impl AnthropicResponse {
    fn from_message(resp: MessagesResponse) -> Result<Self, Error> {
        let Some(text) = resp.text() else {
            return Err(Error::NoTextContent);
        };
        let finish_reason = match resp.stop_reason.as_deref() {
            Some("max_tokens") => ModelFinishReason::Length,
            _ => ModelFinishReason::Stop,
        };
        Ok(Self {
            text: Some(text.to_owned()),
            finish_reason: Some(finish_reason),
        })
    }
}

impl ModelResponse for AnthropicResponse {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.get_mut();
        if let Some(text) = this.text.take() {
            return Poll::Ready(Ok(Some(ModelResponseEvent::MessageDelta(
                text,
            ))));
        }
        let finish_reason = this.finish_reason.take();
        Poll::Ready(Ok(finish_reason.map(ModelResponseEvent::Completed)))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    fn parse(json: &str) -> MessagesResponse {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_response_replays_text_then_completion() {
        let resp = AnthropicResponse::from_message(parse(
            r#"{"content":[{"type":"text","text":"Hi"}],"stop_reason":"max_tokens"}"#,
        ))
        .unwrap();
        let mut resp = pin!(resp);
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                ModelResponseEvent::MessageDelta("Hi".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::Length),
            ]
        );
    }

    #[test]
    fn test_response_without_text_is_an_error() {
        let err = AnthropicResponse::from_message(parse(
            r#"{"content":[{"type":"tool_use"}],"stop_reason":"end_turn"}"#,
        ))
        .err()
        .unwrap();
        assert_eq!(err.to_string(), "No text content in response");
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_error_kinds() {
        let err = Error::RateLimited {
            retry_after: Some(30),
        };
        assert!(err.to_string().contains("rate limited"));
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);

        let err = Error::Api {
            status: 401,
            message: "invalid x-api-key".into(),
        };
        assert_eq!(
            err.to_string(),
            "API error (status 401): invalid x-api-key"
        );
    }
}
