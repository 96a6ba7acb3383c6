use std::pin::{Pin, pin};
use std::sync::Arc;
use std::time::Duration;

use qed_model::{
    ErrorKind as ModelErrorKind, ModelFinishReason, ModelMessage,
    ModelOptions, ModelProvider, ModelRequest, ModelResponseEvent,
    ModelResponseExt,
};
use tracing::Instrument;

use crate::error::{Error, ErrorKind};

type SendRequestResult = Result<ModelClientResponse, Error>;
type BoxedSendRequestFuture =
    Pin<Box<dyn Future<Output = SendRequestResult> + Send>>;
#[rustfmt::skip]
type HandlerFn = Arc<
    dyn Fn(ModelRequest, Box<dyn Fn(String) + Send + 'static>)
        -> BoxedSendRequestFuture + Send + Sync
>;

/// A type-erased handle to a model provider.
///
/// Cloning is cheap, all clones share the same provider.
#[derive(Clone)]
pub struct ModelClient {
    handler_fn: HandlerFn,
    timeout: Option<Duration>,
}

impl ModelClient {
    /// Wraps a provider.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(provider: P) -> Self {
        let provider_name = provider.name();
        let handler_fn: HandlerFn = Arc::new(move |req, on_token| {
            let fut = provider.send_request(&req);
            Box::pin(
                async move {
                    trace!("got a request: {:?}", req);
                    let resp_or_err = fut.await;
                    handle_response::<P>(resp_or_err, on_token).await
                }
                .instrument(trace_span!(
                    "model client req",
                    provider = provider_name
                )),
            )
        });
        Self {
            handler_fn,
            timeout: None,
        }
    }

    /// Bounds every call to the given duration. A call that runs over
    /// fails with [`qed_model::ErrorKind::Timeout`].
    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends a request and returns the complete response, calling
    /// `on_token` with every text delta as it arrives.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. The response stops streaming further
    /// events when this operation is cancelled.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_token: impl Fn(String) + Send + 'static,
    ) -> Result<ModelClientResponse, Error> {
        let fut = (self.handler_fn)(req, Box::new(on_token));
        let Some(timeout) = self.timeout else {
            return fut.await;
        };
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("model request timed out after {timeout:?}");
                Err(Error::new(
                    format!(
                        "Model request timed out after {}s",
                        timeout.as_secs_f32()
                    ),
                    ErrorKind::Model(ModelErrorKind::Timeout),
                ))
            }
        }
    }

    /// Runs one completion with the given system prompt and history, and
    /// returns the generated text.
    pub async fn complete(
        &self,
        system_prompt: &str,
        turns: Vec<ModelMessage>,
        options: ModelOptions,
    ) -> Result<String, Error> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ModelMessage::System(system_prompt.to_owned()));
        messages.extend(turns);
        let resp = self
            .send_request(ModelRequest { messages, options }, |_| {})
            .await?;
        if resp.finish_reason == Some(ModelFinishReason::Length) {
            debug!("completion was cut at the token limit");
        }
        Ok(resp.transcript)
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelClientResponse {
    /// The concatenated text deltas.
    pub transcript: String,
    /// The reason the model finished generating.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider + 'static>(
    resp_or_err: Result<P::Response, P::Error>,
    on_token: Box<dyn Fn(String) + Send + 'static>,
) -> SendRequestResult {
    let resp = match resp_or_err {
        Ok(resp) => resp,
        Err(err) => {
            error!("got an error: {err:?}");
            return Err(Error::from_provider(&err));
        }
    };

    let mut transcript = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut resp = pin!(resp);
    loop {
        let event = match resp.as_mut().next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(Error::from_provider(&err));
            }
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
                on_token(msg);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        finish_reason,
    })
}
