use std::future::poll_fn;
use std::pin::Pin;
use std::task::{self, Poll};

use serde::{Deserialize, Serialize};

use crate::provider::ModelProviderError;

/// A completion in flight, read one event at a time.
pub trait ModelResponse: Sized + Send + 'static {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// Polls for the next event of the completion.
    ///
    /// Returns `Ok(Some(event))` while the completion produces text,
    /// `Ok(None)` once it is over, and `Err` when the backend fails
    /// midway. `Pending` registers the task for wakeup as usual.
    ///
    /// A response that has returned `None` or an error keeps returning
    /// `None`.
    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>>;
}

/// Async helpers over [`ModelResponse`].
pub trait ModelResponseExt: ModelResponse {
    /// Waits for the next event.
    fn next_event(
        self: Pin<&mut Self>,
    ) -> impl Future<Output = Result<Option<ModelResponseEvent>, Self::Error>> + Send
    {
        let mut this = self;
        poll_fn(move |cx| this.as_mut().poll_next_event(cx))
    }
}

impl<R: ModelResponse> ModelResponseExt for R {}

/// Why the model stopped generating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFinishReason {
    /// The model ended its answer.
    Stop,
    /// The output was cut at the token limit.
    Length,
}

/// An event of a completion.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelResponseEvent {
    /// The completion is over.
    Completed(ModelFinishReason),
    /// A piece of generated text.
    MessageDelta(String),
}
