use std::error::Error;

use crate::error::ErrorKind;
use crate::request::ModelRequest;
use crate::response::ModelResponse;

/// The error type for a model provider.
pub trait ModelProviderError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A completion backend: takes a system prompt plus conversation
/// history and produces generated text as a stream of events.
///
/// Once the provider is created, it should behave like a stateless
/// object. Every request carries the full history it continues from,
/// so the provider must never remember anything between requests.
pub trait ModelProvider: Send + Sync {
    /// The error type that may be returned by the provider.
    type Error: ModelProviderError;

    /// The response type for this provider.
    type Response: ModelResponse<Error = Self::Error>;

    /// A short, stable name of the backend, used in diagnostics.
    fn name(&self) -> &'static str;

    /// Sends a request to the model.
    ///
    /// The returned future must not borrow `self` or `req`, so callers
    /// can move it onto another task or wrap it in a deadline.
    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static;
}
