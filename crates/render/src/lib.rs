//! Interface to the external animation rendering service.
//!
//! The service accepts generated scene code together with narration text
//! and answers with a server-sent event stream describing the render.
//! Decoding that stream is left to the caller, this crate only moves bytes.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod http;

use bytes::Bytes;
use serde::Serialize;

pub use error::{Error, ErrorKind};
pub use http::{
    HttpRenderBody, HttpRenderService, RenderConfig, RenderConfigBuilder,
};

/// A render job submitted to the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderRequest {
    /// The scene source code.
    pub code: String,
    /// Text to be synthesized as the voice-over.
    pub narration: String,
}

/// The streamed body of an accepted render job.
pub trait RenderBody: Send + 'static {
    /// Reads the next chunk of the body, `None` once it is exhausted.
    fn next_chunk(
        &mut self,
    ) -> impl Future<Output = Result<Option<Bytes>, Error>> + Send;
}

/// A rendering backend.
pub trait RenderService: Send + Sync + 'static {
    /// The body type of accepted jobs.
    type Body: RenderBody;

    /// Submits a job and waits for the response head.
    ///
    /// A non-success status is reported as [`ErrorKind::Rejected`] with
    /// the message the service gave, anything below HTTP as
    /// [`ErrorKind::Transport`].
    fn submit(
        &self,
        req: &RenderRequest,
    ) -> impl Future<Output = Result<Self::Body, Error>> + Send + 'static;

    /// Resolves a path reported by the service into an absolute URL.
    fn artifact_url(&self, relative: &str) -> String;
}
