//! Render-retry orchestration for visual explanations.
//!
//! Each attempt generates scene code, submits it to the rendering
//! service and relays the service's progress to the client. Failures the
//! generated content is to blame for are fed back into the next
//! generation, up to [`MAX_ATTEMPTS`]. Anything else ends the request.

mod classify;
mod frames;
mod generator;
mod relay;
#[cfg(test)]
pub(crate) mod testing;
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use qed_model::ImageContent;
use qed_render::{ErrorKind as RenderErrorKind, RenderRequest, RenderService};
use serde::Deserialize;
use tracing::Instrument;

pub use classify::{Disposition, RETRIABLE_MARKERS, classify};
pub use frames::{FrameDecoder, ServiceEvent};
pub use generator::{
    CodeGenerator, GeneratedScene, GenerationRequest, ModelCodeGenerator,
};
pub use relay::{
    DEFAULT_SERVICE_ERROR, RelayOutcome, RelayStep, RenderArtifact,
    STREAM_ENDED, ServiceFailure, relay, relay_step,
};

use crate::emitter::Emitter;
use crate::error::{Error, ErrorKind};
use crate::event::{CompletePayload, ErrorPayload, StreamEvent};

/// The attempt budget of one request.
pub const MAX_ATTEMPTS: u32 = 3;

/// Hint attached to the error event of a failed visualization.
pub const SELF_CORRECTION_DETAILS: &str =
    "The system attempted to self-correct but failed. \
     Please try a simpler prompt.";

/// Note attached to a video rendered without narration.
pub const NO_AUDIO_DETAILS: &str =
    "Audio generation failed (API key missing or invalid), \
     but video was created successfully.";

/// An inbound visualization request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct VisualizeRequest {
    /// The problem statement.
    #[serde(default)]
    pub problem: Option<String>,
    /// A picture of the problem, as a data URI.
    #[serde(default)]
    pub image: Option<String>,
}

/// A successfully rendered scene.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedScene {
    /// Where the service put the video.
    pub artifact: RenderArtifact,
    /// The narration the video was rendered with.
    pub explanation: String,
}

/// The result of one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The video was rendered.
    Success(RenderedScene),
    /// The generated scene was defective, another attempt may fix it.
    RetriableFailure {
        /// The scene that failed.
        scene: GeneratedScene,
        /// Why it failed.
        error: String,
    },
    /// Nothing more can be done for this request.
    FatalFailure(Error),
}

/// What the next attempt knows about the previous one.
#[derive(Default)]
struct AttemptContext {
    last_scene: GeneratedScene,
    last_error: String,
}

/// The render-retry orchestrator.
pub struct Visualizer<R> {
    generator: Arc<dyn CodeGenerator>,
    service: R,
    stall_timeout: Option<Duration>,
}

impl<R: RenderService> Visualizer<R> {
    /// Creates an orchestrator over the given collaborators.
    #[inline]
    pub fn new(generator: Arc<dyn CodeGenerator>, service: R) -> Self {
        Self {
            generator,
            service,
            stall_timeout: None,
        }
    }

    /// Abandons render streams that stay silent for longer than
    /// `timeout`.
    #[inline]
    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = Some(timeout);
        self
    }

    /// Handles one request, writing its whole response to `emitter`.
    ///
    /// The event stream is opened right away, so every outcome, invalid
    /// input included, is reported as an event.
    pub async fn handle(&self, req: VisualizeRequest, mut emitter: Emitter) {
        async move {
            if emitter.open().is_err() {
                debug!("client went away before the stream opened");
                return;
            }
            let problem = req.problem.unwrap_or_default();
            let image_uri = req.image.unwrap_or_default();
            if problem.is_empty() && image_uri.is_empty() {
                emitter
                    .emit(StreamEvent::error("Problem or image is required"))
                    .await
                    .ok();
                return;
            }
            info!("visualizing problem: {:.100}", problem);
            let image = ImageContent::from_data_uri(&image_uri);

            let event = match self.run(&problem, image, &mut emitter).await {
                Ok(scene) => {
                    info!("visualization ready: {}", scene.artifact.video_id);
                    StreamEvent::Complete(CompletePayload::Visualization {
                        video_url: self
                            .service
                            .artifact_url(&scene.artifact.video_url),
                        video_id: scene.artifact.video_id,
                        explanation: scene.explanation,
                        details: (!scene.artifact.has_audio)
                            .then(|| NO_AUDIO_DETAILS.to_owned()),
                    })
                }
                Err(err) if err.kind() == ErrorKind::Disconnected => {
                    debug!("client disconnected, abandoning visualization");
                    return;
                }
                Err(err) => {
                    error!("visualization failed: {err}");
                    StreamEvent::Error(ErrorPayload {
                        error: err.message().to_owned(),
                        details: Some(SELF_CORRECTION_DETAILS.to_owned()),
                        message: None,
                    })
                }
            };
            emitter.emit(event).await.ok();
        }
        .instrument(info_span!("visualize"))
        .await
    }

    /// Runs attempts until one succeeds, one fails fatally, or the
    /// budget is spent.
    pub async fn run(
        &self,
        problem: &str,
        image: Option<ImageContent>,
        emitter: &mut Emitter,
    ) -> Result<RenderedScene, Error> {
        let mut ctx = AttemptContext::default();
        for index in 1..=MAX_ATTEMPTS {
            let req = GenerationRequest {
                problem: problem.to_owned(),
                image: image.clone(),
                last_error: ctx.last_error.clone(),
                previous_code: ctx.last_scene.code.clone(),
            };
            let outcome = self
                .attempt(index, req, emitter)
                .instrument(info_span!("attempt", index))
                .await;
            match outcome {
                AttemptOutcome::Success(scene) => return Ok(scene),
                AttemptOutcome::RetriableFailure { scene, error } => {
                    warn!("attempt {index}/{MAX_ATTEMPTS} failed: {error}");
                    ctx = AttemptContext {
                        last_scene: scene,
                        last_error: error,
                    };
                }
                AttemptOutcome::FatalFailure(err) => return Err(err),
            }
        }
        Err(Error::new(ctx.last_error, ErrorKind::Render))
    }

    async fn attempt(
        &self,
        index: u32,
        req: GenerationRequest,
        emitter: &mut Emitter,
    ) -> AttemptOutcome {
        let message = if index > 1 {
            format!("Retrying generation (Attempt {index})...")
        } else {
            "Generating code...".to_owned()
        };
        if let Err(err) =
            emitter.emit(StreamEvent::progress(message, 1, 2)).await
        {
            return AttemptOutcome::FatalFailure(err);
        }

        if !req.last_error.is_empty() {
            debug!("regenerating after: {:.100}", req.last_error);
        }
        let scene = match self.generator.generate(&req).await {
            Ok(scene) => scene,
            Err(err) => return AttemptOutcome::FatalFailure(err),
        };
        debug!("generated {} bytes of scene code", scene.code.len());

        let render_req = RenderRequest {
            code: scene.code.clone(),
            narration: scene.explanation.clone(),
        };
        let mut body = match self.service.submit(&render_req).await {
            Ok(body) => body,
            Err(err) => {
                warn!("render submission failed: {err}");
                return match err.kind() {
                    RenderErrorKind::Rejected { .. } => {
                        settle(scene, err.message().to_owned(), None)
                    }
                    RenderErrorKind::Transport => AttemptOutcome::FatalFailure(
                        Error::new(err.message(), ErrorKind::Render),
                    ),
                };
            }
        };

        match relay(&mut body, emitter, self.stall_timeout).await {
            Ok(RelayOutcome::Completed(artifact)) => {
                AttemptOutcome::Success(RenderedScene {
                    artifact,
                    explanation: scene.explanation,
                })
            }
            Ok(RelayOutcome::Failed(failure)) => {
                settle(scene, failure.message, failure.retriable)
            }
            Ok(RelayOutcome::Exhausted) => AttemptOutcome::FatalFailure(
                Error::new(STREAM_ENDED, ErrorKind::Render),
            ),
            Err(err) => AttemptOutcome::FatalFailure(err),
        }
    }
}

fn settle(
    scene: GeneratedScene,
    error: String,
    retriable: Option<bool>,
) -> AttemptOutcome {
    match classify(&error, retriable) {
        Disposition::Retriable => {
            AttemptOutcome::RetriableFailure { scene, error }
        }
        Disposition::Fatal => {
            AttemptOutcome::FatalFailure(Error::new(error, ErrorKind::Render))
        }
    }
}
