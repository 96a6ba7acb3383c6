//! The decompose-then-coach pipeline.

use qed_model::{ImageContent, ModelMessage, ModelOptions};
use serde::Deserialize;
use tracing::Instrument;

use crate::agent_output::AgentOutput;
use crate::conversation::{Turn, to_model_messages};
use crate::emitter::{Emitter, ErrorBody};
use crate::error::Error;
use crate::event::{CompletePayload, ErrorPayload, StreamEvent};
use crate::model_client::ModelClient;
use crate::prompts::AgentRole;

/// The turn appended when the student asks for the full solution.
pub const SOLUTION_REQUEST: &str =
    "The student has requested to see the full solution. \
     Please provide a complete solution outline now.";

/// An inbound coaching request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachRequest {
    /// The problem statement of a fresh problem.
    #[serde(default)]
    pub problem: Option<String>,
    /// A picture of a fresh problem, as a data URI.
    #[serde(default)]
    pub image: Option<String>,
    /// The conversation so far.
    #[serde(default)]
    pub messages: Option<Vec<Turn>>,
    /// Whether the student gave up and wants the solution.
    #[serde(default)]
    pub request_solution: bool,
}

/// What a request asks the coach to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoachPlan {
    /// Decompose a new problem, then open the coaching session.
    Fresh {
        /// The problem statement, may be empty.
        problem: String,
        /// The decoded image, `None` if absent or malformed.
        image: Option<ImageContent>,
    },
    /// Reply within an ongoing conversation.
    Continue {
        /// The history to continue from.
        turns: Vec<Turn>,
        /// Whether to reveal the full solution.
        request_solution: bool,
    },
}

impl CoachPlan {
    /// Decides what to do with a request, `None` if it holds neither a
    /// problem nor a history.
    ///
    /// Empty strings and an empty history count as absent.
    pub fn from_request(req: CoachRequest) -> Option<Self> {
        let problem = req.problem.unwrap_or_default();
        let image = req.image.unwrap_or_default();
        let turns = req.messages.unwrap_or_default();
        if turns.is_empty() {
            if problem.is_empty() && image.is_empty() {
                return None;
            }
            return Some(CoachPlan::Fresh {
                problem,
                image: ImageContent::from_data_uri(&image),
            });
        }
        Some(CoachPlan::Continue {
            turns,
            request_solution: req.request_solution,
        })
    }
}

/// The two-phase coaching orchestrator.
#[derive(Clone)]
pub struct Coach {
    client: ModelClient,
    options: ModelOptions,
}

impl Coach {
    /// Creates a coach that calls the given client.
    #[inline]
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            options: ModelOptions::default(),
        }
    }

    /// Overrides the sampling options of every model call.
    #[inline]
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Handles one request, writing its whole response to `emitter`.
    pub async fn handle(&self, req: CoachRequest, mut emitter: Emitter) {
        async move {
            let Some(plan) = CoachPlan::from_request(req) else {
                emitter.reject(
                    400,
                    ErrorBody::new(
                        "Invalid request",
                        "Either problem, image, or messages must be provided",
                    ),
                );
                return;
            };
            let result = match plan {
                CoachPlan::Fresh { problem, image } => {
                    self.start(&problem, image, &mut emitter).await
                }
                CoachPlan::Continue {
                    turns,
                    request_solution,
                } => self.reply(turns, request_solution, &mut emitter).await,
            };
            if let Err(err) = result {
                error!("coaching failed: {err}");
                emitter
                    .fail(
                        500,
                        ErrorBody::new("An error occurred", err.message()),
                        StreamEvent::Error(ErrorPayload {
                            error: err.message().to_owned(),
                            details: None,
                            message: Some("An error occurred".to_owned()),
                        }),
                    )
                    .await;
            }
        }
        .instrument(info_span!("coach"))
        .await
    }

    async fn start(
        &self,
        problem: &str,
        image: Option<ImageContent>,
        emitter: &mut Emitter,
    ) -> Result<(), Error> {
        emitter
            .emit(StreamEvent::progress("Analyzing problem...", 1, 3))
            .await?;
        let request = if problem.is_empty() {
            "Please decompose the problem shown in this image.".to_owned()
        } else {
            format!("Please decompose this problem:\n\n{problem}")
        };
        let raw = self
            .client
            .complete(
                AgentRole::Decomposer.prompt(),
                vec![ModelMessage::user_with_image(request, image.clone())],
                self.options.clone(),
            )
            .await?;

        emitter
            .emit(StreamEvent::progress(
                "Decomposing problem structure...",
                2,
                3,
            ))
            .await?;
        let decomposition = AgentOutput::parse(&raw);
        if let AgentOutput::Unparsed(_) = decomposition {
            debug!("decomposition is not JSON, passing it on as raw text");
        }

        emitter
            .emit(StreamEvent::progress("Preparing coaching session...", 3, 3))
            .await?;
        let context = format!(
            "Problem: {}\n\nProblem Breakdown:\n{raw}\n\n\
             Start coaching the student through this problem step by step. \
             Begin with the first step.",
            if problem.is_empty() { "See image" } else { problem },
        );
        let message = self
            .client
            .complete(
                AgentRole::Coach.prompt(),
                vec![ModelMessage::user_with_image(context, image)],
                self.options.clone(),
            )
            .await?;

        emitter
            .emit(StreamEvent::Complete(CompletePayload::Coaching {
                message,
                decomposition: Some(decomposition),
            }))
            .await
    }

    async fn reply(
        &self,
        mut turns: Vec<Turn>,
        request_solution: bool,
        emitter: &mut Emitter,
    ) -> Result<(), Error> {
        let progress = if request_solution {
            turns.push(Turn::user(SOLUTION_REQUEST));
            "Generating full solution..."
        } else {
            "Thinking..."
        };
        emitter.emit(StreamEvent::progress(progress, 1, 1)).await?;
        let message = self
            .client
            .complete(
                AgentRole::Coach.prompt(),
                to_model_messages(&turns),
                self.options.clone(),
            )
            .await?;
        emitter
            .emit(StreamEvent::Complete(CompletePayload::Coaching {
                message,
                decomposition: None,
            }))
            .await
    }
}
