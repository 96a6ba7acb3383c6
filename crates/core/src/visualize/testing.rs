//! Scripted collaborators for the orchestrator tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use qed_render::{
    Error as RenderError, ErrorKind as RenderErrorKind, RenderBody,
    RenderRequest, RenderService,
};

use super::{CodeGenerator, GeneratedScene, GenerationRequest};
use crate::error::{Error, ErrorKind};

/// A render body replaying canned chunks.
#[derive(Debug, Default)]
pub struct ScriptedBody {
    chunks: VecDeque<Bytes>,
    error: Option<String>,
    stalled: bool,
}

impl ScriptedBody {
    pub fn from_chunks(chunks: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Bytes::from).collect(),
            ..Default::default()
        }
    }

    /// A body holding one `data:` frame per event.
    pub fn from_events(
        events: impl IntoIterator<Item = serde_json::Value>,
    ) -> Self {
        Self {
            chunks: events
                .into_iter()
                .map(|event| Bytes::from(format!("data: {event}\n\n")))
                .collect(),
            ..Default::default()
        }
    }

    /// Fails with a transport error once the chunks are consumed.
    pub fn with_error(mut self, message: &str) -> Self {
        self.error = Some(message.to_owned());
        self
    }

    /// A body that never yields anything.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Default::default()
        }
    }
}

impl RenderBody for ScriptedBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RenderError> {
        if let Some(chunk) = self.chunks.pop_front() {
            return Ok(Some(chunk));
        }
        if self.stalled {
            std::future::pending::<()>().await;
        }
        match self.error.take() {
            Some(message) => {
                Err(RenderError::new(message, RenderErrorKind::Transport))
            }
            None => Ok(None),
        }
    }
}

/// How the fake service answers one submission.
#[derive(Debug)]
pub enum Submission {
    Accept(ScriptedBody),
    Reject { status: u16, message: &'static str },
    Unreachable,
}

/// A rendering service answering submissions from a script.
#[derive(Clone, Default)]
pub struct FakeRenderService {
    script: Arc<Mutex<VecDeque<Submission>>>,
    received: Arc<Mutex<Vec<RenderRequest>>>,
}

impl FakeRenderService {
    pub fn with_script(script: impl IntoIterator<Item = Submission>) -> Self {
        let service = Self::default();
        service.script.lock().unwrap().extend(script);
        service
    }

    pub fn received(&self) -> Vec<RenderRequest> {
        self.received.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl RenderService for FakeRenderService {
    type Body = ScriptedBody;

    fn submit(
        &self,
        req: &RenderRequest,
    ) -> impl Future<Output = Result<Self::Body, RenderError>> + Send + 'static
    {
        self.received.lock().unwrap().push(req.clone());
        let next = self.script.lock().unwrap().pop_front();
        async move {
            match next {
                Some(Submission::Accept(body)) => Ok(body),
                Some(Submission::Reject { status, message }) => {
                    Err(RenderError::new(
                        message,
                        RenderErrorKind::Rejected { status },
                    ))
                }
                Some(Submission::Unreachable) | None => Err(RenderError::new(
                    "error sending request for url (http://render.test/generate-dynamic)",
                    RenderErrorKind::Transport,
                )),
            }
        }
    }

    fn artifact_url(&self, relative: &str) -> String {
        format!("http://render.test{relative}")
    }
}

/// A generator numbering its scenes, optionally failing.
#[derive(Default)]
pub struct CountingGenerator {
    received: Mutex<Vec<GenerationRequest>>,
    failure: Option<&'static str>,
}

impl CountingGenerator {
    pub fn failing(message: &'static str) -> Self {
        Self {
            failure: Some(message),
            ..Default::default()
        }
    }

    pub fn received(&self) -> Vec<GenerationRequest> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeGenerator for CountingGenerator {
    async fn generate(
        &self,
        req: &GenerationRequest,
    ) -> Result<GeneratedScene, Error> {
        let n = {
            let mut received = self.received.lock().unwrap();
            received.push(req.clone());
            received.len()
        };
        if let Some(message) = self.failure {
            return Err(Error::new(message, ErrorKind::Generation));
        }
        Ok(GeneratedScene {
            code: format!("scene {n}"),
            explanation: format!("narration {n}"),
        })
    }
}
