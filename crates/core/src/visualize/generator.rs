use async_trait::async_trait;
use qed_model::{ImageContent, ModelMessage, ModelOptions};
use serde::Deserialize;

use crate::agent_output::fenced_block;
use crate::error::{Error, ErrorKind};
use crate::model_client::ModelClient;
use crate::prompts::AgentRole;

/// Input of one code generation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    /// The problem statement, may be empty when an image is given.
    pub problem: String,
    /// A picture of the problem.
    pub image: Option<ImageContent>,
    /// Why the previous attempt failed, empty on the first attempt.
    pub last_error: String,
    /// The code of the previous attempt, empty on the first attempt.
    pub previous_code: String,
}

/// Scene code and its narration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratedScene {
    /// The scene source code.
    pub code: String,
    /// The narration read over the video.
    pub explanation: String,
}

/// Produces scene code for a problem.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Generates a scene, using the failure context of the request as
    /// corrective feedback when present.
    async fn generate(
        &self,
        req: &GenerationRequest,
    ) -> Result<GeneratedScene, Error>;
}

/// A [`CodeGenerator`] backed by the visualizer agent.
#[derive(Clone)]
pub struct ModelCodeGenerator {
    client: ModelClient,
    options: ModelOptions,
}

impl ModelCodeGenerator {
    /// Creates a generator that calls the given client.
    #[inline]
    pub fn new(client: ModelClient) -> Self {
        Self {
            client,
            options: ModelOptions {
                temperature: Some(0.7),
                ..Default::default()
            },
        }
    }
}

#[async_trait]
impl CodeGenerator for ModelCodeGenerator {
    async fn generate(
        &self,
        req: &GenerationRequest,
    ) -> Result<GeneratedScene, Error> {
        let turn = ModelMessage::user_with_image(
            generation_prompt(req),
            req.image.clone(),
        );
        let text = self
            .client
            .complete(
                AgentRole::Visualizer.prompt(),
                vec![turn],
                self.options.clone(),
            )
            .await?;
        parse_scene(&text).ok_or_else(|| {
            warn!("no scene code in model output: {text}");
            Error::new(
                "Model output contained no scene code",
                ErrorKind::Generation,
            )
        })
    }
}

fn generation_prompt(req: &GenerationRequest) -> String {
    let mut prompt = if req.problem.is_empty() {
        "Create a visualization for the problem shown in this image.".to_owned()
    } else {
        format!("Create a visualization for this problem:\n\n{}", req.problem)
    };
    if !req.last_error.is_empty() {
        prompt.push_str("\n\nThe previous attempt failed with this error:\n");
        prompt.push_str(&req.last_error);
    }
    if !req.previous_code.is_empty() {
        prompt.push_str("\n\nCode of the previous attempt:\n```python\n");
        prompt.push_str(&req.previous_code);
        prompt.push_str("\n```");
    }
    if !req.last_error.is_empty() || !req.previous_code.is_empty() {
        prompt.push_str(
            "\n\nFix the problem and answer with the corrected scene.",
        );
    }
    prompt
}

#[derive(Deserialize)]
struct SceneJson {
    code: String,
    #[serde(default)]
    explanation: String,
}

/// Extracts a scene from model output: JSON `{code, explanation}`, bare
/// or fenced, else the first fenced block as code and the prose around
/// it as the explanation.
pub(crate) fn parse_scene(text: &str) -> Option<GeneratedScene> {
    let block = fenced_block(text);
    let json = serde_json::from_str::<SceneJson>(text.trim()).ok().or_else(|| {
        block.and_then(|b| serde_json::from_str::<SceneJson>(b.body).ok())
    });
    if let Some(scene) = json {
        if scene.code.trim().is_empty() {
            return None;
        }
        return Some(GeneratedScene {
            code: scene.code,
            explanation: scene.explanation,
        });
    }

    let block = block?;
    if block.body.trim().is_empty() {
        return None;
    }
    let prose: Vec<&str> = [&text[..block.start], &text[block.end..]]
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    Some(GeneratedScene {
        code: block.body.to_owned(),
        explanation: prose.join("\n\n"),
    })
}
