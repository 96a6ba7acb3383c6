//! The HTTP surface of the tutoring backend.

#[macro_use]
extern crate tracing;

pub mod config;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use qed_anthropic_model::AnthropicProvider;
use qed_core::advisor::Advisor;
use qed_core::visualize::{ModelCodeGenerator, Visualizer};
use qed_core::{Coach, ModelClient};
use qed_openai_model::OpenAIProvider;
use qed_render::HttpRenderService;

pub use config::{ProviderConfig, ServerConfig};
pub use routes::router;

/// Shared state of the request handlers.
#[derive(Clone)]
pub struct AppState {
    coach: Coach,
    advisor: Advisor,
    visualizer: Arc<Visualizer<HttpRenderService>>,
}

impl AppState {
    /// Wires the orchestrators to a model client and a render service.
    pub fn new(
        client: ModelClient,
        render: HttpRenderService,
        render_stall_timeout: Option<Duration>,
    ) -> Self {
        let generator = Arc::new(ModelCodeGenerator::new(client.clone()));
        let mut visualizer = Visualizer::new(generator, render);
        if let Some(timeout) = render_stall_timeout {
            visualizer = visualizer.with_stall_timeout(timeout);
        }
        Self {
            coach: Coach::new(client.clone()),
            advisor: Advisor::new(client),
            visualizer: Arc::new(visualizer),
        }
    }

    /// Builds the state described by `config`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let mut client = match &config.provider {
            ProviderConfig::Anthropic(anthropic) => {
                ModelClient::new(AnthropicProvider::new(anthropic.clone()))
            }
            ProviderConfig::OpenAI(openai) => {
                ModelClient::new(OpenAIProvider::new(openai.clone()))
            }
        };
        if let Some(timeout) = config.model_timeout {
            client = client.with_timeout(timeout);
        }
        Self::new(
            client,
            HttpRenderService::new(config.render.clone()),
            config.render_stall_timeout,
        )
    }
}

/// Serves the API until the listener fails.
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let state = AppState::from_config(&config);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(
        "listening on {}, render service at {}",
        config.listen_addr,
        config.render.base_url()
    );
    axum::serve(listener, router(state))
        .await
        .context("server exited")
}
