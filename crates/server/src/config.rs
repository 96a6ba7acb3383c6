//! Server configuration, read from the environment.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, bail};
use qed_anthropic_model::{AnthropicConfig, AnthropicConfigBuilder};
use qed_openai_model::{OpenAIConfig, OpenAIConfigBuilder};
use qed_render::{RenderConfig, RenderConfigBuilder};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// The completion backend to use.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderConfig {
    /// The Anthropic Messages API.
    Anthropic(AnthropicConfig),
    /// An OpenAI-compatible chat completions API.
    OpenAI(OpenAIConfig),
}

/// Everything the server needs to start.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
    /// The completion backend.
    pub provider: ProviderConfig,
    /// The rendering service.
    pub render: RenderConfig,
    /// Deadline of a single model call.
    pub model_timeout: Option<Duration>,
    /// How long a render stream may stay silent.
    pub render_stall_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    #[inline]
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as
    /// unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = var("QED_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_owned());
        let listen_addr = listen_addr.parse().with_context(|| {
            format!("invalid QED_LISTEN_ADDR: {listen_addr}")
        })?;

        let provider = match var("QED_MODEL_PROVIDER").as_deref() {
            None | Some("anthropic") => {
                let Some(api_key) = var("ANTHROPIC_API_KEY") else {
                    bail!("ANTHROPIC_API_KEY environment variable is not set");
                };
                let mut builder = AnthropicConfigBuilder::with_api_key(api_key);
                if let Some(base_url) = var("ANTHROPIC_BASE_URL") {
                    builder = builder.with_base_url(base_url);
                }
                if let Some(model) = var("ANTHROPIC_MODEL") {
                    builder = builder.with_model(model);
                }
                ProviderConfig::Anthropic(builder.build())
            }
            Some("openai") => {
                let Some(api_key) = var("OPENAI_API_KEY") else {
                    bail!("OPENAI_API_KEY environment variable is not set");
                };
                let mut builder = OpenAIConfigBuilder::with_api_key(api_key);
                if let Some(base_url) = var("OPENAI_BASE_URL") {
                    builder = builder.with_base_url(base_url);
                }
                if let Some(model) = var("OPENAI_MODEL") {
                    builder = builder.with_model(model);
                }
                ProviderConfig::OpenAI(builder.build())
            }
            Some(other) => bail!("unknown QED_MODEL_PROVIDER: {other}"),
        };

        let mut render = RenderConfigBuilder::default();
        if let Some(base_url) = var("MANIM_SERVICE_URL") {
            render = render.with_base_url(base_url);
        }

        let model_timeout =
            seconds(var("QED_MODEL_TIMEOUT_SECS"), "QED_MODEL_TIMEOUT_SECS")?;
        let render_stall_timeout =
            seconds(var("QED_RENDER_STALL_SECS"), "QED_RENDER_STALL_SECS")?;

        Ok(Self {
            listen_addr,
            provider,
            render: render.build(),
            model_timeout,
            render_stall_timeout,
        })
    }
}

fn seconds(
    value: Option<String>,
    key: &str,
) -> anyhow::Result<Option<Duration>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("invalid {key}: {value}"))?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[("ANTHROPIC_API_KEY", "sk-ant")]).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:3000".parse().unwrap());
        let ProviderConfig::Anthropic(anthropic) = &config.provider else {
            panic!("expected the anthropic provider");
        };
        assert_eq!(anthropic.model(), "claude-sonnet-4-20250514");
        assert_eq!(config.render.base_url(), "http://127.0.0.1:5001");
        assert_eq!(config.model_timeout, None);
        assert_eq!(config.render_stall_timeout, None);
    }

    #[test]
    fn test_openai_provider() {
        let config = config(&[
            ("QED_MODEL_PROVIDER", "openai"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1"),
            ("MANIM_SERVICE_URL", "http://localhost:5001"),
            ("QED_MODEL_TIMEOUT_SECS", "60"),
            ("QED_RENDER_STALL_SECS", "0"),
        ])
        .unwrap();
        let ProviderConfig::OpenAI(openai) = &config.provider else {
            panic!("expected the openai provider");
        };
        assert_eq!(openai.base_url(), "http://localhost:8080/v1");
        assert_eq!(config.render.base_url(), "http://127.0.0.1:5001");
        assert_eq!(config.model_timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.render_stall_timeout, None);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[]).is_err());
        assert!(config(&[("QED_MODEL_PROVIDER", "openai")]).is_err());
        assert!(config(&[("QED_MODEL_PROVIDER", "gemini")]).is_err());
        let key = ("ANTHROPIC_API_KEY", "k");
        assert!(config(&[key, ("QED_LISTEN_ADDR", "nowhere")]).is_err());
        assert!(config(&[key, ("QED_MODEL_TIMEOUT_SECS", "soon")]).is_err());
    }
}
