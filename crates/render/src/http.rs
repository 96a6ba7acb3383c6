use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Client, Response};
use serde::Deserialize;

use crate::{Error, ErrorKind, RenderBody, RenderRequest, RenderService};

/// Builder for [`RenderConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderConfigBuilder {
    base_url: Option<String>,
}

impl RenderConfigBuilder {
    /// Sets the service base URL.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Builds the configuration.
    ///
    /// `localhost` is rewritten to `127.0.0.1`.
    pub fn build(self) -> RenderConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| RenderConfig::DEFAULT_BASE_URL.to_owned())
            .replacen("localhost", "127.0.0.1", 1);
        RenderConfig {
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }
}

/// Configuration for [`HttpRenderService`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderConfig {
    base_url: String,
}

impl RenderConfig {
    /// The endpoint used when none is configured.
    pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";

    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// A rendering service reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpRenderService {
    client: Client,
    config: Arc<RenderConfig>,
}

impl HttpRenderService {
    /// Creates a service client with the given configuration.
    #[inline]
    pub fn new(config: RenderConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }
}

impl RenderService for HttpRenderService {
    type Body = HttpRenderBody;

    fn submit(
        &self,
        req: &RenderRequest,
    ) -> impl Future<Output = Result<Self::Body, Error>> + Send + 'static {
        let url = format!("{}/generate-dynamic", self.config.base_url);
        debug!("submitting render job to {url}");
        let resp_fut = self.client.post(url).json(req).send();

        async move {
            let resp = resp_fut.await?;
            let status = resp.status();
            debug!("render service answered {status}");
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::new(
                    rejection_message(status.as_u16(), &body),
                    ErrorKind::Rejected {
                        status: status.as_u16(),
                    },
                ));
            }
            Ok(HttpRenderBody(resp))
        }
    }

    fn artifact_url(&self, relative: &str) -> String {
        format!("{}{}", self.config.base_url, relative)
    }
}

/// The body of an accepted render job.
pub struct HttpRenderBody(Response);

impl Debug for HttpRenderBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HttpRenderBody").field(&self.0.url()).finish()
    }
}

impl RenderBody for HttpRenderBody {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        Ok(self.0.chunk().await?)
    }
}

#[derive(Deserialize)]
struct RejectionBody {
    error: Option<String>,
}

fn rejection_message(status: u16, body: &str) -> String {
    serde_json::from_str::<RejectionBody>(body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| format!("Render service error {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RenderConfigBuilder::default().build();
        assert_eq!(config.base_url(), "http://127.0.0.1:5001");
    }

    #[test]
    fn test_localhost_rewrite() {
        let config = RenderConfigBuilder::default()
            .with_base_url("http://localhost:5001/")
            .build();
        assert_eq!(config.base_url(), "http://127.0.0.1:5001");

        let service = HttpRenderService::new(config);
        assert_eq!(
            service.artifact_url("/videos/abc.mp4"),
            "http://127.0.0.1:5001/videos/abc.mp4"
        );
    }

    #[test]
    fn test_rejection_message() {
        assert_eq!(
            rejection_message(
                500,
                r#"{"error":"Manim generation failed: bad scene"}"#
            ),
            "Manim generation failed: bad scene"
        );
        assert_eq!(
            rejection_message(502, "<html>Bad Gateway</html>"),
            "Render service error 502"
        );
        assert_eq!(
            rejection_message(503, r#"{"error":""}"#),
            "Render service error 503"
        );
    }

    #[test]
    fn test_request_body() {
        let req = RenderRequest {
            code: "class Scene1(Scene): pass".to_owned(),
            narration: "We plot the line.".to_owned(),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            serde_json::json!({
                "code": "class Scene1(Scene): pass",
                "narration": "We plot the line.",
            })
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // Nothing listens on the discard port.
        let service = HttpRenderService::new(
            RenderConfigBuilder::default()
                .with_base_url("http://127.0.0.1:9")
                .build(),
        );
        let err = service
            .submit(&RenderRequest {
                code: String::new(),
                narration: String::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
