use crate::content::{ContentPart, ImageContent};

/// A request to be sent to the model provider.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelRequest {
    /// The input messages, system instructions first.
    pub messages: Vec<ModelMessage>,
    /// Sampling options. Unset fields fall back to provider defaults.
    pub options: ModelOptions,
}

impl ModelRequest {
    /// Returns the concatenated system instructions, if any.
    ///
    /// Some backends take the system prompt as a separate field rather
    /// than as a message, they should use this instead of scanning the
    /// message list themselves.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter_map(|msg| match msg {
                ModelMessage::System(text) => Some(text.as_str()),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }
}

/// A complete message.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelMessage {
    /// The system instructions.
    System(String),
    /// A user input, which may mix text and images.
    User(Vec<ContentPart>),
    /// An assistant text.
    Assistant(String),
}

impl ModelMessage {
    /// Creates a text-only user message.
    #[inline]
    pub fn user_text<S: Into<String>>(text: S) -> Self {
        ModelMessage::User(vec![ContentPart::Text(text.into())])
    }

    /// Creates a user message with a text and an optional image.
    pub fn user_with_image<S: Into<String>>(
        text: S,
        image: Option<ImageContent>,
    ) -> Self {
        let mut parts = vec![ContentPart::Text(text.into())];
        if let Some(image) = image {
            parts.push(ContentPart::Image(image));
        }
        ModelMessage::User(parts)
    }
}

/// Sampling options of a request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelOptions {
    /// Overrides the model configured on the provider.
    pub model: Option<String>,
    /// Upper bound of generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl ModelOptions {
    /// The `max_tokens` used when a request leaves it unset.
    pub const DEFAULT_MAX_TOKENS: u32 = 4096;
    /// The `temperature` used when a request leaves it unset.
    pub const DEFAULT_TEMPERATURE: f32 = 1.0;

    /// Returns `max_tokens`, or the default.
    #[inline]
    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(Self::DEFAULT_MAX_TOKENS)
    }

    /// Returns `temperature`, or the default.
    #[inline]
    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE)
    }
}
