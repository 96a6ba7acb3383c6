//! Wire types for the Anthropic Messages API.

use qed_model::{ContentPart, ModelMessage, ModelRequest};
use serde::{Deserialize, Serialize};

/// Request body for the Messages API.
#[derive(Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub temperature: f32,
}

/// A single message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: MessageContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<InputBlock>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InputBlock {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: &'static str,
    pub media_type: String,
    pub data: String,
}

/// Response from the Messages API.
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
}

/// A content block in the response.
#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: Option<String>,
}

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
}

impl MessagesResponse {
    /// Extract the text content from the first text block, if any.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.content_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

/// Builds the wire request. System messages are lifted into the
/// top-level `system` field, the API rejects them inline.
pub fn create_request(req: &ModelRequest, model: &str) -> MessagesRequest {
    let messages = req
        .messages
        .iter()
        .filter_map(|msg| match msg {
            ModelMessage::System(_) => None,
            ModelMessage::User(parts) => Some(Message {
                role: "user",
                content: create_user_content(parts),
            }),
            ModelMessage::Assistant(text) => Some(Message {
                role: "assistant",
                content: MessageContent::Text(text.clone()),
            }),
        })
        .collect();
    MessagesRequest {
        model: req.options.model.clone().unwrap_or_else(|| model.to_owned()),
        max_tokens: req.options.max_tokens_or_default(),
        messages,
        system: req.system_prompt(),
        temperature: req.options.temperature_or_default(),
    }
}

fn create_user_content(parts: &[ContentPart]) -> MessageContent {
    if let [ContentPart::Text(text)] = parts {
        return MessageContent::Text(text.clone());
    }
    MessageContent::Blocks(
        parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => {
                    InputBlock::Text { text: text.clone() }
                }
                ContentPart::Image(image) => InputBlock::Image {
                    source: ImageSource {
                        source_type: "base64",
                        media_type: image.media_type.clone(),
                        data: image.data.clone(),
                    },
                },
            })
            .collect(),
    )
}
