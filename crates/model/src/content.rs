use serde::{Deserialize, Serialize};

/// A piece of user content.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentPart {
    /// Plain text.
    Text(String),
    /// An inline image.
    Image(ImageContent),
}

/// A base64-encoded image together with its media type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageContent {
    /// The media type, e.g. `image/png`.
    #[serde(rename = "mediaType")]
    pub media_type: String,
    /// The base64 payload, without the data URI prefix.
    pub data: String,
}

impl ImageContent {
    /// Parses a data URI of the form `data:<mediatype>;base64,<data>`.
    ///
    /// Returns `None` for anything that doesn't match that shape. The
    /// media type extends to the last `;base64,` marker, and neither
    /// half may be empty or contain a line break.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        if rest.contains(['\n', '\r']) {
            return None;
        }
        let marker = ";base64,";
        let idx = rest.rfind(marker)?;
        let media_type = &rest[..idx];
        let data = &rest[idx + marker.len()..];
        if media_type.is_empty() || data.is_empty() {
            return None;
        }
        Some(Self {
            media_type: media_type.to_owned(),
            data: data.to_owned(),
        })
    }

    /// Formats the image back into a data URI.
    #[inline]
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}
