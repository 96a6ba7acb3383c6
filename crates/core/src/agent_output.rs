//! Best-effort parsing of structured agent output.

use serde::{Serialize, Serializer};
use serde_json::{Value, json};

/// The output of an agent that was asked to answer in JSON.
///
/// Models do not always comply, so parsing never fails: text that is not
/// JSON is kept verbatim.
#[derive(Clone, Debug, PartialEq)]
pub enum AgentOutput {
    /// The text was well-formed JSON.
    Parsed(Value),
    /// The text was not JSON.
    Unparsed(String),
}

impl AgentOutput {
    /// Parses the whole text as JSON.
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => AgentOutput::Parsed(value),
            Err(_) => AgentOutput::Unparsed(text.to_owned()),
        }
    }

    /// Like [`parse`](Self::parse), but also accepts JSON wrapped in a
    /// fenced code block.
    pub fn parse_lenient(text: &str) -> Self {
        let output = Self::parse(text.trim());
        if matches!(output, AgentOutput::Parsed(_)) {
            return output;
        }
        let parsed = fenced_block(text)
            .and_then(|block| serde_json::from_str(block.body).ok());
        match parsed {
            Some(value) => AgentOutput::Parsed(value),
            None => AgentOutput::Unparsed(text.to_owned()),
        }
    }

    /// Returns the parsed value, if any.
    #[inline]
    pub fn parsed(&self) -> Option<&Value> {
        match self {
            AgentOutput::Parsed(value) => Some(value),
            AgentOutput::Unparsed(_) => None,
        }
    }

    /// Converts into the value sent to clients, `{"raw": text}` for
    /// output that didn't parse.
    pub fn to_value(&self) -> Value {
        match self {
            AgentOutput::Parsed(value) => value.clone(),
            AgentOutput::Unparsed(raw) => json!({ "raw": raw }),
        }
    }
}

impl Serialize for AgentOutput {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A fenced code block found in model output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct FencedBlock<'a> {
    /// The text between the fences.
    pub body: &'a str,
    /// Where the opening fence starts.
    pub start: usize,
    /// Where the closing fence ends.
    pub end: usize,
}

/// Finds the first complete fenced code block. The info string after the
/// opening fence is skipped.
pub(crate) fn fenced_block(text: &str) -> Option<FencedBlock<'_>> {
    let start = text.find("```")?;
    let after_fence = start + 3;
    let line_end = text[after_fence..].find('\n')? + after_fence;
    let body_start = line_end + 1;
    let close = text[body_start..].find("```")? + body_start;
    Some(FencedBlock {
        body: text[body_start..close].trim_end_matches(['\n', '\r']),
        start,
        end: close + 3,
    })
}
