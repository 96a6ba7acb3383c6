use serde::Deserialize;
use serde_json::Number;

/// An event reported by the rendering service.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceEvent {
    /// The render is advancing.
    Progress {
        /// What the service is doing.
        #[serde(default)]
        message: String,
        /// How far along it is.
        #[serde(default)]
        percentage: Option<Number>,
    },
    /// The video is ready.
    Complete {
        /// Path of the video relative to the service base URL.
        #[serde(default)]
        video_url: String,
        /// Identifier of the video.
        #[serde(default)]
        video_id: String,
        /// Whether narration audio was synthesized. Absent or null means
        /// it was not.
        #[serde(default)]
        has_audio: Option<bool>,
    },
    /// The render failed.
    Error {
        /// What went wrong.
        #[serde(default)]
        error: Option<String>,
        /// Whether regenerating the scene may help, if the service knows.
        #[serde(default)]
        retriable: Option<bool>,
    },
    /// A diagnostic line from the service.
    Log {
        /// The log line.
        #[serde(default)]
        message: String,
    },
}

const DATA_PREFIX: &[u8] = b"data: ";

/// Incremental decoder for the rendering service's event stream.
///
/// Bytes are buffered until a blank line closes a frame, so frames and
/// characters split across chunks decode correctly. Lines may end with
/// either `\n` or `\r\n`. Frames that are not `data: ` lines holding a
/// known JSON event are skipped.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    /// Appends a chunk and returns the events of every frame it
    /// completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ServiceEvent> {
        self.buf.extend_from_slice(chunk);
        let mut events = vec![];
        while let Some((end, next)) = frame_boundary(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..next).collect();
            events.extend(decode_frame(&frame[..end]));
        }
        events
    }

    /// Decodes whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<ServiceEvent> {
        let rest = std::mem::take(&mut self.buf);
        decode_frame(&rest)
    }
}

/// Finds the first blank line. Returns where the frame before it ends
/// and where the next frame starts.
fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    buf.iter().enumerate().find_map(|(idx, &byte)| {
        if byte != b'\n' {
            return None;
        }
        match &buf[idx + 1..] {
            [b'\n', ..] => Some((idx, idx + 2)),
            [b'\r', b'\n', ..] => Some((idx, idx + 3)),
            _ => None,
        }
    })
}

fn decode_frame(frame: &[u8]) -> Option<ServiceEvent> {
    let payload = frame.trim_ascii_end().strip_prefix(DATA_PREFIX)?;
    match serde_json::from_slice(payload) {
        Ok(event) => Some(event),
        Err(err) => {
            trace!("skipping undecodable frame: {err}");
            None
        }
    }
}
