use std::time::Duration;

use qed_render::RenderBody;

use super::frames::{FrameDecoder, ServiceEvent};
use crate::emitter::Emitter;
use crate::error::{Error, ErrorKind};
use crate::event::{Progress, StreamEvent};

/// Message used when the service reports an error without text.
pub const DEFAULT_SERVICE_ERROR: &str = "Manim generation failed";

/// Message used when the service stream ends without a verdict.
pub const STREAM_ENDED: &str = "Stream ended without completion event";

/// A finished render.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderArtifact {
    /// Path of the video relative to the service base URL.
    pub video_url: String,
    /// Identifier of the video.
    pub video_id: String,
    /// Whether narration audio was synthesized.
    pub has_audio: bool,
}

/// A failure reported in-band by the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceFailure {
    /// What went wrong.
    pub message: String,
    /// The service's own verdict on retrying, if it gave one.
    pub retriable: Option<bool>,
}

/// What to do with one service event.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayStep {
    /// Forward to the client.
    Forward(StreamEvent),
    /// The render succeeded, stop relaying.
    Completed(RenderArtifact),
    /// The render failed, stop relaying.
    Failed(ServiceFailure),
    /// Write to the diagnostic log only.
    Log(String),
}

/// How a relayed stream ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    /// A `complete` event was seen.
    Completed(RenderArtifact),
    /// An `error` event was seen.
    Failed(ServiceFailure),
    /// The body ended with neither.
    Exhausted,
}

/// Maps a service event to what the client should see.
///
/// Progress is reported as the second of two steps, code generation
/// being the first.
pub fn relay_step(event: ServiceEvent) -> RelayStep {
    match event {
        ServiceEvent::Progress {
            message,
            percentage,
        } => RelayStep::Forward(StreamEvent::Progress(Progress {
            message,
            step: 2,
            total_steps: 2,
            percentage,
        })),
        ServiceEvent::Complete {
            video_url,
            video_id,
            has_audio,
        } => RelayStep::Completed(RenderArtifact {
            video_url,
            video_id,
            has_audio: has_audio.unwrap_or(false),
        }),
        ServiceEvent::Error { error, retriable } => {
            RelayStep::Failed(ServiceFailure {
                message: error
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| DEFAULT_SERVICE_ERROR.to_owned()),
                retriable,
            })
        }
        ServiceEvent::Log { message } => RelayStep::Log(message),
    }
}

/// Relays a render body to the client until the service reaches a
/// verdict or the body ends.
///
/// With `stall_timeout` set, a body that stays silent for that long is
/// abandoned. Transport failures, stalls and client disconnects are
/// errors, the verdicts of the service are not.
pub async fn relay<B: RenderBody>(
    body: &mut B,
    emitter: &mut Emitter,
    stall_timeout: Option<Duration>,
) -> Result<RelayOutcome, Error> {
    let mut decoder = FrameDecoder::default();
    loop {
        let Some(chunk) = next_chunk(body, stall_timeout).await? else {
            break;
        };
        for event in decoder.push(&chunk) {
            if let Some(outcome) = apply(relay_step(event), emitter).await? {
                return Ok(outcome);
            }
        }
    }
    if let Some(event) = decoder.finish() {
        if let Some(outcome) = apply(relay_step(event), emitter).await? {
            return Ok(outcome);
        }
    }
    Ok(RelayOutcome::Exhausted)
}

async fn next_chunk<B: RenderBody>(
    body: &mut B,
    stall_timeout: Option<Duration>,
) -> Result<Option<bytes::Bytes>, Error> {
    let read = body.next_chunk();
    let chunk = match stall_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, read).await {
            Ok(chunk) => chunk,
            Err(_) => {
                return Err(Error::new(
                    format!(
                        "Render service stalled for {}s",
                        timeout.as_secs_f32()
                    ),
                    ErrorKind::Render,
                ));
            }
        },
        None => read.await,
    };
    chunk.map_err(|err| Error::new(err.message(), ErrorKind::Render))
}

async fn apply(
    step: RelayStep,
    emitter: &mut Emitter,
) -> Result<Option<RelayOutcome>, Error> {
    match step {
        RelayStep::Forward(event) => {
            emitter.emit(event).await?;
            Ok(None)
        }
        RelayStep::Completed(artifact) => {
            debug!("render completed: {}", artifact.video_id);
            Ok(Some(RelayOutcome::Completed(artifact)))
        }
        RelayStep::Failed(failure) => {
            debug!("render failed: {}", failure.message);
            Ok(Some(RelayOutcome::Failed(failure)))
        }
        RelayStep::Log(message) => {
            info!(target: "qed::render_log", "{message}");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Number;

    use super::*;
    use crate::emitter::testing::collect;
    use crate::visualize::testing::ScriptedBody;

    #[test]
    fn test_relay_step_mapping() {
        assert_eq!(
            relay_step(ServiceEvent::Progress {
                message: "Rendering scene".to_owned(),
                percentage: Some(Number::from(55)),
            }),
            RelayStep::Forward(StreamEvent::Progress(Progress {
                message: "Rendering scene".to_owned(),
                step: 2,
                total_steps: 2,
                percentage: Some(Number::from(55)),
            }))
        );
        assert_eq!(
            relay_step(ServiceEvent::Error {
                error: None,
                retriable: None,
            }),
            RelayStep::Failed(ServiceFailure {
                message: "Manim generation failed".to_owned(),
                retriable: None,
            })
        );
        assert_eq!(
            relay_step(ServiceEvent::Log {
                message: "ffmpeg done".to_owned(),
            }),
            RelayStep::Log("ffmpeg done".to_owned())
        );
    }

    #[tokio::test]
    async fn test_relay_until_complete() {
        let (mut emitter, head_rx) = Emitter::new();
        let collector = tokio::spawn(collect(head_rx));
        let mut body = ScriptedBody::from_chunks([
            "data: {\"type\":\"progress\",\"message\":\"Rendering\",\
             \"percentage\":50}\n\n",
            "data: {\"type\":\"log\",\"message\":\"secret internals\"}\n\n\
             data: {\"type\":\"comp",
            "lete\",\"video_url\":\"/videos/v1.mp4\",\"video_id\":\"v1\",\
             \"has_audio\":true}\n\n",
            "data: {\"type\":\"progress\",\"message\":\"never read\"}\n\n",
        ]);
        let outcome = relay(&mut body, &mut emitter, None).await.unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Completed(RenderArtifact {
                video_url: "/videos/v1.mp4".to_owned(),
                video_id: "v1".to_owned(),
                has_audio: true,
            })
        );
        emitter.end();

        let events = collector.await.unwrap().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["step"], 2);
        assert_eq!(events[0]["totalSteps"], 2);
        assert_eq!(events[0]["percentage"], 50);
    }

    #[tokio::test]
    async fn test_relay_crlf_stream_completes() {
        let (mut emitter, head_rx) = Emitter::new();
        let collector = tokio::spawn(collect(head_rx));
        let mut body = ScriptedBody::from_chunks([
            "data: {\"type\":\"progress\",\"message\":\"Rendering\"}\r\n\r\n",
            "data: {\"type\":\"complete\",\"video_url\":\"/videos/v2.mp4\",\
             \"video_id\":\"v2\",\"has_audio\":null}\r\n\r\n",
        ]);
        let outcome = relay(&mut body, &mut emitter, None).await.unwrap();
        assert_eq!(
            outcome,
            RelayOutcome::Completed(RenderArtifact {
                video_url: "/videos/v2.mp4".to_owned(),
                video_id: "v2".to_owned(),
                has_audio: false,
            })
        );
        emitter.end();

        let events = collector.await.unwrap().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["message"], "Rendering");
    }

    #[tokio::test]
    async fn test_relay_exhausted() {
        let (mut emitter, _head_rx) = Emitter::new();
        let mut body = ScriptedBody::from_chunks(["data: {broken\n\n"]);
        let outcome = relay(&mut body, &mut emitter, None).await.unwrap();
        assert_eq!(outcome, RelayOutcome::Exhausted);
        emitter.end();
    }

    #[tokio::test]
    async fn test_relay_transport_error() {
        let (mut emitter, _head_rx) = Emitter::new();
        let mut body =
            ScriptedBody::from_chunks(["data: {\"type\":\"progress\"}\n\n"])
                .with_error("connection reset");
        let err = relay(&mut body, &mut emitter, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
        assert_eq!(err.message(), "connection reset");
        emitter.end();
    }

    #[tokio::test(start_paused = true)]
    async fn test_relay_stall() {
        let (mut emitter, _head_rx) = Emitter::new();
        let mut body = ScriptedBody::stalled();
        let err = relay(&mut body, &mut emitter, Some(Duration::from_secs(10)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Render);
        assert!(err.message().contains("stalled"));
        emitter.end();
    }
}
