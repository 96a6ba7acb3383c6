use std::sync::Arc;

use serde_json::{Value, json};

use super::testing::{
    CountingGenerator, FakeRenderService, ScriptedBody, Submission,
};
use super::*;
use crate::emitter::testing::collect;

async fn visualize(
    generator: Arc<CountingGenerator>,
    service: FakeRenderService,
    req: VisualizeRequest,
) -> Vec<Value> {
    let visualizer = Visualizer::new(generator, service);
    let (emitter, head_rx) = Emitter::new();
    let collector = tokio::spawn(collect(head_rx));
    visualizer.handle(req, emitter).await;
    collector.await.unwrap().unwrap()
}

fn problem(text: &str) -> VisualizeRequest {
    VisualizeRequest {
        problem: Some(text.to_owned()),
        image: None,
    }
}

fn content_error(message: &str) -> Submission {
    Submission::Accept(ScriptedBody::from_events([
        json!({ "type": "progress", "message": "Rendering", "percentage": 10 }),
        json!({ "type": "error", "error": message }),
    ]))
}

fn completion(video: &str, has_audio: bool) -> Submission {
    Submission::Accept(ScriptedBody::from_events([
        json!({ "type": "log", "message": "writing file" }),
        json!({
            "type": "complete",
            "video_url": format!("/videos/{video}.mp4"),
            "video_id": video,
            "has_audio": has_audio,
        }),
    ]))
}

fn progress_messages(events: &[Value]) -> Vec<&str> {
    events
        .iter()
        .filter(|e| e["type"] == "progress" && e["step"] == 1)
        .map(|e| e["message"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_exhausts_attempts_on_content_errors() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        content_error("Manim generation failed: attempt 1"),
        content_error("Manim generation failed: attempt 2"),
        content_error("Manim generation failed: attempt 3"),
        completion("never", true),
    ]);
    let events = visualize(
        generator.clone(),
        service.clone(),
        problem("Graph y = 2x"),
    )
    .await;

    assert_eq!(service.received().len(), 3);
    assert_eq!(service.remaining(), 1);
    assert_eq!(
        progress_messages(&events),
        vec![
            "Generating code...",
            "Retrying generation (Attempt 2)...",
            "Retrying generation (Attempt 3)...",
        ]
    );

    let last = events.last().unwrap();
    assert_eq!(last["type"], "error");
    assert_eq!(last["error"], "Manim generation failed: attempt 3");
    assert_eq!(last["details"], SELF_CORRECTION_DETAILS);
    assert_eq!(events.iter().filter(|e| e["type"] == "error").count(), 1);
    assert!(events.iter().all(|e| e["type"] != "complete"));
}

#[tokio::test]
async fn test_failure_context_is_threaded() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        content_error("Failed to generate scene: NameError"),
        completion("v2", true),
    ]);
    visualize(generator.clone(), service.clone(), problem("Graph y = 2x"))
        .await;

    let requests = generator.received();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].last_error, "");
    assert_eq!(requests[0].previous_code, "");
    assert_eq!(requests[1].last_error, "Failed to generate scene: NameError");
    assert_eq!(requests[1].previous_code, "scene 1");

    let submitted = service.received();
    assert_eq!(submitted[1].code, "scene 2");
    assert_eq!(submitted[1].narration, "narration 2");
}

#[tokio::test]
async fn test_success_on_second_attempt() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        content_error("Manim generation failed"),
        completion("v2", true),
        completion("v3", true),
    ]);
    let events = visualize(
        generator.clone(),
        service.clone(),
        problem("Graph y = 2x"),
    )
    .await;

    assert_eq!(service.received().len(), 2);
    assert_eq!(generator.received().len(), 2);

    let completes: Vec<_> =
        events.iter().filter(|e| e["type"] == "complete").collect();
    assert_eq!(completes.len(), 1);
    assert_eq!(
        *completes[0],
        json!({
            "type": "complete",
            "videoUrl": "http://render.test/videos/v2.mp4",
            "videoId": "v2",
            "explanation": "narration 2",
        })
    );
    assert_eq!(events.last().unwrap()["type"], "complete");

    // Progress relayed from the service is the second step.
    let relayed: Vec<_> = events
        .iter()
        .filter(|e| e["type"] == "progress" && e["step"] == 2)
        .collect();
    assert_eq!(relayed.len(), 1);
    assert_eq!(relayed[0]["totalSteps"], 2);
    assert_eq!(relayed[0]["percentage"], 10);
}

#[tokio::test]
async fn test_transport_failure_is_fatal() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        Submission::Unreachable,
        completion("v2", true),
    ]);
    let events = visualize(
        generator.clone(),
        service.clone(),
        problem("Graph y = 2x"),
    )
    .await;

    assert_eq!(generator.received().len(), 1);
    assert_eq!(service.received().len(), 1);
    assert_eq!(progress_messages(&events), vec!["Generating code..."]);
    let last = events.last().unwrap();
    assert_eq!(last["type"], "error");
    assert!(last["error"].as_str().unwrap().contains("error sending request"));
}

#[tokio::test]
async fn test_stream_without_verdict_is_fatal() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        Submission::Accept(ScriptedBody::from_events([
            json!({ "type": "progress", "message": "Rendering" }),
        ])),
        completion("v2", true),
    ]);
    let events = visualize(generator.clone(), service, problem("x")).await;

    assert_eq!(generator.received().len(), 1);
    assert_eq!(events.last().unwrap()["error"], STREAM_ENDED);
}

#[tokio::test]
async fn test_rejected_submission_is_classified() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        Submission::Reject {
            status: 500,
            message: "Manim service failed to render",
        },
        completion("v2", false),
    ]);
    let events =
        visualize(generator.clone(), service.clone(), problem("x")).await;

    assert_eq!(service.received().len(), 2);
    let last = events.last().unwrap();
    assert_eq!(last["type"], "complete");
    assert_eq!(last["details"], NO_AUDIO_DETAILS);

    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        Submission::Reject {
            status: 502,
            message: "Render service error 502",
        },
        completion("v2", true),
    ]);
    let events = visualize(generator, service.clone(), problem("x")).await;
    assert_eq!(service.received().len(), 1);
    assert_eq!(events.last().unwrap()["error"], "Render service error 502");
}

#[tokio::test]
async fn test_typed_flag_overrides_message() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        Submission::Accept(ScriptedBody::from_events([json!({
            "type": "error",
            "error": "Manim generation failed: out of disk",
            "retriable": false,
        })])),
        completion("v2", true),
    ]);
    let events =
        visualize(generator.clone(), service.clone(), problem("x")).await;

    assert_eq!(service.received().len(), 1);
    assert_eq!(
        events.last().unwrap()["error"],
        "Manim generation failed: out of disk"
    );
}

#[tokio::test]
async fn test_generation_failure_is_fatal() {
    let generator = Arc::new(CountingGenerator::failing("model is overloaded"));
    let service = FakeRenderService::with_script([completion("v1", true)]);
    let events =
        visualize(generator.clone(), service.clone(), problem("x")).await;

    assert_eq!(generator.received().len(), 1);
    assert!(service.received().is_empty());
    let last = events.last().unwrap();
    assert_eq!(last["error"], "model is overloaded");
    assert_eq!(last["details"], SELF_CORRECTION_DETAILS);
}

#[tokio::test]
async fn test_missing_problem_and_image() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::default();
    let events = visualize(
        generator.clone(),
        service,
        VisualizeRequest {
            problem: Some(String::new()),
            image: None,
        },
    )
    .await;

    assert_eq!(
        events,
        vec![json!({
            "type": "error",
            "error": "Problem or image is required"
        })]
    );
    assert!(generator.received().is_empty());
}

#[tokio::test]
async fn test_image_is_decoded_for_generation() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([completion("v1", true)]);
    visualize(
        generator.clone(),
        service,
        VisualizeRequest {
            problem: None,
            image: Some("data:image/png;base64,AAAA".to_owned()),
        },
    )
    .await;

    let image = generator.received()[0].image.clone().unwrap();
    assert_eq!(image.media_type, "image/png");
    assert_eq!(image.data, "AAAA");

    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([completion("v1", true)]);
    visualize(
        generator.clone(),
        service,
        VisualizeRequest {
            problem: Some("x".to_owned()),
            image: Some("image/png,AAAA".to_owned()),
        },
    )
    .await;
    assert_eq!(generator.received()[0].image, None);
}

#[tokio::test]
async fn test_client_disconnect_abandons_attempts() {
    let generator = Arc::new(CountingGenerator::default());
    let service = FakeRenderService::with_script([
        content_error("Manim generation failed"),
        content_error("Manim generation failed"),
        content_error("Manim generation failed"),
    ]);
    let visualizer = Visualizer::new(generator.clone(), service.clone());
    let (emitter, head_rx) = Emitter::new();
    drop(head_rx);
    visualizer.handle(problem("x"), emitter).await;

    assert!(generator.received().is_empty());
    assert!(service.received().is_empty());
}
