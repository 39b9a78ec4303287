//! Destructive and Edge Case Tests for the Pipeline
//!
//! These tests drive the flow end to end against an in-process analysis
//! service and probe boundary inputs, hostile responses and resource leaks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::json;

use crate::core::analysis::{normalize_body, AbortSignal, SubmissionEvent, SubmissionState, ANALYZE_PATH};
use crate::core::capture::{CaptureState, ReplayCamera};
use crate::core::media::{CandidateFile, IntakePath, Validator, ValidationError, MAX_UPLOAD_BYTES, MIN_UPLOAD_BYTES};
use crate::core::session::{FlowStage, RecoveryAffordance};
use crate::core::settings::ClientSettings;
use crate::core::flow::FormCheckFlow;
use crate::core::{CoreError, CANCELLED_MESSAGE, TIMEOUT_MESSAGE};

async fn spawn_service(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn flow_for(base_url: &str, timeout_secs: u64) -> FormCheckFlow {
    let settings = ClientSettings {
        api_url: base_url.to_string(),
        request_timeout_secs: timeout_secs,
        ..Default::default()
    };
    FormCheckFlow::new(settings).unwrap()
}

fn squat_clip() -> CandidateFile {
    CandidateFile::new("squat.mp4", "video/mp4", vec![9u8; 4096])
}

fn analysis_json() -> serde_json::Value {
    json!({
        "overall_score": 8.4,
        "issues": [{"issue_type":"forward_lean","severity":"minor","frame_start":60,"frame_end":90,"coaching_cue":"chest up"}],
        "strengths": ["Consistent tempo"],
        "metrics": [{"metric_name":"depth","actual_value":"parallel","target_value":"parallel","status":"good"}],
        "recommendations": [{"recommendation_text":"Add a pause at the bottom"}]
    })
}

#[tokio::test]
async fn test_destructive_full_flow_from_file() {
    let router = Router::new().route(ANALYZE_PATH, post(|| async { Json(analysis_json()) }));
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(Some("Squat"));
    assert!(flow.accept_file(squat_clip(), IntakePath::Picker));
    flow.proceed_to_analysis().unwrap();

    let result = flow.run_analysis(&AbortSignal::new()).await.unwrap();
    assert_eq!(result.overall_score, 8.4);

    assert_eq!(flow.stage(), FlowStage::Results);
    let results = flow.results().unwrap();
    assert_eq!(results.results.markers(30)[0].time_sec, 2.0);
    let url = results.video_url.unwrap();
    assert_eq!(flow.resources().resolve_object_url(&url).unwrap().len(), 4096);
    assert_eq!(flow.resources().live_object_urls(), 1);
}

#[tokio::test]
async fn test_destructive_full_flow_from_camera() {
    let router = Router::new().route(ANALYZE_PATH, post(|| async { Json(analysis_json()) }));
    let base = spawn_service(router).await;
    let camera = ReplayCamera::from_takes(vec![vec![
        Bytes::from_static(b"chunk-1|"),
        Bytes::from_static(b"chunk-2|"),
        Bytes::from_static(b"chunk-3"),
    ]]);

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(Some("Push-up"));
    assert!(flow.open_camera(&camera).await);
    flow.start_recording().unwrap();
    while flow.next_chunk().await.is_some_and(|n| n < 2) {}
    let asset = flow.stop_recording().unwrap();
    assert_eq!(asset.payload, Bytes::from_static(b"chunk-1|chunk-2|chunk-3"));
    assert_eq!(camera.live_tracks(), 0);

    flow.proceed_to_analysis().unwrap();
    flow.run_analysis(&AbortSignal::new()).await.unwrap();
    assert_eq!(flow.results().unwrap().exercise.as_str(), "Push-up");
}

#[tokio::test]
async fn test_destructive_retry_after_service_failure_reuses_asset() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        ANALYZE_PATH,
        post(move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({"detail": {"error": "Workers busy"}})),
                    )
                } else {
                    (StatusCode::OK, Json(analysis_json()))
                }
            }
        }),
    );
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 30);
    let mut events = flow.take_submission_events().unwrap();
    flow.select_exercise(None);
    flow.accept_file(squat_clip(), IntakePath::Drop);
    let submitted_id = flow.proceed_to_analysis().unwrap().video.id;

    let err = flow.run_analysis(&AbortSignal::new()).await.unwrap_err();
    assert_eq!(err.to_string(), "Workers busy");
    assert_eq!(flow.stage(), FlowStage::Analyzing);
    assert_eq!(flow.submission_state(), SubmissionState::Failed);

    let mut settled_failure = false;
    while let Ok(event) = events.try_recv() {
        if let SubmissionEvent::Settled { state, message, recovery } = event {
            assert_eq!(state, SubmissionState::Failed);
            assert_eq!(message.as_deref(), Some("Workers busy"));
            assert_eq!(recovery.len(), 2);
            settled_failure = true;
        }
    }
    assert!(settled_failure);

    flow.retry_analysis(&AbortSignal::new()).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(flow.stage(), FlowStage::Results);
    assert_eq!(flow.acquirer().active_asset().unwrap().id, submitted_id);
}

#[tokio::test]
async fn test_destructive_cancel_then_restart() {
    let router = Router::new().route(
        ANALYZE_PATH,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(analysis_json())
        }),
    );
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(Some("Deadlift"));
    flow.accept_file(squat_clip(), IntakePath::Picker);
    flow.proceed_to_analysis().unwrap();

    let signal = AbortSignal::new();
    let cancel = signal.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel_by_user();
    });

    let err = flow.run_analysis(&signal).await.unwrap_err();
    assert_eq!(err.to_user_message(), CANCELLED_MESSAGE);
    assert_eq!(flow.submission_state(), SubmissionState::Cancelled);
    assert_eq!(flow.resources().active_timers(), 0);

    flow.restart();
    assert_eq!(flow.stage(), FlowStage::ExerciseSelection);
    assert!(flow.results().is_err());
}

#[tokio::test]
async fn test_destructive_timeout_through_flow() {
    let router = Router::new().route(
        ANALYZE_PATH,
        post(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Json(analysis_json())
        }),
    );
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 1);
    flow.select_exercise(None);
    flow.accept_file(squat_clip(), IntakePath::Picker);
    flow.proceed_to_analysis().unwrap();

    let err = flow.run_analysis(&AbortSignal::new()).await.unwrap_err();
    assert!(matches!(err, CoreError::Timeout));
    assert_eq!(err.to_user_message(), TIMEOUT_MESSAGE);
    assert_eq!(flow.submission_state(), SubmissionState::Failed);
}

#[tokio::test]
async fn test_destructive_stale_signal_cannot_relabel_success() {
    let router = Router::new().route(ANALYZE_PATH, post(|| async { Json(analysis_json()) }));
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(None);
    flow.accept_file(squat_clip(), IntakePath::Picker);
    flow.proceed_to_analysis().unwrap();

    let signal = AbortSignal::new();
    flow.run_analysis(&signal).await.unwrap();
    assert!(!signal.cancel_by_user());
    assert_eq!(flow.submission_state(), SubmissionState::Succeeded);

    // Reusing a settled signal is refused before anything is sent
    flow.restart();
    flow.select_exercise(None);
    flow.accept_file(squat_clip(), IntakePath::Picker);
    flow.proceed_to_analysis().unwrap();
    assert!(matches!(
        flow.run_analysis(&signal).await,
        Err(CoreError::InvalidState(_))
    ));
}

#[test]
fn test_destructive_validation_boundaries() {
    let validator = Validator::new();
    let at = |size: u64| CandidateFile::new("clip.mov", "video/quicktime", vec![0u8; size as usize]);

    assert!(validator.validate(&at(MIN_UPLOAD_BYTES), IntakePath::Picker).is_ok());
    assert_eq!(
        validator.validate(&at(MIN_UPLOAD_BYTES - 1), IntakePath::Picker),
        Err(ValidationError::TooSmall)
    );
    assert!(matches!(
        validator.validate(&at(MAX_UPLOAD_BYTES + 1), IntakePath::Drop),
        Err(ValidationError::TooLarge { .. })
    ));

    // An empty drop is still a video as far as the drop path cares
    let empty = CandidateFile::new("empty.webm", "video/webm", Vec::<u8>::new());
    assert!(validator.validate(&empty, IntakePath::Drop).is_ok());

    // Type is checked before size
    let huge_text = CandidateFile::new("notes.txt", "text/plain", vec![0u8; 16]);
    assert!(matches!(
        validator.validate(&huge_text, IntakePath::Picker),
        Err(ValidationError::NotVideo { .. })
    ));
}

#[test]
fn test_destructive_hostile_analysis_bodies() {
    // Negative frames cannot be represented
    assert!(matches!(
        normalize_body(br#"{"overall_score": 5, "issues": [{"issue_type":"x","severity":"minor","frame_start":-3,"frame_end":2}]}"#),
        Err(CoreError::MalformedResponse(_))
    ));
    // Score of the wrong type
    assert!(matches!(
        normalize_body(br#"{"overall_score": "high"}"#),
        Err(CoreError::MalformedResponse(_))
    ));
    assert!(matches!(normalize_body(b""), Err(CoreError::MalformedResponse(_))));

    // Out-of-range scores are carried but the bar stays bounded
    let result = normalize_body(br#"{"overall_score": -4}"#).unwrap();
    assert_eq!(result.score_percent(), 0.0);

    // Unknown extra fields are ignored
    let result = normalize_body(br#"{"overall_score": 7, "model_version": "v9", "strengths": ["ok"]}"#).unwrap();
    assert_eq!(result.strengths, vec!["ok"]);
}

#[tokio::test]
async fn test_destructive_double_teardown_and_drop() {
    let camera = ReplayCamera::from_takes(vec![vec![Bytes::from_static(b"x")]]);
    {
        let mut flow = flow_for("http://127.0.0.1:9", 30);
        flow.select_exercise(None);
        assert!(flow.open_camera(&camera).await);
        flow.start_recording().unwrap();
        assert_eq!(flow.acquirer().state(), CaptureState::Recording);

        flow.restart();
        flow.restart();
        assert_eq!(camera.live_tracks(), 0);

        assert!(flow.open_camera(&camera).await);
        assert_eq!(camera.live_tracks(), 1);
    }
    assert_eq!(camera.live_tracks(), 0);
}

#[test]
fn test_destructive_results_without_data() {
    let flow = flow_for("http://127.0.0.1:9", 30);
    assert_eq!(flow.results().unwrap_err(), RecoveryAffordance::no_results());
}

#[tokio::test]
async fn test_destructive_new_file_after_success_discards_results() {
    let router = Router::new().route(ANALYZE_PATH, post(|| async { Json(analysis_json()) }));
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(Some("Squat"));
    flow.accept_file(squat_clip(), IntakePath::Picker);
    flow.proceed_to_analysis().unwrap();
    flow.run_analysis(&AbortSignal::new()).await.unwrap();
    let old_url = flow.results().unwrap().video_url.unwrap();

    assert!(flow.accept_file(
        CandidateFile::new("other.mp4", "video/mp4", vec![3u8; 2048]),
        IntakePath::Picker
    ));
    assert_eq!(flow.stage(), FlowStage::Upload);
    assert_eq!(flow.results().unwrap_err(), RecoveryAffordance::no_results());
    assert_eq!(flow.submission_state(), SubmissionState::Idle);
    assert!(flow.resources().resolve_object_url(&old_url).is_none());
    assert_eq!(flow.resources().live_object_urls(), 1);
}

#[tokio::test]
async fn test_destructive_new_file_after_failure_is_not_retried_as_old_asset() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let router = Router::new().route(
        ANALYZE_PATH,
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::BAD_GATEWAY, Json(json!({"error": "Upstream down"})))
            }
        }),
    );
    let base = spawn_service(router).await;

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(None);
    flow.accept_file(squat_clip(), IntakePath::Picker);
    let first_id = flow.proceed_to_analysis().unwrap().video.id;
    assert!(flow.run_analysis(&AbortSignal::new()).await.is_err());

    assert!(flow.accept_file(
        CandidateFile::new("other.mov", "video/quicktime", vec![5u8; 2048]),
        IntakePath::Drop
    ));
    assert!(matches!(
        flow.retry_analysis(&AbortSignal::new()).await,
        Err(CoreError::InvalidState(_))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let next = flow.proceed_to_analysis().unwrap();
    assert_ne!(next.video.id, first_id);
    assert_eq!(next.video.filename.as_deref(), Some("other.mov"));
}

#[tokio::test]
async fn test_destructive_new_recording_after_success_discards_results() {
    let router = Router::new().route(ANALYZE_PATH, post(|| async { Json(analysis_json()) }));
    let base = spawn_service(router).await;
    let camera = ReplayCamera::from_takes(vec![vec![Bytes::from_static(b"second-take")]]);

    let mut flow = flow_for(&base, 30);
    flow.select_exercise(None);
    flow.accept_file(squat_clip(), IntakePath::Picker);
    flow.proceed_to_analysis().unwrap();
    flow.run_analysis(&AbortSignal::new()).await.unwrap();
    assert!(flow.results().is_ok());

    assert!(flow.open_camera(&camera).await);
    flow.start_recording().unwrap();
    let asset = flow.stop_recording().unwrap();
    assert_eq!(asset.payload, Bytes::from_static(b"second-take"));
    assert_eq!(flow.stage(), FlowStage::Upload);
    assert!(flow.results().is_err());
}
