//! End-to-end integration tests

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::time::Duration;
use tower::util::ServiceExt;

use crate::integration::fixtures::{process_alive, wait_until, TestServer, FAKE_STREAM};
use crate::transcode::SessionInfo;

async fn get(server: &TestServer, uri: &str) -> Response<Body> {
    server
        .router()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(server: &TestServer, uri: &str, body: Value) -> Response<Body> {
    let request = Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    server.router().oneshot(request).await.unwrap()
}

async fn post_empty(server: &TestServer, uri: &str) -> Response<Body> {
    server
        .router()
        .oneshot(Request::post(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn error_reason(response: Response<Body>) -> String {
    json(response).await["error"].as_str().unwrap_or_default().to_string()
}

// ---------------------------------------------------------------------------
// Path handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_traversal_is_rejected() {
    let server = TestServer::new();
    std::fs::write(server.outside_dir().join("secret.mp4"), b"x").unwrap();

    for uri in [
        "/api/video-info/../secret.mp4",
        "/api/video-info/..%2fsecret.mp4",
        "/api/video-info/show%2f..%2f..%2fsecret.mp4",
        "/api/video-info/show/..%5c..%5csecret.mp4",
        "/transcode/..%2fsecret.mp4",
        "/api/get-position/%2e%2e/secret.mp4",
    ] {
        let response = get(&server, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(error_reason(response).await, "traversal", "{}", uri);
    }
}

#[tokio::test]
async fn test_symlink_out_of_root_is_rejected() {
    let server = TestServer::new();
    let target = server.outside_dir().join("secret.mp4");
    std::fs::write(&target, b"x").unwrap();
    std::os::unix::fs::symlink(&target, server.media_dir().join("link.mp4")).unwrap();

    let response = get(&server, "/api/video-info/link.mp4").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let server = TestServer::new();

    let response = get(&server, "/api/video-info/show/missing.mp4").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_reason(response).await, "not-found");

    // Directories are not media files.
    let response = get(&server, "/transcode/show").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_percent_encoded_names_resolve() {
    let server = TestServer::new();
    std::fs::write(server.media_dir().join("show/d e.mp4"), b"x").unwrap();

    let response = get(&server, "/api/video-info/show/d%20e.mp4").await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_video_info() {
    let server = TestServer::new();

    let info = json(get(&server, "/api/video-info/show/a.mp4").await).await;
    assert_eq!(info["duration"], 100.0);
    assert_eq!(info["codec"], "h264");
    assert_eq!(info["has_video"], true);
    assert_eq!(info["needs_transcode"], false);

    let info = json(get(&server, "/api/video-info/movie.mkv").await).await;
    assert_eq!(info["codec"], "hevc");
    assert_eq!(info["needs_transcode"], true);

    let info = json(get(&server, "/api/video-info/song.mp3").await).await;
    assert_eq!(info["has_video"], false);
    assert_eq!(info["codec"], "mp3");
}

#[tokio::test]
async fn test_unreadable_file() {
    let server = TestServer::new();
    let response = get(&server, "/api/video-info/broken.avi").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_reason(response).await, "unreadable-format");
}

#[tokio::test]
async fn test_track_lists() {
    let server = TestServer::new();

    let audio = json(get(&server, "/api/audio-tracks/movie.mkv").await).await;
    let tracks = audio["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0]["index"], 1);
    assert_eq!(tracks[1]["index"], 2);
    assert_eq!(tracks[1]["codec"], "ac3");
    assert_eq!(tracks[0]["language"], "eng");

    let subs = json(get(&server, "/api/subtitle-tracks/movie.mkv").await).await;
    let tracks = subs["tracks"].as_array().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0]["index"], 3);
    assert_eq!(tracks[0]["label"], "English (eng)");
    assert_eq!(tracks[0]["bitmap"], false);
    assert_eq!(tracks[1]["bitmap"], true);
}

#[tokio::test]
async fn test_probe_is_cached_across_endpoints() {
    let server = TestServer::new();
    get(&server, "/api/video-info/movie.mkv").await;
    get(&server, "/api/audio-tracks/movie.mkv").await;
    get(&server, "/api/subtitle-tracks/movie.mkv").await;

    let stats = server.state().probes.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 2);
}

// ---------------------------------------------------------------------------
// Transcoding
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_transcode_streams_and_records_view() {
    let server = TestServer::new();

    let response = get(&server, "/transcode/movie.mkv?start_time=30").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    assert!(response.headers().contains_key("x-transcode-session"));
    assert_eq!(body_bytes(response).await, FAKE_STREAM);

    assert!(server.state().sessions.is_empty());
    assert_eq!(server.state().sessions.started_total(), 1);

    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["count"], 1);
    assert_eq!(history["history"][0]["file_path"], "movie.mkv");
    assert_eq!(history["history"][0]["view_count"], 1);
}

#[tokio::test]
async fn test_seek_restart_is_not_a_view() {
    let server = TestServer::new();

    let response = get(&server, "/transcode/movie.mkv?start_time=60&audio_track=2&seek=true").await;
    assert_eq!(response.status(), StatusCode::OK);
    body_bytes(response).await;

    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["count"], 0);
}

#[tokio::test]
async fn test_audio_only_transcode() {
    let server = TestServer::new();
    let response = get(&server, "/transcode/song.mp3").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mp4");
}

#[tokio::test]
async fn test_invalid_tracks() {
    let server = TestServer::new();

    let response = get(&server, "/transcode/movie.mkv?audio_track=9").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_reason(response).await, "invalid-track");

    let response = get(&server, "/transcode/movie.mkv?subtitle_track=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Nothing was launched, nothing was counted.
    assert_eq!(server.state().sessions.started_total(), 0);
    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["count"], 0);
}

#[tokio::test]
async fn test_engine_exit_without_output() {
    let server = TestServer::with_ffmpeg("echo 'Conversion failed!' >&2; exit 1");

    let response = get(&server, "/transcode/movie.mkv").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json(response).await;
    assert_eq!(body["error"], "engine-exited");
    assert!(body["message"].as_str().unwrap().contains("Conversion failed!"));

    assert!(server.state().sessions.is_empty());
    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["count"], 0);
}

#[tokio::test]
async fn test_engine_spawn_failure() {
    let server = TestServer::with_config(|c| {
        c.engine.ffmpeg_path = "/nonexistent/ffmpeg".into();
    });

    let response = get(&server, "/transcode/movie.mkv").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_reason(response).await, "spawn-failed");
}

#[tokio::test]
async fn test_client_disconnect_reaps_engine() {
    let server = TestServer::with_ffmpeg("echo started; exec sleep 30");

    let response = get(&server, "/transcode/movie.mkv").await;
    assert_eq!(response.status(), StatusCode::OK);

    let sessions: Vec<SessionInfo> = server.state().sessions.list();
    assert_eq!(sessions.len(), 1);
    let pid = sessions[0].pid.unwrap();
    assert!(process_alive(pid));

    let debug = json(get(&server, "/debug/sessions").await).await;
    assert_eq!(debug.as_array().unwrap().len(), 1);
    assert_eq!(debug[0]["path"], "movie.mkv");

    let mut body = response.into_body();
    let first = body.frame().await.unwrap().unwrap();
    assert_eq!(first.into_data().unwrap(), "started\n");

    drop(body);
    assert!(server.state().sessions.is_empty());
    assert!(wait_until(Duration::from_secs(5), || !process_alive(pid)).await);
}

#[tokio::test]
async fn test_concurrent_sessions_are_independent() {
    let server = TestServer::with_ffmpeg("echo started; exec sleep 30");

    let first = get(&server, "/transcode/movie.mkv").await;
    let second = get(&server, "/transcode/movie.mkv?start_time=50&seek=true").await;
    assert_eq!(server.state().sessions.len(), 2);

    drop(first);
    assert_eq!(server.state().sessions.len(), 1);
    drop(second);
    assert!(server.state().sessions.is_empty());
}

// ---------------------------------------------------------------------------
// Subtitles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_subtitles_rebased_to_offset() {
    let server = TestServer::new();

    let response = get(&server, "/api/subtitles/movie.mkv?track=3&offset=7").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/vtt"));
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(text, "WEBVTT\n\n00:00:03.000 --> 00:00:05.000\nlater\n\n");

    let response = get(&server, "/api/subtitles/movie.mkv?track=3").await;
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("00:00:02.000 --> 00:00:04.000\nearly"));
}

#[tokio::test]
async fn test_subtitle_errors() {
    let server = TestServer::new();

    let response = get(&server, "/api/subtitles/movie.mkv?track=4").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_reason(response).await, "unsupported-subtitle");

    let response = get(&server, "/api/subtitles/movie.mkv?track=9").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_reason(response).await, "invalid-track");

    // Audio streams are not subtitle tracks.
    let response = get(&server, "/api/subtitles/movie.mkv?track=1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Playback state
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_position_round_trip() {
    let server = TestServer::new();

    let response = get(&server, "/api/get-position/show/a.mp4").await;
    assert_eq!(json(response).await["position"], 0.0);

    let response = post_json(&server, "/api/save-position/show/a.mp4", serde_json::json!({ "position": 42.5 })).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = get(&server, "/api/get-position/show/a.mp4").await;
    assert_eq!(json(response).await["position"], 42.5);

    // Last writer wins.
    post_json(&server, "/api/save-position/show/a.mp4", serde_json::json!({ "position": 12.0 })).await;
    let response = get(&server, "/api/get-position/show/a.mp4").await;
    assert_eq!(json(response).await["position"], 12.0);
}

#[tokio::test]
async fn test_position_near_end_reads_as_finished() {
    let server = TestServer::new();

    post_json(&server, "/api/save-position/show/b.mp4", serde_json::json!({ "position": 98.0 })).await;
    let response = get(&server, "/api/get-position/show/b.mp4").await;
    assert_eq!(json(response).await["position"], 0.0);

    post_json(&server, "/api/save-position/show/b.mp4", serde_json::json!({ "position": 90.0 })).await;
    let response = get(&server, "/api/get-position/show/b.mp4").await;
    assert_eq!(json(response).await["position"], 90.0);
}

#[tokio::test]
async fn test_invalid_position() {
    let server = TestServer::new();

    let response = post_json(&server, "/api/save-position/show/a.mp4", serde_json::json!({ "position": -1.0 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = post_json(&server, "/api/save-position/show/missing.mp4", serde_json::json!({ "position": 1.0 })).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_failures_do_not_break_playback() {
    let server = TestServer::with_failing_store();

    let response = post_json(&server, "/api/save-position/show/a.mp4", serde_json::json!({ "position": 30.0 })).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(&server, "/transcode/movie.mkv").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, FAKE_STREAM);

    let response = get(&server, "/api/get-position/show/a.mp4").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(error_reason(response).await, "store-failure");

    let response = post_empty(&server, "/api/record-view/show/a.mp4").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_record_view_of_unclassified_file() {
    let server = TestServer::new();
    std::fs::write(server.media_dir().join("data.bin"), b"x").unwrap();

    let response = post_empty(&server, "/api/record-view/data.bin").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_reason(response).await, "bad-request");

    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["count"], 0);
}

#[tokio::test]
async fn test_record_view_and_continue_watching() {
    let server = TestServer::new();

    let response = get(&server, "/api/continue-watching").await;
    assert_eq!(json(response).await, serde_json::json!({}));

    let first = json(post_empty(&server, "/api/record-view/show/a.mp4").await).await;
    assert_eq!(first["view_count"], 1);
    let second = json(post_empty(&server, "/api/record-view/show/a.mp4").await).await;
    assert_eq!(second["view_count"], 2);

    tokio::time::sleep(Duration::from_millis(5)).await;
    post_empty(&server, "/api/record-view/song.mp3").await;

    let latest = json(get(&server, "/api/continue-watching").await).await;
    assert_eq!(latest["file_path"], "song.mp3");
    assert_eq!(latest["file_type"], "audio");
    assert_eq!(latest["file_name"], "song.mp3");

    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["count"], 2);
    assert_eq!(history["history"][0]["file_path"], "song.mp3");
    assert_eq!(history["history"][1]["file_path"], "show/a.mp4");
    assert_eq!(history["history"][1]["view_count"], 2);
}

#[tokio::test]
async fn test_concurrent_record_view_counts_every_view() {
    let server = TestServer::new();

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let app = server.router();
        tasks.push(tokio::spawn(async move {
            app.oneshot(
                Request::post("/api/record-view/show/c.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
            .status()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let history = json(get(&server, "/api/history").await).await;
    assert_eq!(history["history"][0]["view_count"], 20);
}

#[tokio::test]
async fn test_adjacent_videos() {
    let server = TestServer::new();

    let middle = json(get(&server, "/api/adjacent-videos/show/b.mp4").await).await;
    assert_eq!(middle["prev"]["path"], "show/a.mp4");
    assert_eq!(middle["next"]["path"], "show/c.mp4");
    assert_eq!(middle["next"]["name"], "c.mp4");

    let first = json(get(&server, "/api/adjacent-videos/show/a.mp4").await).await;
    assert!(first["prev"].is_null());
    assert_eq!(first["next"]["path"], "show/b.mp4");

    // Only same-kind siblings count: song.mp3 and notes.txt are skipped.
    let root = json(get(&server, "/api/adjacent-videos/movie.mkv").await).await;
    assert_eq!(root["prev"]["path"], "broken.avi");
    assert!(root["next"].is_null());
}

// ---------------------------------------------------------------------------
// Service endpoints
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_version() {
    let server = TestServer::new();
    let version = json(get(&server, "/version").await).await;
    assert_eq!(version["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_export() {
    let server = TestServer::new();
    get(&server, "/api/video-info/movie.mkv").await;
    get(&server, "/api/video-info/show/missing.mp4").await;
    body_bytes(get(&server, "/transcode/movie.mkv").await).await;

    let response = get(&server, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await).unwrap();

    assert!(text.contains("transcode_active_sessions 0"));
    assert!(text.contains("transcode_sessions_started_total 1"));
    assert!(text.contains(&format!("transcode_bytes_streamed_total {}", FAKE_STREAM.len())));
    assert!(text.contains("transcode_probe_cache_misses_total 1"));
    assert!(text.contains("transcode_errors_total{type=\"not-found\"} 1"));
    assert!(text.contains("transcode_requests_by_endpoint{endpoint=\"/api/video-info/{*path}\"} 2"));
}
