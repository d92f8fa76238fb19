mod common;

use common::{MAX_AUDIO_SIZE, audio_form, file_part, payload, spawn_app};
use mediastore::storage::paths::PathManager;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT_RANGES, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_RANGE, ETAG};
use reqwest::multipart::Form;
use serde_json::Value;
use uuid::Uuid;

async fn json(resp: reqwest::Response) -> Value {
    resp.json::<Value>().await.unwrap()
}

fn stream_path(body: &Value) -> &str {
    body["file"]["streamUrl"].as_str().unwrap()
}

#[tokio::test]
async fn upload_then_stream_round_trip() {
    let app = spawn_app(1024).await;
    let audio = payload(10_000);
    let cover = payload(3_000);
    let cover_part = file_part(cover.clone(), "cover.PNG", "image/png");
    let form = audio_form(audio.clone()).part("coverImage", cover_part);

    let resp = app.upload("/api/media/upload", form).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["audio"]["length"], 10_000);
    assert_eq!(body["audio"]["chunkCount"], 10);
    assert_eq!(body["audio"]["originalName"], "track.mp3");
    assert_eq!(body["audio"]["contentType"], "audio/mpeg");
    let audio_name = body["audio"]["filename"].as_str().unwrap();
    assert!(audio_name.ends_with(".mp3"));
    let digest = body["audio"]["digest"].as_str().unwrap();
    assert!(digest.starts_with("sha256:"));
    assert_eq!(body["coverImage"]["length"], 3_000);
    let cover_name = body["coverImage"]["filename"].as_str().unwrap();
    assert!(cover_name.ends_with(".png"));

    let resp = app.get(body["audio"]["streamUrl"].as_str().unwrap()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_LENGTH], "10000");
    assert_eq!(resp.headers()[ACCEPT_RANGES], "bytes");
    assert_eq!(resp.headers()[CACHE_CONTROL], "public, max-age=31536000");
    assert!(resp.headers().contains_key(ETAG));
    assert_eq!(resp.bytes().await.unwrap().as_ref(), audio.as_slice());

    let cover_url = body["coverImage"]["streamUrl"].as_str().unwrap();
    assert!(cover_url.starts_with("/api/media/stream/image/"));
    let resp = app.get(cover_url).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), cover.as_slice());
}

#[tokio::test]
async fn range_requests_return_exact_bytes() {
    let app = spawn_app(1000).await;
    let audio = payload(10_000);
    let body = app.upload_audio(audio.clone()).await;
    let path = stream_path(&body);

    for (header, start, end) in [
        ("bytes=0-0", 0, 0),
        ("bytes=999-1000", 999, 1000),
        ("bytes=2500-7499", 2500, 7499),
        ("bytes=9000-", 9000, 9999),
        ("bytes=-100", 9900, 9999),
        ("bytes=0-9999", 0, 9999),
    ] {
        let resp = app.get_range(path, header).await;
        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT, "{header}");
        assert_eq!(
            resp.headers()[CONTENT_RANGE],
            format!("bytes {start}-{end}/10000").as_str()
        );
        assert_eq!(
            resp.headers()[CONTENT_LENGTH],
            (end - start + 1).to_string().as_str()
        );
        let bytes = resp.bytes().await.unwrap();
        assert_eq!(bytes.as_ref(), &audio[start..=end], "{header}");
    }
}

#[tokio::test]
async fn unsatisfiable_ranges_get_416() {
    let app = spawn_app(1000).await;
    let body = app.upload_audio(payload(10_000)).await;
    let path = stream_path(&body);

    for header in [
        "bytes=10000-",
        "bytes=0-10000",
        "bytes=500-100",
        "bytes=0-1,5-9",
        "pages=1-2",
    ] {
        let resp = app.get_range(path, header).await;
        assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE, "{header}");
        assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */10000");
        let err = json(resp).await;
        assert_eq!(err["success"], false);
        assert_eq!(err["error"]["statusCode"], 416);
    }
}

#[tokio::test]
async fn invalid_and_unknown_ids() {
    let app = spawn_app(1024).await;

    let resp = app.get("/api/media/stream/audio/not-a-file-id").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = json(resp).await;
    assert_eq!(err["success"], false);
    assert_eq!(err["error"]["message"], "Invalid file ID");
    assert_eq!(err["error"]["type"], "ValidationError");

    let unknown = Uuid::new_v4();
    for path in [
        format!("/api/media/stream/audio/{unknown}"),
        format!("/api/media/stream/image/{unknown}"),
        format!("/api/media/{unknown}"),
    ] {
        let resp = app.get(&path).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
        let err = json(resp).await;
        assert_eq!(err["error"]["statusCode"], 404);
    }
}

#[tokio::test]
async fn audio_is_not_served_from_image_route() {
    let app = spawn_app(1024).await;
    let body = app.upload_audio(payload(100)).await;
    let id = body["file"]["fileId"].as_str().unwrap();

    let resp = app.get(&format!("/api/media/stream/image/{id}")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn describe_returns_complete_record() {
    let app = spawn_app(64).await;
    let body = app.upload_audio(payload(200)).await;
    let id = body["file"]["fileId"].as_str().unwrap();

    let resp = app.get(&format!("/api/media/{id}")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let described = json(resp).await;
    assert_eq!(described["file"]["fileId"], id);
    assert_eq!(described["file"]["chunkCount"], 4);
    assert_eq!(described["file"]["kind"], "audio");
}

#[tokio::test]
async fn rejected_uploads() {
    let app = spawn_app(1024).await;

    let cover = file_part(payload(10), "c.jpg", "image/jpeg");
    let resp = app
        .upload("/api/media/upload", Form::new().part("coverImage", cover))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = json(resp).await;
    assert_eq!(err["error"]["message"], "Audio file is required");

    let flac = file_part(payload(10), "a.flac", "audio/flac");
    let resp = app
        .upload("/api/media/upload", Form::new().part("audioFile", flac))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(resp).await["error"]["type"], "ValidationError");

    let stray = file_part(payload(10), "a.mp3", "audio/mpeg");
    let resp = app
        .upload("/api/media/audio", Form::new().part("lyrics", stray))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let err = json(resp).await;
    assert_eq!(err["error"]["message"], "Unexpected field name");

    let oversized = audio_form(payload(MAX_AUDIO_SIZE as usize + 1));
    let resp = app.upload("/api/media/audio", oversized).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn image_only_upload() {
    let app = spawn_app(1024).await;
    let image = payload(5_000);
    let part = file_part(image.clone(), "art.webp", "image/webp");
    let resp = app
        .upload("/api/media/image", Form::new().part("coverImage", part))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json(resp).await;
    assert_eq!(body["file"]["kind"], "image");

    let resp = app.get_range(stream_path(&body), "bytes=4000-").await;
    assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &image[4000..]);
}

#[tokio::test]
async fn zero_byte_upload() {
    let app = spawn_app(1024).await;
    let resp = app.upload("/api/media/audio", audio_form(Vec::new())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json(resp).await;
    assert_eq!(body["file"]["length"], 0);
    assert_eq!(body["file"]["chunkCount"], 0);
    let path = stream_path(&body);

    let resp = app.get(path).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[CONTENT_LENGTH], "0");
    assert!(resp.bytes().await.unwrap().is_empty());

    let resp = app.get_range(path, "bytes=0-").await;
    assert_eq!(resp.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(resp.headers()[CONTENT_RANGE], "bytes */0");
}

#[tokio::test]
async fn missing_chunk_aborts_the_response() {
    let app = spawn_app(1024).await;
    let body = app.upload_audio(payload(5 * 1024)).await;
    let id: Uuid = body["file"]["fileId"].as_str().unwrap().parse().unwrap();

    let chunk = PathManager::new(app.root.path()).chunk_path(&id, 2);
    tokio::fs::remove_file(&chunk).await.unwrap();

    // The connection may drop before or after the response head is flushed;
    // either way no complete body may arrive.
    let sent = app.client.get(app.url(stream_path(&body))).send().await;
    match sent {
        Err(err) => tracing::debug!(error = %err, "stream aborted before the head"),
        Ok(resp) => {
            assert_eq!(resp.status(), StatusCode::OK);
            assert!(resp.bytes().await.is_err());
        }
    }
}

#[tokio::test]
async fn health_probe() {
    let app = spawn_app(1024).await;
    let resp = app.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json(resp).await["status"], "ok");
}
