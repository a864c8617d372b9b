//! Browser form for image-to-video conversion.
//!
//! `POST /api/convert` answers with a server-sent event stream carrying two
//! updates: `Processing...` immediately, then the final state once the
//! conversion settles, with keep-alive comments in between so idle proxies
//! hold the connection open. Generated videos are served back from `/output`.

mod form;

pub use form::{FormStatus, StatusUpdate};

use crate::cli::timestamped_path;
use anyhow::Context;
use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use kinema_core::ConversionService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::{Stream, StreamExt as _};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

type HandlerError = (StatusCode, String);

/// Everything the handlers need, shared read-only across requests.
pub struct AppState {
    pub service: Arc<dyn ConversionService>,
    /// Generated videos land here and are served under `/output`
    pub output_dir: PathBuf,
    /// Uploaded source images are saved here
    pub upload_dir: PathBuf,
    /// Model preselected in the dropdown
    pub default_model: String,
    /// Gap between keep-alive comments while a conversion runs
    pub keep_alive: Duration,
}

pub fn router(state: AppState) -> Router {
    let outputs = ServeDir::new(&state.output_dir);
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/convert", post(convert))
        .nest_service("/output", outputs)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    for dir in [&state.output_dir, &state.upload_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!("Form running at http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(form::render_page(&state.default_model))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Default)]
struct ConvertForm {
    image: Option<(String, Bytes)>,
    image_url: String,
    prompt: String,
    model: String,
}

async fn read_form(mut multipart: Multipart) -> Result<ConvertForm, HandlerError> {
    let bad_request = |e: MultipartError| (StatusCode::BAD_REQUEST, e.to_string());
    let mut form = ConvertForm::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_request)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().unwrap_or("upload.png").to_string();
                let data = field.bytes().await.map_err(bad_request)?;
                if !data.is_empty() {
                    form.image = Some((file_name, data));
                }
            }
            "image_url" => form.image_url = field.text().await.map_err(bad_request)?,
            "prompt" => form.prompt = field.text().await.map_err(bad_request)?,
            "model" => form.model = field.text().await.map_err(bad_request)?,
            _ => {}
        }
    }
    Ok(form)
}

/// Keep the upload's extension when it is one the vendors accept.
fn upload_extension(file_name: &str) -> String {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "webp" => ext,
        _ => "png".to_string(),
    }
}

fn video_url(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("/output/{name}")
}

/// Save an uploaded image and return its path.
async fn save_upload(upload_dir: &Path, file_name: &str, data: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(upload_dir).await?;
    let upload = timestamped_path(upload_dir, "upload", &upload_extension(file_name));
    tokio::fs::write(&upload, data).await?;
    Ok(upload)
}

/// The image source handed to the converter: a typed URL wins over an
/// uploaded file, since URL-only vendors have no other way in.
async fn image_source(state: &AppState, form: &ConvertForm) -> Result<String, HandlerError> {
    let url = form.image_url.trim();
    if !url.is_empty() {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Image URL must be http(s), got '{url}'"),
            ));
        }
        return Ok(url.to_string());
    }

    let (file_name, data) = form.image.as_ref().ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "Missing required 'image' field".to_string(),
        )
    })?;
    let upload = save_upload(&state.upload_dir, file_name, data)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(upload.to_string_lossy().into_owned())
}

async fn convert(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, HandlerError> {
    let form = read_form(multipart).await?;
    let image = image_source(&state, &form).await?;
    let output = timestamped_path(&state.output_dir, "video", "mp4");
    let keep_alive = KeepAlive::new().interval(state.keep_alive).text("keep-alive");

    // Room for both updates, so neither send ever waits on the client
    let (tx, rx) = mpsc::channel(2);
    if tx.send(FormStatus::Processing).await.is_err() {
        tracing::debug!("Status channel closed before the first update");
    }
    tokio::spawn(run_conversion(
        state,
        image,
        output,
        form.prompt,
        form.model,
        tx,
    ));

    let stream =
        ReceiverStream::new(rx).map(|status| Event::default().json_data(status.update()));
    Ok(Sse::new(stream).keep_alive(keep_alive))
}

async fn run_conversion(
    state: Arc<AppState>,
    image: String,
    output: PathBuf,
    prompt: String,
    model: String,
    tx: mpsc::Sender<FormStatus>,
) {
    let model = model.trim();
    let model = (!model.is_empty()).then_some(model);

    let status = match state
        .service
        .convert(&image, &prompt, &output, model)
        .await
    {
        Ok(report) => FormStatus::Done {
            video: video_url(&report.output_path),
        },
        Err(e) => FormStatus::Failed {
            message: e.to_string(),
        },
    };

    if tx.send(status).await.is_err() {
        tracing::debug!("Form client disconnected before the result was ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use kinema_core::{ConversionReport, ConvertError, ModelType};
    use tower::ServiceExt;

    const BOUNDARY: &str = "kinema-test-boundary";

    /// Writes a fixed payload instead of calling a vendor, after an optional
    /// pause standing in for the vendor's polling.
    #[derive(Default)]
    struct StubService {
        delay: Duration,
    }

    #[async_trait]
    impl ConversionService for StubService {
        async fn convert(
            &self,
            image: &str,
            prompt: &str,
            output: &Path,
            model_type: Option<&str>,
        ) -> Result<ConversionReport, ConvertError> {
            let model: ModelType = model_type
                .ok_or(ConvertError::ModelNotSpecified)?
                .parse()?;
            let payload = if image.starts_with("https://") {
                format!("stub-video from {image}")
            } else {
                assert!(Path::new(image).exists(), "upload was not saved");
                "stub-video".to_string()
            };
            tokio::time::sleep(self.delay).await;

            tokio::fs::write(output, payload)
                .await
                .map_err(|source| ConvertError::Input {
                    path: output.display().to_string(),
                    source,
                })?;
            Ok(ConversionReport {
                model,
                job_id: "stub-1".to_string(),
                output_path: output.to_path_buf(),
                bytes: 10,
                prompt: prompt.to_string(),
            })
        }
    }

    fn app_with(dir: &Path, service: StubService, keep_alive: Duration) -> Router {
        router(AppState {
            service: Arc::new(service),
            output_dir: dir.join("output"),
            upload_dir: dir.join("uploads"),
            default_model: "Replicate".to_string(),
            keep_alive,
        })
    }

    fn app(dir: &Path) -> Router {
        app_with(dir, StubService::default(), Duration::from_secs(15))
    }

    fn multipart_request(fields: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, data) in fields {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            match file_name {
                Some(file_name) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                         Content-Type: image/png\r\n\r\n"
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                ),
            }
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/api/convert")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn read_stream(app: Router, request: Request<Body>) -> String {
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8_lossy(&body).into_owned()
    }

    fn parse_events(stream: &str) -> Vec<StatusUpdate> {
        stream
            .split("\n\n")
            .filter_map(|frame| {
                frame
                    .lines()
                    .find_map(|line| line.strip_prefix("data:"))
                    .map(|data| serde_json::from_str(data.trim()).unwrap())
            })
            .collect()
    }

    async fn read_events(app: Router, request: Request<Body>) -> Vec<StatusUpdate> {
        parse_events(&read_stream(app, request).await)
    }

    async fn get_page(app: Router, uri: &str) -> (StatusCode, Bytes) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, body)
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_page(app(dir.path()), "/").await;
        let page = String::from_utf8_lossy(&body);

        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("Enter a prompt or leave blank to auto-generate"));
        assert!(page.contains("<option value=\"Replicate\" selected>"));
        assert!(page.contains(">Run</button>"));
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = get_page(app(dir.path()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"ok");
    }

    #[tokio::test]
    async fn test_convert_streams_processing_then_video() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("output")).unwrap();
        let app = app(dir.path());

        let request = multipart_request(&[
            ("image", Some("still.png"), &b"\x89PNG"[..]),
            ("prompt", None, &b"waves"[..]),
            ("model", None, &b"Stability"[..]),
        ]);
        let events = read_events(app.clone(), request).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "Processing...");
        assert_eq!(events[0].video, None);
        assert_eq!(events[1].status, "");

        let video = events[1].video.clone().unwrap();
        assert!(video.starts_with("/output/video-"));
        assert!(video.ends_with(".mp4"));

        let (status, body) = get_page(app, &video).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_ref(), b"stub-video");
    }

    #[tokio::test]
    async fn test_slow_conversion_stream_carries_keep_alives() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("output")).unwrap();
        let service = StubService {
            delay: Duration::from_millis(200),
        };
        let app = app_with(dir.path(), service, Duration::from_millis(20));

        let request = multipart_request(&[
            ("image", Some("still.png"), &b"\x89PNG"[..]),
            ("model", None, &b"Replicate"[..]),
        ]);
        let stream = read_stream(app, request).await;

        assert!(stream.contains("keep-alive"));
        let events = parse_events(&stream);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "Processing...");
        assert!(events[1].video.is_some());
    }

    #[tokio::test]
    async fn test_convert_accepts_image_url_without_upload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("output")).unwrap();
        let app = app(dir.path());

        let request = multipart_request(&[
            ("image_url", None, &b" https://img.host/cat.png "[..]),
            ("prompt", None, &b"cat"[..]),
            ("model", None, &b"PiAPI"[..]),
        ]);
        let events = read_events(app.clone(), request).await;

        let video = events[1].video.clone().unwrap();
        let (_, body) = get_page(app, &video).await;
        assert_eq!(body.as_ref(), b"stub-video from https://img.host/cat.png");
        assert!(!dir.path().join("uploads").exists());
    }

    #[tokio::test]
    async fn test_convert_rejects_non_http_image_url() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[
            ("image_url", None, &b"file:///etc/passwd"[..]),
            ("model", None, &b"PiAPI"[..]),
        ]);
        let response = app(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_convert_reports_unsupported_model() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[
            ("image", Some("still.png"), &b"\x89PNG"[..]),
            ("prompt", None, &b""[..]),
            ("model", None, &b"Sora"[..]),
        ]);
        let events = read_events(app(dir.path()), request).await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, "Processing...");
        assert_eq!(
            events[1].status,
            "Error during conversion: Unsupported model: Sora"
        );
        assert_eq!(events[1].video, None);
    }

    #[tokio::test]
    async fn test_convert_without_model_is_not_specified() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[("image", Some("still.jpg"), &b"\xFF\xD8"[..])]);
        let events = read_events(app(dir.path()), request).await;

        assert_eq!(
            events[1].status,
            "Error during conversion: Image-to-video model is not specified"
        );
    }

    #[tokio::test]
    async fn test_convert_without_image_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_request(&[("prompt", None, &b"waves"[..])]);
        let response = app(dir.path()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upload_extension() {
        assert_eq!(upload_extension("a.JPG"), "jpg");
        assert_eq!(upload_extension("a.webp"), "webp");
        assert_eq!(upload_extension("a.tiff"), "png");
        assert_eq!(upload_extension("noext"), "png");
    }
}
