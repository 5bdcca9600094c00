use std::net::SocketAddr;
use std::path::{Path as StdPath, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{working_base_dir, AppConfig};
use crate::job::JobRunner;
use crate::media::{FfmpegTranscoder, YtDlpSource};
use crate::message::{ChannelEvent, OutboundMessage};
use crate::registry::SharedRegistry;
use crate::replay::UnreachablePolicy;
use crate::session::{ChannelSession, SessionContext};
use crate::store::{ArtifactStore, MemoryArtifactStore, SqliteArtifactStore};
use crate::verify::{AvailabilityVerifier, HttpProbeVerifier};

pub const RESET_RESPONSE_BODY: &str = "Server Hath Been Purged";
const OUTBOUND_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    registry: SharedRegistry,
    runner: JobRunner,
    verifier: Arc<dyn AvailabilityVerifier>,
    policy: UnreachablePolicy,
    public_dir: PathBuf,
    sessions: DashMap<Uuid, DateTime<Utc>>,
}

impl AppState {
    pub fn new(
        registry: SharedRegistry,
        runner: JobRunner,
        verifier: Arc<dyn AvailabilityVerifier>,
        policy: UnreachablePolicy,
        public_dir: PathBuf,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                registry,
                runner,
                verifier,
                policy,
                public_dir,
                sessions: DashMap::new(),
            }),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.inner.registry
    }

    pub fn media_dir(&self) -> &StdPath {
        self.inner.runner.media_dir()
    }

    pub fn public_dir(&self) -> &StdPath {
        &self.inner.public_dir
    }

    pub fn active_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: self.inner.registry.clone(),
            runner: self.inner.runner.clone(),
            verifier: self.inner.verifier.clone(),
            policy: self.inner.policy,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub active_sessions: usize,
    pub artifacts: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn app_router(state: AppState) -> Router {
    let public_dir = state.public_dir().to_path_buf();
    let api = Router::new()
        .route("/api/health", get(health))
        .route("/ws", get(channel_ws))
        .route("/audio/{folder}/{file_name}", get(serve_media))
        .route("/reset-db", get(reset_db))
        .route("/expose-db", get(expose_db))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let index = public_dir.join("index.html");
    let site = ServeDir::new(&public_dir).fallback(ServeFile::new(index));
    api.fallback_service(site)
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_sessions: state.active_sessions(),
        artifacts: state.registry().len().await,
    })
}

async fn reset_db(State(state): State<AppState>) -> Result<&'static str, AppError> {
    state
        .registry()
        .reset()
        .await
        .map_err(|err| AppError::Internal(err.to_string()))?;
    info!(store = %state.registry().store_location(), "Registry purged");
    Ok(RESET_RESPONSE_BODY)
}

async fn expose_db(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.registry().snapshot().await)
}

async fn serve_media(
    State(state): State<AppState>,
    Path((folder, file_name)): Path<(String, String)>,
    request: Request,
) -> Result<Response, AppError> {
    let path = resolve_media_path(state.media_dir(), &folder, &file_name).await?;

    // Streams the body; answers HEAD, Range and conditional requests.
    let response = ServeFile::new(&path)
        .oneshot(request)
        .await
        .map_err(|e| AppError::Internal(format!("failed to serve media file: {e}")))?;
    Ok(response.map(Body::new))
}

fn sanitize_media_segment(segment: &str) -> Result<(), AppError> {
    if segment.trim().is_empty() {
        return Err(AppError::BadRequest("path segment must not be empty".into()));
    }
    if segment.contains('/') || segment.contains('\\') || segment.contains('\0') {
        return Err(AppError::BadRequest(
            "path segment must not contain separators".into(),
        ));
    }
    if segment == "." || segment == ".." {
        return Err(AppError::BadRequest(
            "path segment must not be a relative component".into(),
        ));
    }
    Ok(())
}

/// Map a `(folder, file)` pair onto a regular file that lives inside
/// `media_root` once symlinks are resolved.
async fn resolve_media_path(
    media_root: &StdPath,
    folder: &str,
    file_name: &str,
) -> Result<PathBuf, AppError> {
    sanitize_media_segment(folder)?;
    sanitize_media_segment(file_name)?;

    let not_found = || AppError::NotFound("File not found".to_string());
    let candidate = media_root.join(folder).join(file_name);
    let canonical = tokio::fs::canonicalize(&candidate)
        .await
        .map_err(|_| not_found())?;
    let canonical_root = tokio::fs::canonicalize(media_root)
        .await
        .map_err(|_| not_found())?;

    if !canonical.starts_with(&canonical_root) {
        warn!(
            requested = %candidate.display(),
            resolved = %canonical.display(),
            "Media request escapes the media root"
        );
        return Err(AppError::Forbidden("access outside media root".to_string()));
    }

    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    Ok(canonical)
}

async fn channel_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_channel(socket, state))
}

async fn handle_channel(socket: WebSocket, state: AppState) {
    let (mut sink, stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_BUFFER);

    let session = ChannelSession::new(state.session_context(), tx);
    let session_id = session.id();
    state.inner.sessions.insert(session_id, Utc::now());

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "Failed to encode outbound message");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let inbound = stream.filter_map(|frame| async move { channel_event(frame) });
    let summary = session.run(inbound).await;

    state.inner.sessions.remove(&session_id);
    if let Err(err) = writer.await {
        warn!(session_id = %session_id, error = %err, "Channel writer task failed");
    }
    debug!(
        session_id = %session_id,
        replayed = summary.replay.delivered.len(),
        jobs_succeeded = summary.jobs_succeeded,
        jobs_failed = summary.jobs_failed,
        abandoned_job = summary.abandoned_job,
        "Channel closed"
    );
}

/// Translate a WebSocket frame into a session event. Control frames other
/// than close are handled by the transport and skipped here.
fn channel_event(frame: Result<Message, axum::Error>) -> Option<ChannelEvent> {
    match frame {
        Ok(Message::Text(text)) => Some(ChannelEvent::Text(text.as_str().to_owned())),
        // Undecodable payloads become an empty text frame, which the session
        // rejects like any other malformed request.
        Ok(Message::Binary(bytes)) => Some(ChannelEvent::Text(
            String::from_utf8(bytes.to_vec()).unwrap_or_default(),
        )),
        Ok(Message::Close(_)) => Some(ChannelEvent::Close),
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => None,
        Err(err) => {
            debug!(error = %err, "WebSocket receive failed");
            Some(ChannelEvent::Close)
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}

/// Base URL the availability probes use. An explicit public URL wins;
/// otherwise the bound address, with unspecified hosts mapped to loopback.
pub fn probe_base_url(public_base_url: Option<&str>, bound: SocketAddr) -> Result<Url> {
    if let Some(raw) = public_base_url.map(str::trim).filter(|raw| !raw.is_empty()) {
        return Url::parse(raw).with_context(|| format!("invalid server.public_base_url: {raw}"));
    }

    let host = match bound {
        SocketAddr::V4(addr) if addr.ip().is_unspecified() => "127.0.0.1".to_string(),
        SocketAddr::V6(addr) if addr.ip().is_unspecified() => "[::1]".to_string(),
        SocketAddr::V4(addr) => addr.ip().to_string(),
        SocketAddr::V6(addr) => format!("[{}]", addr.ip()),
    };
    Url::parse(&format!("http://{host}:{}", bound.port()))
        .with_context(|| format!("failed to derive probe URL from {bound}"))
}

/// Open the artifact store under `data_dir`, degrading to an in-memory
/// store when the database cannot be created.
pub fn open_artifact_store(data_dir: &StdPath) -> Arc<dyn ArtifactStore> {
    match SqliteArtifactStore::new(data_dir) {
        Ok(store) => {
            info!(db_path = %store.db_path().display(), "Artifact store ready");
            Arc::new(store)
        }
        Err(err) => {
            warn!(
                error = %format!("{err:#}"),
                data_dir = %data_dir.display(),
                "Failed to initialize artifact store; running with in-memory registry only"
            );
            Arc::new(MemoryArtifactStore::new())
        }
    }
}

pub fn app_state_with_config(
    config: &AppConfig,
    data_dir: &StdPath,
    probe_base: Url,
) -> Result<AppState> {
    let paths = config.resolved_paths(&working_base_dir());
    std::fs::create_dir_all(&paths.media_dir).with_context(|| {
        format!(
            "failed to create media directory: {}",
            paths.media_dir.display()
        )
    })?;

    let registry = SharedRegistry::new(open_artifact_store(data_dir));
    let runner = JobRunner::new(
        paths.media_dir.clone(),
        Arc::new(YtDlpSource::new()),
        Arc::new(FfmpegTranscoder::new()),
        registry.clone(),
        config.conversion.timeouts(),
    );
    let verifier = HttpProbeVerifier::new(probe_base)?;
    info!(
        media_dir = %paths.media_dir.display(),
        public_dir = %paths.public_dir.display(),
        probe_base = %verifier.base_url(),
        policy = ?config.replay.unreachable_policy,
        "Application state ready"
    );

    Ok(AppState::new(
        registry,
        runner,
        Arc::new(verifier),
        config.replay.unreachable_policy,
        paths.public_dir,
    ))
}

/// Serve `router` until `shutdown` is cancelled. Open channel sessions are
/// allowed to finish.
pub async fn serve(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("HTTP server terminated unexpectedly")
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};

    use super::*;
    use crate::artifact::ArtifactDescriptor;
    use crate::job::test_support::{FakeSource, FakeTranscoder};
    use crate::job::JobTimeouts;
    use crate::verify::Availability;
    use axum::http::{header, Method, Request};
    use tempfile::{tempdir, TempDir};
    use tower::{Service, ServiceExt};

    struct TestApp {
        state: AppState,
        store: Arc<MemoryArtifactStore>,
        dir: TempDir,
    }

    impl TestApp {
        fn media_dir(&self) -> PathBuf {
            self.dir.path().join("media")
        }
    }

    fn test_app_with_verifier(verifier: Arc<dyn AvailabilityVerifier>) -> TestApp {
        let dir = tempdir().unwrap();
        let media_dir = dir.path().join("media");
        let public_dir = dir.path().join("public");
        std::fs::create_dir_all(&media_dir).unwrap();
        std::fs::create_dir_all(&public_dir).unwrap();
        std::fs::write(public_dir.join("index.html"), "<h1>vault</h1>").unwrap();

        let store = Arc::new(MemoryArtifactStore::new());
        let registry = SharedRegistry::new(store.clone());
        let runner = JobRunner::new(
            media_dir,
            Arc::new(FakeSource::default()),
            Arc::new(FakeTranscoder::default()),
            registry.clone(),
            JobTimeouts::default(),
        );
        let state = AppState::new(
            registry,
            runner,
            verifier,
            UnreachablePolicy::ResetRegistry,
            public_dir,
        );
        TestApp { state, store, dir }
    }

    struct AlwaysReachable;

    #[async_trait::async_trait]
    impl AvailabilityVerifier for AlwaysReachable {
        async fn verify(&self, _descriptor: &ArtifactDescriptor) -> Availability {
            Availability::Reachable
        }
    }

    fn test_app() -> TestApp {
        test_app_with_verifier(Arc::new(AlwaysReachable))
    }

    fn write_artifact(app: &TestApp, title: &str) {
        let folder = app.media_dir().join(title);
        std::fs::create_dir_all(&folder).unwrap();
        std::fs::write(folder.join("audio.mp3"), b"ID3fake").unwrap();
    }

    async fn send_request(router: &mut Router, request: Request<Body>) -> Response {
        router
            .as_service()
            .ready()
            .await
            .unwrap()
            .call(request)
            .await
            .unwrap()
    }

    async fn get(router: &mut Router, uri: &str) -> Response {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send_request(router, request).await
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
            .to_vec()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&body_bytes(response).await).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_app();
        let mut router = app_router(app.state.clone());

        let resp = get(&mut router, "/api/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["artifacts"], 0);
    }

    #[tokio::test]
    async fn media_route_serves_existing_file_with_mime_type() {
        let app = test_app();
        write_artifact(&app, "Song A");
        let mut router = app_router(app.state.clone());

        let resp = get(&mut router, "/audio/Song%20A/audio.mp3").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(resp).await, b"ID3fake");
    }

    #[tokio::test]
    async fn media_route_answers_range_requests() {
        let app = test_app();
        let folder = app.media_dir().join("Song A");
        std::fs::create_dir_all(&folder).unwrap();
        let bytes: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(folder.join("audio.mp3"), &bytes).unwrap();
        let mut router = app_router(app.state.clone());

        let request = Request::builder()
            .uri("/audio/Song%20A/audio.mp3")
            .header(header::RANGE, "bytes=0-9")
            .body(Body::empty())
            .unwrap();
        let resp = send_request(&mut router, request).await;

        assert_eq!(resp.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 0-9/1000");
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");
        assert_eq!(body_bytes(resp).await, bytes[..10].to_vec());
    }

    #[tokio::test]
    async fn media_route_answers_head_without_body() {
        let app = test_app();
        write_artifact(&app, "Song A");
        let mut router = app_router(app.state.clone());

        let request = Request::builder()
            .method(Method::HEAD)
            .uri("/audio/Song%20A/audio.mp3")
            .body(Body::empty())
            .unwrap();
        let resp = send_request(&mut router, request).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_LENGTH], "7");
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn media_route_returns_404_for_missing_file() {
        let app = test_app();
        let mut router = app_router(app.state.clone());

        let resp = get(&mut router, "/audio/Nope/audio.mp3").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(resp).await["error"], "File not found");
    }

    #[tokio::test]
    async fn media_route_rejects_traversal_segments() {
        let app = test_app();
        std::fs::write(app.dir.path().join("secret.txt"), "top secret").unwrap();
        let mut router = app_router(app.state.clone());

        for uri in [
            "/audio/..%2F..%2Fetc/passwd",
            "/audio/../secret.txt",
            "/audio/..%5Csecret/x",
            "/audio/media/..%2Fsecret.txt",
        ] {
            let resp = get(&mut router, uri).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn media_route_forbids_symlinks_out_of_root() {
        let app = test_app();
        let outside = app.dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("audio.mp3"), "leak").unwrap();
        std::os::unix::fs::symlink(&outside, app.media_dir().join("escape")).unwrap();
        let mut router = app_router(app.state.clone());

        let resp = get(&mut router, "/audio/escape/audio.mp3").await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn expose_and_reset_reflect_registry() {
        let app = test_app();
        let descriptor = ArtifactDescriptor::for_title("Song A").unwrap();
        app.store.save(&[descriptor.encode()]).await.unwrap();
        app.state.registry().sync_from_store().await.unwrap();
        let mut router = app_router(app.state.clone());

        let resp = get(&mut router, "/expose-db").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!(["Song A%17/audio/Song%20A/audio.mp3"])
        );

        let resp = get(&mut router, "/reset-db").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, RESET_RESPONSE_BODY.as_bytes());
        assert_eq!(app.state.registry().len().await, 0);
        assert!(app.store.load().await.unwrap().is_empty());

        let resp = get(&mut router, "/expose-db").await;
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn unknown_paths_fall_back_to_public_site() {
        let app = test_app();
        let mut router = app_router(app.state.clone());

        let resp = get(&mut router, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_bytes(resp).await, b"<h1>vault</h1>");

        let resp = get(&mut router, "/some/client/route").await;
        assert_eq!(body_bytes(resp).await, b"<h1>vault</h1>");
    }

    #[tokio::test]
    async fn replay_probes_artifacts_through_media_route() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = probe_base_url(None, listener.local_addr().unwrap()).unwrap();
        let app = test_app_with_verifier(Arc::new(HttpProbeVerifier::new(base).unwrap()));
        write_artifact(&app, "Song A");
        let kept = ArtifactDescriptor::for_title("Song A").unwrap();
        app.store.save(&[kept.encode()]).await.unwrap();

        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve(
            listener,
            app_router(app.state.clone()),
            shutdown.clone(),
        ));

        let (tx, mut rx) = mpsc::channel(8);
        let summary = ChannelSession::new(app.state.session_context(), tx)
            .run(futures_util::stream::empty())
            .await;

        assert_eq!(summary.replay.delivered, vec![kept.clone()]);
        assert_eq!(rx.recv().await, Some(OutboundMessage::delivered(&kept)));

        std::fs::remove_file(app.media_dir().join("Song A").join("audio.mp3")).unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let summary = ChannelSession::new(app.state.session_context(), tx)
            .run(futures_util::stream::empty())
            .await;

        assert!(summary.replay.registry_reset);
        assert_eq!(rx.recv().await, None);
        assert!(app.store.load().await.unwrap().is_empty());

        shutdown.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }

    #[test]
    fn channel_event_maps_frames() {
        assert_eq!(
            channel_event(Ok(Message::Text("{}".into()))),
            Some(ChannelEvent::Text("{}".to_string()))
        );
        assert_eq!(
            channel_event(Ok(Message::Binary(b"{}".to_vec().into()))),
            Some(ChannelEvent::Text("{}".to_string()))
        );
        assert_eq!(
            channel_event(Ok(Message::Binary(vec![0xff, 0xfe].into()))),
            Some(ChannelEvent::Text(String::new()))
        );
        assert_eq!(channel_event(Ok(Message::Close(None))), Some(ChannelEvent::Close));
        assert_eq!(channel_event(Ok(Message::Ping(Vec::new().into()))), None);
        assert_eq!(
            channel_event(Err(axum::Error::new(std::io::Error::other("reset")))),
            Some(ChannelEvent::Close)
        );
    }

    #[test]
    fn probe_base_url_prefers_configured_value() {
        let bound = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 3000));
        let url = probe_base_url(Some("https://vault.example/"), bound).unwrap();
        assert_eq!(url.as_str(), "https://vault.example/");
    }

    #[test]
    fn probe_base_url_maps_unspecified_hosts_to_loopback() {
        let v4 = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 3000));
        assert_eq!(
            probe_base_url(None, v4).unwrap().as_str(),
            "http://127.0.0.1:3000/"
        );

        let v6 = SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, 8080, 0, 0));
        assert_eq!(
            probe_base_url(Some("  "), v6).unwrap().as_str(),
            "http://[::1]:8080/"
        );
    }

    #[test]
    fn probe_base_url_rejects_garbage() {
        let bound = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000));
        assert!(probe_base_url(Some("not a url"), bound).is_err());
    }
}
