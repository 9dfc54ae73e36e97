//! ==============================================================================
//! server.rs - kiosk shell web server
//! ==============================================================================
//!
//! purpose:
//!     serves the page the kiosk browser shows full-screen, plus the small
//!     api it talks to:
//!
//!     GET  /                          shell page (optional ?session=<id>)
//!     GET  /style.css /app.js         shell assets
//!     GET  /manifest.json /sw.js      install manifest and asset cache worker
//!     GET  /api/state                 device id, location, frame, indicator
//!     POST /api/frames/:id/loaded     iframe onload for frame :id
//!     POST /api/frames/:id/error      iframe onerror for frame :id
//!
//!     assets are compiled into the binary, so the shell works offline as
//!     long as the host is up; sw.js additionally caches them in the browser.
//!
//! relationships:
//!     - uses: controller.rs (session switch), session.rs (snapshot),
//!       render.rs (frame callbacks)
//!     - used by: main.rs
//!
//! ==============================================================================

use crate::controller::KioskController;
use crate::render::FrameId;
use crate::session::SessionSnapshot;

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

const INDEX_HTML: &str = include_str!("../assets/index.html");
const STYLE_CSS: &str = include_str!("../assets/style.css");
const APP_JS: &str = include_str!("../assets/app.js");
const MANIFEST_JSON: &str = include_str!("../assets/manifest.json");
const SERVICE_WORKER_JS: &str = include_str!("../assets/sw.js");

/// name of the browser-side asset cache; bumps with every release
pub fn shell_cache_name() -> String {
    format!("kiosk-shell-cache-v{}", env!("CARGO_PKG_VERSION"))
}

pub fn router(kiosk: Arc<KioskController>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/style.css", get(|| async { ([(header::CONTENT_TYPE, "text/css")], STYLE_CSS) }))
        .route("/app.js", get(|| async { ([(header::CONTENT_TYPE, "text/javascript")], APP_JS) }))
        .route(
            "/manifest.json",
            get(|| async { ([(header::CONTENT_TYPE, "application/manifest+json")], MANIFEST_JSON) }),
        )
        .route("/sw.js", get(service_worker_handler))
        .route("/api/state", get(state_handler))
        .route("/api/frames/:id/loaded", post(frame_loaded_handler))
        .route("/api/frames/:id/error", post(frame_error_handler))
        .layer(CorsLayer::permissive())
        .with_state(kiosk)
}

pub async fn run_server<F>(bind: &str, kiosk: Arc<KioskController>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "Kiosk shell listening");
    axum::serve(listener, router(kiosk))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[derive(Deserialize)]
struct ShellParams {
    session: Option<String>,
}

/// shell page; a `session` query switches the directory, resuming a halted kiosk
async fn index_handler(
    State(kiosk): State<Arc<KioskController>>,
    Query(params): Query<ShellParams>,
) -> Html<String> {
    if let Some(id) = params.session.as_deref() {
        // a rejected id is already on screen
        let _ = kiosk.switch_session(id).await;
    }

    let message = kiosk.session().snapshot().await.render.indicator.message;
    Html(INDEX_HTML.replace("{{STATUS}}", &html_escape(&message)))
}

async fn service_worker_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/javascript")],
        SERVICE_WORKER_JS.replace("{{CACHE_NAME}}", &shell_cache_name()),
    )
}

/// json api endpoint polled by the shell page
async fn state_handler(State(kiosk): State<Arc<KioskController>>) -> Json<SessionSnapshot> {
    Json(kiosk.session().snapshot().await)
}

async fn frame_loaded_handler(
    State(kiosk): State<Arc<KioskController>>,
    Path(id): Path<u64>,
) -> Json<serde_json::Value> {
    let accepted = kiosk.session().renderer().frame_loaded(FrameId::new(id)).await;
    Json(serde_json::json!({"status": "ok", "accepted": accepted}))
}

#[derive(Deserialize)]
struct FrameErrorBody {
    #[serde(default)]
    message: String,
}

async fn frame_error_handler(
    State(kiosk): State<Arc<KioskController>>,
    Path(id): Path<u64>,
    body: Option<Json<FrameErrorBody>>,
) -> Json<serde_json::Value> {
    let message = body.map(|Json(b)| b.message).unwrap_or_default();
    let accepted = kiosk.session().renderer().frame_failed(FrameId::new(id), &message).await;
    if !accepted {
        warn!(frame = id, "Error report for a frame that is not mounted");
    }
    Json(serde_json::json!({"status": "ok", "accepted": accepted}))
}

/// escape html special characters to prevent xss
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{GeneratedSource, IdentityResolver};
    use crate::location::{ConfigSource, LocationTemplate};
    use crate::render::Renderer;
    use crate::session::tests::{directory, session_with, ScriptedDirectory};
    use crate::session::KioskSession;
    use crate::store::{MemoryStore, DEVICE_ID_KEY};
    use std::time::Duration;

    async fn serve(session: Arc<KioskSession>) -> String {
        serve_controller(Arc::new(KioskController::new(session, Duration::from_secs(900)))).await
    }

    async fn serve_controller(kiosk: Arc<KioskController>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(kiosk)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn rendered_session() -> Arc<KioskSession> {
        let scripted = Arc::new(ScriptedDirectory::new(vec![Ok(directory(&[("kiosk-1", "https://slides.example/a")]))]));
        let session = Arc::new(session_with("kiosk-1", scripted));
        session.configure(None).await.unwrap();
        session.run_cycle().await;
        session
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("<b>\"x\" & y</b>"), "&lt;b&gt;&quot;x&quot; &amp; y&lt;/b&gt;");
    }

    #[tokio::test]
    async fn test_state_and_frame_callbacks() {
        let session = rendered_session().await;
        let base = serve(session.clone()).await;
        let client = reqwest::Client::new();

        let state: serde_json::Value = client.get(format!("{}/api/state", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(state["device_id"], "kiosk-1");
        assert_eq!(state["frame"]["url"], "https://slides.example/a");
        assert_eq!(state["frame"]["state"], "loading");
        assert_eq!(state["frame_visible"], false);
        let frame_id = state["frame"]["id"].as_u64().unwrap();

        let reply: serde_json::Value = client
            .post(format!("{}/api/frames/{}/loaded", base, frame_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply["accepted"], true);

        let state: serde_json::Value = client.get(format!("{}/api/state", base)).send().await.unwrap().json().await.unwrap();
        assert_eq!(state["frame"]["state"], "loaded");
        assert_eq!(state["frame_visible"], true);
        assert_eq!(state["indicator"]["visible"], false);
    }

    #[tokio::test]
    async fn test_frame_error_is_shown() {
        let session = rendered_session().await;
        let base = serve(session.clone()).await;
        let frame_id = session.snapshot().await.render.frame.unwrap().id.value();

        let reply: serde_json::Value = reqwest::Client::new()
            .post(format!("{}/api/frames/{}/error", base, frame_id))
            .json(&serde_json::json!({"message": "blocked by X-Frame-Options"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(reply["accepted"], true);

        let snapshot = session.snapshot().await.render;
        assert!(snapshot.frame.is_none());
        assert!(snapshot.indicator.message.contains("X-Frame-Options"));
    }

    #[tokio::test]
    async fn test_shell_assets_are_served() {
        let base = serve(rendered_session().await).await;

        let index = reqwest::get(format!("{}/", base)).await.unwrap().text().await.unwrap();
        assert!(index.contains("app.js"));
        assert!(!index.contains("{{STATUS}}"));

        let sw = reqwest::get(format!("{}/sw.js", base)).await.unwrap().text().await.unwrap();
        assert!(sw.contains(&shell_cache_name()));
        assert!(!sw.contains("{{CACHE_NAME}}"));
    }

    #[tokio::test]
    async fn test_session_query_resumes_halted_kiosk() {
        let scripted = Arc::new(ScriptedDirectory::new(vec![Ok(directory(&[("kiosk-1", "https://slides.example/a")]))]));
        let store = Arc::new(MemoryStore::with(DEVICE_ID_KEY, "kiosk-1"));
        let resolver = IdentityResolver::new(store.clone(), Box::new(GeneratedSource), "GIPS");
        let template = LocationTemplate::parse("https://sheets.example/{session}.csv").unwrap();
        let session = Arc::new(KioskSession::new(
            resolver,
            scripted.clone(),
            ConfigSource::Session(template),
            store,
            Renderer::new(),
        ));
        let kiosk = Arc::new(KioskController::new(session.clone(), Duration::from_secs(900)));
        assert!(kiosk.startup(None).await.is_err());
        let base = serve_controller(kiosk.clone()).await;

        let index = reqwest::get(format!("{}/?session=lobby", base)).await.unwrap().text().await.unwrap();
        assert!(!index.contains("Sheet ID is missing"));

        assert_eq!(scripted.calls(), 1);
        assert!(kiosk.is_running().await);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.location.as_deref(), Some("https://sheets.example/lobby.csv"));
        assert_eq!(snapshot.render.frame.unwrap().url, "https://slides.example/a");
        kiosk.shutdown().await;
    }
}
