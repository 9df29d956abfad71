//! # Web interface
//!
//! Axum front end for the light. Every handler talks to the light through a
//! cloned [`BlasterHandle`]; nothing here touches the device directly.
//!
//! | Path | Description |
//! |------|-------------|
//! | `/` | `index.html` from the static directory |
//! | `/do?action=…` | Run an action (`set` with `r`,`g`,`b`, `off`, `lighter`, `darker`) and report the color |
//! | `/color` | Current color as `#rrggbb` |
//! | `/static/*` | Files from the static directory |

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tower_http::services::ServeDir;

use pilight_lib::action::Action;
use pilight_lib::actor::BlasterHandle;
use pilight_lib::color::AdjustMode;
use pilight_lib::error::{PilightError, Result};

/// Minimum spacing between color changes coming in over HTTP.
///
/// Waiters queue on the lock, so bursts are spread out rather than dropped.
pub struct Cooldown {
    spacing: Duration,
    last: Mutex<Option<Instant>>,
}

impl Cooldown {
    pub fn new(spacing: Duration) -> Self {
        Cooldown {
            spacing,
            last: Mutex::new(None),
        }
    }

    /// Wait until `spacing` has passed since the previous call returned.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.spacing).await;
        }
        *last = Some(Instant::now());
    }
}

/// Shared state passed to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub blaster: BlasterHandle,
    pub static_dir: PathBuf,
    pub adjust_step: u8,
    pub adjust: AdjustMode,
    pub cooldown: Arc<Cooldown>,
}

/// Handler failure, reported to the client as `400 Bad Request`.
struct ApiError(PilightError);

impl From<PilightError> for ApiError {
    fn from(e: PilightError) -> Self {
        ApiError(e)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        ApiError(PilightError::Io(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        log::warn!("request failed: {}", self.0);
        (StatusCode::BAD_REQUEST, format!("Oh... :(\n\n{}", self.0)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.static_dir);
    Router::new()
        .route("/", get(index))
        .route("/do", get(do_action))
        .route("/color", get(color))
        .nest_service("/static", assets)
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl+C.
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on http://{addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("shutting down"),
        Err(e) => log::error!("cannot listen for Ctrl+C, shutting down: {e}"),
    }
}

async fn index(State(state): State<AppState>) -> std::result::Result<Html<String>, ApiError> {
    let page = tokio::fs::read_to_string(state.static_dir.join("index.html")).await?;
    Ok(Html(page))
}

async fn do_action(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> std::result::Result<String, ApiError> {
    let action = Action::from_params(&params);
    if action.changes_color() {
        state.cooldown.wait().await;
    }
    let color = action
        .run(&state.blaster, state.adjust_step, state.adjust)
        .await?;
    Ok(color.to_string())
}

async fn color(State(state): State<AppState>) -> std::result::Result<String, ApiError> {
    Ok(state.blaster.current_color().await?.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pilight_lib::actor::{self, BlasterSettings};
    use pilight_lib::device::DeviceWriter;
    use pilight_lib::device::mock::MockSink;
    use pilight_lib::transform::Transform;
    use tower::ServiceExt;

    fn state_with(settings: BlasterSettings, static_dir: PathBuf) -> (AppState, MockSink) {
        let sink = MockSink::new();
        let (blaster, _task) = actor::spawn(DeviceWriter::new(sink.clone()), settings);
        let state = AppState {
            blaster,
            static_dir,
            adjust_step: 10,
            adjust: AdjustMode::Wrap,
            cooldown: Arc::new(Cooldown::new(Duration::ZERO)),
        };
        (state, sink)
    }

    fn default_state() -> (AppState, MockSink) {
        state_with(BlasterSettings::default(), PathBuf::from("does-not-exist"))
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    // ── /do ──

    #[tokio::test]
    async fn set_reports_corrected_color() {
        let (state, sink) = default_state();
        let (status, body) = get(router(state), "/do?action=set&r=200&g=200&b=200").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "#c85d28");
        assert_eq!(sink.lines().len(), 3);
    }

    #[tokio::test]
    async fn off_reports_black() {
        let (state, _) = default_state();
        let app = router(state);
        get(app.clone(), "/do?action=set&r=255&g=255&b=255").await;
        let (_, body) = get(app, "/do?action=off").await;
        assert_eq!(body, "#000000");
    }

    #[tokio::test]
    async fn lighter_wraps_past_full() {
        let settings = BlasterSettings {
            transform: Transform::Fade,
            ..BlasterSettings::default()
        };
        let (state, _) = state_with(settings, PathBuf::new());
        let app = router(state);
        get(app.clone(), "/do?action=set&r=250&g=250&b=250").await;
        let (status, body) = get(app, "/do?action=lighter").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "#040404");
    }

    #[tokio::test]
    async fn unknown_action_only_reports() {
        let (state, sink) = default_state();
        let (status, body) = get(router(state), "/do?action=disco").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "#000000");
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn garbage_channels_become_zero() {
        let (state, _) = default_state();
        let (status, body) = get(router(state), "/do?action=set&r=x&g=999&b=255").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "#000033");
    }

    // ── /color ──

    #[tokio::test]
    async fn color_reports_current() {
        let (state, _) = default_state();
        let app = router(state);
        get(app.clone(), "/do?action=set&r=255&g=0&b=0").await;
        let (status, body) = get(app, "/color").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "#ff0000");
    }

    #[tokio::test]
    async fn stopped_controller_is_bad_request() {
        let sink = MockSink::new();
        let (blaster, task) =
            actor::spawn(DeviceWriter::new(sink), BlasterSettings::default());
        task.abort();
        let _ = task.await;
        let state = AppState {
            blaster,
            static_dir: PathBuf::new(),
            adjust_step: 10,
            adjust: AdjustMode::Wrap,
            cooldown: Arc::new(Cooldown::new(Duration::ZERO)),
        };
        let (status, body) = get(router(state), "/color").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("Oh... :("));
        assert!(body.contains("Light controller is not running"));
    }

    // ── pages ──

    #[tokio::test]
    async fn index_and_static_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>light</h1>").unwrap();
        std::fs::write(dir.path().join("app.js"), "go()").unwrap();
        let (state, _) = state_with(BlasterSettings::default(), dir.path().to_path_buf());
        let app = router(state);

        let (status, body) = get(app.clone(), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<h1>light</h1>");

        let (status, body) = get(app, "/static/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "go()");
    }

    #[tokio::test]
    async fn missing_index_is_bad_request() {
        let (state, _) = default_state();
        let (status, body) = get(router(state), "/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("I/O error"));
    }

    // ── cooldown ──

    #[tokio::test(start_paused = true)]
    async fn cooldown_spaces_out_changes() {
        let cooldown = Cooldown::new(Duration::from_millis(10));
        let start = Instant::now();
        cooldown.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        cooldown.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(10));
        cooldown.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_idle_gap_means_no_wait() {
        let cooldown = Cooldown::new(Duration::from_millis(10));
        cooldown.wait().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = Instant::now();
        cooldown.wait().await;
        assert_eq!(before.elapsed(), Duration::ZERO);
    }
}
