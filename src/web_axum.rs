//! Axum-based HTTP operator surface (§6.3), with optional OpenAPI (utoipa)
//! and Swagger UI behind the `openapi` feature -- matching the teacher's
//! `web_axum.rs` shape.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::control_loop::TickSummary;
use crate::controller::ModeController;

#[cfg(feature = "openapi")]
use utoipa::{OpenApi, ToSchema};
#[cfg(feature = "openapi")]
use utoipa_swagger_ui::SwaggerUi;

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<ModeController>,
    pub summary_rx: watch::Receiver<TickSummary>,
    pub config: Arc<Config>,
}

#[derive(Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EnableBody {
    pub enabled: bool,
}

#[derive(Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ModeBody {
    pub mode: String,
}

#[derive(Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TunablesBody {
    pub hysteresis_threshold_a: Option<f64>,
    pub ramp_up_delay_s: Option<f64>,
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/health", responses(
    (status = 200, description = "Service is healthy")
)))]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/status", responses(
    (status = 200, description = "Latest tick summary")
)))]
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let summary = state.summary_rx.borrow().clone();
    Json(summary)
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/enable", request_body = EnableBody, responses((status = 200))))]
async fn set_enable(
    State(state): State<AppState>,
    Json(body): Json<EnableBody>,
) -> impl IntoResponse {
    state.controller.set_enable_charging(body.enabled).await;
    (StatusCode::OK, Json(serde_json::json!({"ok": true})))
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/mode", request_body = ModeBody, responses((status = 200), (status = 400))))]
async fn set_mode(State(state): State<AppState>, Json(body): Json<ModeBody>) -> impl IntoResponse {
    match state.controller.set_mode(&body.mode).await {
        Ok(mode) => (
            StatusCode::OK,
            Json(serde_json::json!({"ok": true, "mode": mode.as_str()})),
        ),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"ok": false, "error": e.to_string()})),
        ),
    }
}

#[cfg_attr(feature = "openapi", utoipa::path(post, path = "/api/tunables", request_body = TunablesBody, responses((status = 200), (status = 400))))]
async fn set_tunables(
    State(state): State<AppState>,
    Json(body): Json<TunablesBody>,
) -> impl IntoResponse {
    if let Some(amps) = body.hysteresis_threshold_a {
        if let Err(e) = state.controller.set_hysteresis_threshold(amps).await {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            );
        }
    }
    if let Some(seconds) = body.ramp_up_delay_s {
        if let Err(e) = state.controller.set_ramp_up_delay(seconds).await {
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"ok": false, "error": e.to_string()})),
            );
        }
    }
    (StatusCode::OK, Json(serde_json::json!({"ok": true})))
}

#[cfg_attr(feature = "openapi", utoipa::path(get, path = "/api/config", responses((status = 200))))]
async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::to_value(state.config.as_ref()).unwrap_or(serde_json::json!({"error": "serialization"})))
}

#[cfg(feature = "openapi")]
#[derive(OpenApi)]
#[openapi(
    paths(health, status, set_enable, set_mode, set_tunables, get_config),
    components(schemas(EnableBody, ModeBody, TunablesBody)),
    tags((name = "pvloadctl", description = "PV-aware load manager operator API"))
)]
pub struct ApiDoc;

fn router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(status))
        .route("/api/enable", post(set_enable))
        .route("/api/mode", post(set_mode))
        .route("/api/tunables", post(set_tunables))
        .route("/api/config", get(get_config));

    #[cfg(feature = "openapi")]
    let router = router.merge(SwaggerUi::new("/ui/openapi").url("/openapi.json", ApiDoc::openapi()));

    router
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(
    controller: Arc<ModeController>,
    summary_rx: watch::Receiver<TickSummary>,
    config: Arc<Config>,
    host: &str,
    port: u16,
) -> anyhow::Result<()> {
    let state = AppState {
        controller,
        summary_rx,
        config,
    };
    let app = router(state);

    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .unwrap_or(([0, 0, 0, 0], port).into());
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
