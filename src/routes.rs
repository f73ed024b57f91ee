use std::sync::Arc;

use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    Json,
};

use crate::distributor::Columns;
use crate::panel::{PanelHandle, PanelSnapshot, PanelState};

pub struct AppState {
    pub panel: PanelHandle,
}

// Template structs
#[derive(Template)]
#[template(path = "panel.html")]
pub struct PanelTemplate {
    pub columns: Columns,
    pub busy: bool,
    pub oob: bool,
    pub status: StatusView,
}

#[derive(Template)]
#[template(path = "columns.html")]
pub struct ColumnsTemplate {
    pub columns: Columns,
    pub busy: bool,
    pub oob: bool,
}

/// Status line plus an out-of-band swap that restarts column polling.
#[derive(Template)]
#[template(path = "reload.html")]
pub struct ReloadTemplate {
    pub status: StatusView,
    pub columns: Columns,
    pub busy: bool,
    pub oob: bool,
}

#[derive(Template)]
#[template(path = "status.html")]
pub struct StatusTemplate {
    pub status: StatusView,
}

pub struct StatusView {
    pub state: PanelState,
    pub busy: bool,
    pub generation: u64,
    pub headline_count: usize,
    pub shown: usize,
    pub pending: usize,
    pub reloaded_at: String,
}

impl From<&PanelSnapshot> for StatusView {
    fn from(snapshot: &PanelSnapshot) -> Self {
        Self {
            state: snapshot.state,
            busy: snapshot.is_busy(),
            generation: snapshot.generation,
            headline_count: snapshot.headline_count,
            shown: snapshot.columns.len(),
            pending: snapshot.pending,
            reloaded_at: snapshot
                .reloaded_at
                .map(|at| at.format("%H:%M:%S").to_string())
                .unwrap_or_default(),
        }
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

// Route handlers
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.panel.snapshot();
    let status = StatusView::from(&snapshot);
    HtmlTemplate(PanelTemplate {
        busy: status.busy,
        oob: false,
        columns: snapshot.columns,
        status,
    })
}

pub async fn columns(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.panel.snapshot();
    HtmlTemplate(ColumnsTemplate {
        busy: snapshot.is_busy(),
        oob: false,
        columns: snapshot.columns,
    })
}

pub async fn reload(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    state.panel.reload().await?;

    // The panel picks the command up asynchronously; report the cycle as started
    let mut status = StatusView::from(&state.panel.snapshot());
    status.state = PanelState::Loading;
    status.busy = true;
    Ok(HtmlTemplate(ReloadTemplate {
        status,
        columns: Columns::default(),
        busy: true,
        oob: true,
    }))
}

pub async fn reload_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = StatusView::from(&state.panel.snapshot());
    HtmlTemplate(StatusTemplate { status })
}

pub async fn panel_json(State(state): State<Arc<AppState>>) -> Json<PanelSnapshot> {
    Json(state.panel.snapshot())
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
