//! Axum route handlers for the interactive proposal session.
//!
//! Each handler takes a copy of the session, runs one transition on it and
//! stores it back only if the transition succeeded.

use std::collections::BTreeMap;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::documents::combine_uploads;
use crate::documents::form::{read_upload_form, UploadForm};
use crate::errors::AppError;
use crate::reconcile::controller::{Intake, Reconciler};
use crate::reconcile::session::{RenderedProposal, Session};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PrefillRequest {
    pub template: String,
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

fn reconciler(state: &AppState) -> Reconciler<'_> {
    Reconciler::new(&state.db, state.extractor.as_ref(), &state.templates)
}

fn load_session(state: &AppState, id: Uuid) -> Result<Session, AppError> {
    state
        .sessions
        .get(id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

async fn intake_from(form: UploadForm) -> Result<Intake, AppError> {
    let source_files = form.file_names();
    let files = form.files;
    let text = tokio::task::spawn_blocking(move || combine_uploads(&files))
        .await
        .map_err(anyhow::Error::from)??;
    Ok(Intake {
        text,
        source_files,
        proposal_name: form.name,
    })
}

/// POST /api/v1/sessions
///
/// Multipart `files` (one or more) and an optional `name` for the proposal.
pub async fn handle_create_session(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let form = read_upload_form(multipart, &["files", "file"]).await?;
    let intake = intake_from(form).await?;

    let mut session = Session::new();
    reconciler(&state).ingest(&mut session, intake).await?;
    state.sessions.put(session.clone());
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/v1/sessions/:id
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Session>, AppError> {
    Ok(Json(load_session(&state, id)?))
}

/// POST /api/v1/sessions/:id/documents
///
/// Adds more context to an existing session and returns it to EXTRACTED.
pub async fn handle_add_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Session>, AppError> {
    let mut session = load_session(&state, id)?;
    let form = read_upload_form(multipart, &["files", "file"]).await?;
    let intake = intake_from(form).await?;

    reconciler(&state).ingest(&mut session, intake).await?;
    state.sessions.put(session.clone());
    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/prefill
pub async fn handle_prefill(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<PrefillRequest>,
) -> Result<Json<Session>, AppError> {
    let mut session = load_session(&state, id)?;
    let today = chrono::Local::now().date_naive();

    reconciler(&state)
        .prefill(&mut session, req.template.trim(), today)
        .await?;
    state.sessions.put(session.clone());
    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/review
pub async fn handle_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<Session>, AppError> {
    let mut session = load_session(&state, id)?;
    reconciler(&state).review(&mut session, &req.values).await?;
    state.sessions.put(session.clone());
    Ok(Json(session))
}

/// POST /api/v1/sessions/:id/render
pub async fn handle_render(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RenderedProposal>, AppError> {
    let mut session = load_session(&state, id)?;
    let rendered = reconciler(&state).render(&mut session).await?;
    state.sessions.put(session);
    Ok(Json(rendered))
}
