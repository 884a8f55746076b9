use std::collections::BTreeSet;
use std::path::Path as FsPath;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::documents::form::read_upload_form;
use crate::documents::{extract_text, DocumentError, DocumentFormat};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TemplateListResponse {
    pub templates: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TemplateDetailResponse {
    pub name: String,
    pub source: String,
    pub required_keys: BTreeSet<String>,
}

/// GET /api/v1/templates
pub async fn handle_list_templates(
    State(state): State<AppState>,
) -> Result<Json<TemplateListResponse>, AppError> {
    Ok(Json(TemplateListResponse {
        templates: state.templates.list()?,
    }))
}

/// GET /api/v1/templates/:name
pub async fn handle_get_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<TemplateDetailResponse>, AppError> {
    let source = state.templates.source(&name)?;
    let required_keys = state.templates.required_keys(&name)?;
    Ok(Json(TemplateDetailResponse {
        name,
        source,
        required_keys,
    }))
}

/// POST /api/v1/templates/import
///
/// Multipart PDF `file` and an optional template `name` (defaults to the file stem).
pub async fn handle_import_template(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<TemplateDetailResponse>), AppError> {
    let form = read_upload_form(multipart, &["file"]).await?;
    let Some(upload) = form.files.into_iter().next() else {
        return Err(AppError::Validation("No file uploaded".to_string()));
    };
    if DocumentFormat::from_filename(&upload.file_name) != Some(DocumentFormat::Pdf) {
        return Err(DocumentError::UnsupportedFormat(format!(
            "{} (templates can only be imported from PDF files)",
            upload.file_name
        ))
        .into());
    }
    let name = match form.name {
        Some(name) => name,
        None => FsPath::new(&upload.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.replace(' ', "_"))
            .ok_or_else(|| AppError::Validation("A template name is required".to_string()))?,
    };

    let text = tokio::task::spawn_blocking(move || extract_text(&upload.bytes, DocumentFormat::Pdf))
        .await
        .map_err(anyhow::Error::from)??;
    state.templates.import(&name, &text)?;

    let required_keys = state.templates.required_keys(&name)?;
    Ok((
        StatusCode::CREATED,
        Json(TemplateDetailResponse {
            name,
            source: text,
            required_keys,
        }),
    ))
}
