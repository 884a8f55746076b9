//! Multipart upload forms shared by the session and template endpoints.

use axum::extract::Multipart;
use tracing::{debug, info};

use crate::documents::Upload;
use crate::errors::AppError;

/// Files plus an optional `name` field.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub files: Vec<Upload>,
    pub name: Option<String>,
}

impl UploadForm {
    pub fn file_names(&self) -> Vec<String> {
        self.files.iter().map(|f| f.file_name.clone()).collect()
    }
}

/// Reads every part whose field name is in `file_fields` as a file, and a
/// `name` text field if present. Other parts are ignored.
pub async fn read_upload_form(
    mut multipart: Multipart,
    file_fields: &[&str],
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name == "name" {
            let text = field
                .text()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read name: {e}")))?;
            let text = text.trim();
            if !text.is_empty() {
                form.name = Some(text.to_string());
            }
        } else if file_fields.contains(&field_name.as_str()) {
            let file_name = field.file_name().unwrap_or("document").to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?;
            info!("Received file: {} ({} bytes)", file_name, bytes.len());
            form.files.push(Upload {
                file_name,
                bytes: bytes.to_vec(),
            });
        } else {
            debug!("Ignoring multipart field '{field_name}'");
        }
    }

    if form.files.is_empty() {
        return Err(AppError::Validation("No file uploaded".to_string()));
    }
    Ok(form)
}
