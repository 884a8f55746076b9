use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::proposal::FactMap;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TextInput {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ExtractedData {
    pub data: FactMap,
}

/// POST /extract-context
pub async fn handle_extract_context(
    State(state): State<AppState>,
    Json(input): Json<TextInput>,
) -> Result<Json<ExtractedData>, AppError> {
    if input.text.is_empty() {
        return Err(AppError::Validation("text must not be empty".to_string()));
    }
    let data = state.extractor.extract_facts(&input.text).await?;
    Ok(Json(ExtractedData { data }))
}
