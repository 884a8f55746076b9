//! Axum route handlers for proposals and their facts.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::facts::store::{
    add_facts, create_proposal, delete_proposal, find_proposal_by_name, get_proposal_with_facts,
    list_proposals,
};
use crate::facts::value::stringify_json_value;
use crate::models::proposal::{FactMap, FactRow, ProposalRow, ProposalWithFacts};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListProposalsQuery {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct AddFactsRequest {
    pub facts: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct ProposalDetailResponse {
    #[serde(flatten)]
    pub proposal: ProposalWithFacts,
    pub effective_facts: FactMap,
}

/// GET /api/v1/proposals[?name=]
///
/// Newest first. With `name`, returns the exact match only (or nothing).
pub async fn handle_list_proposals(
    State(state): State<AppState>,
    Query(params): Query<ListProposalsQuery>,
) -> Result<Json<Vec<ProposalRow>>, AppError> {
    let proposals = match params.name {
        Some(name) => find_proposal_by_name(&state.db, name.trim())
            .await?
            .into_iter()
            .collect(),
        None => list_proposals(&state.db).await?,
    };
    Ok(Json(proposals))
}

/// POST /api/v1/proposals
pub async fn handle_create_proposal(
    State(state): State<AppState>,
    Json(req): Json<CreateProposalRequest>,
) -> Result<(StatusCode, Json<ProposalRow>), AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    let proposal = create_proposal(&state.db, name).await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// GET /api/v1/proposals/:id
pub async fn handle_get_proposal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProposalDetailResponse>, AppError> {
    let proposal = get_proposal_with_facts(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Proposal {id} not found")))?;
    let effective_facts = proposal.effective_facts();
    Ok(Json(ProposalDetailResponse {
        proposal,
        effective_facts,
    }))
}

/// POST /api/v1/proposals/:id/facts
///
/// Scalar values are stored as text; nulls and blanks are skipped.
pub async fn handle_add_facts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<AddFactsRequest>,
) -> Result<Json<Vec<FactRow>>, AppError> {
    let facts: FactMap = req
        .facts
        .iter()
        .filter_map(|(k, v)| stringify_json_value(v).map(|text| (k.clone(), text)))
        .collect();
    Ok(Json(add_facts(&state.db, id, &facts).await?))
}

/// DELETE /api/v1/proposals/:id
pub async fn handle_delete_proposal(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    delete_proposal(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
