//! Fact Store: named proposals and their flat key/value facts.
//!
//! Values are always stored as text. A proposal owns its facts; deleting the
//! proposal cascades. `(proposal_id, key)` is unique, so `add_facts` is an upsert
//! and the latest write for a key wins.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::proposal::{FactMap, FactRow, ProposalRow, ProposalWithFacts};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A proposal named '{0}' already exists")]
    DuplicateName(String),

    #[error("Proposal {0} not found")]
    ProposalNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Inserts a new proposal. Fails with `DuplicateName` if the name is taken.
pub async fn create_proposal(pool: &SqlitePool, name: &str) -> Result<ProposalRow, StoreError> {
    let mut conn = pool.acquire().await?;
    let proposal = insert_proposal(&mut *conn, name).await?;
    info!("Proposal '{}' created with id {}", proposal.name, proposal.id);
    Ok(proposal)
}

/// Creates a proposal and writes its first facts in one transaction, so a
/// failed fact write leaves no proposal behind and the name stays free.
pub async fn create_proposal_with_facts(
    pool: &SqlitePool,
    name: &str,
    facts: &FactMap,
) -> Result<(ProposalRow, Vec<FactRow>), StoreError> {
    let mut tx = pool.begin().await?;
    let proposal = insert_proposal(&mut *tx, name).await?;
    let rows = upsert_facts(&mut *tx, proposal.id, facts).await?;
    tx.commit().await?;

    info!(
        "Proposal '{}' created with id {} and {} facts",
        proposal.name,
        proposal.id,
        rows.len()
    );
    Ok((proposal, rows))
}

/// Writes every entry of `facts` for the proposal in one transaction.
/// Either all rows are written or none are.
pub async fn add_facts(
    pool: &SqlitePool,
    proposal_id: i64,
    facts: &FactMap,
) -> Result<Vec<FactRow>, StoreError> {
    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM proposals WHERE id = ?")
        .bind(proposal_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        // tx is dropped here and rolls back
        return Err(StoreError::ProposalNotFound(proposal_id));
    }

    let rows = upsert_facts(&mut *tx, proposal_id, facts).await?;
    tx.commit().await?;

    info!("Stored {} facts for proposal {}", rows.len(), proposal_id);
    Ok(rows)
}

async fn insert_proposal(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<ProposalRow, StoreError> {
    let result = sqlx::query_as::<_, ProposalRow>(
        "INSERT INTO proposals (name, created_at) VALUES (?, ?) RETURNING id, name, created_at",
    )
    .bind(name)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await;

    match result {
        Ok(proposal) => Ok(proposal),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(StoreError::DuplicateName(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn upsert_facts(
    conn: &mut SqliteConnection,
    proposal_id: i64,
    facts: &FactMap,
) -> Result<Vec<FactRow>, StoreError> {
    let now = Utc::now();
    let mut rows = Vec::with_capacity(facts.len());
    for (key, value) in facts {
        let row = sqlx::query_as::<_, FactRow>(
            r#"
            INSERT INTO facts (proposal_id, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (proposal_id, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            RETURNING id, proposal_id, key, value, updated_at
            "#,
        )
        .bind(proposal_id)
        .bind(key)
        .bind(value)
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

/// Loads a proposal and all its facts. `None` when the proposal does not exist.
pub async fn get_proposal_with_facts(
    pool: &SqlitePool,
    proposal_id: i64,
) -> Result<Option<ProposalWithFacts>, StoreError> {
    let proposal = sqlx::query_as::<_, ProposalRow>(
        "SELECT id, name, created_at FROM proposals WHERE id = ?",
    )
    .bind(proposal_id)
    .fetch_optional(pool)
    .await?;

    let Some(proposal) = proposal else {
        debug!("Proposal {proposal_id} not found");
        return Ok(None);
    };

    let facts = sqlx::query_as::<_, FactRow>(
        "SELECT id, proposal_id, key, value, updated_at FROM facts WHERE proposal_id = ? ORDER BY id",
    )
    .bind(proposal_id)
    .fetch_all(pool)
    .await?;

    debug!(
        "Loaded proposal {} with {} facts",
        proposal_id,
        facts.len()
    );
    Ok(Some(ProposalWithFacts { proposal, facts }))
}

/// The effective fact mapping of an existing proposal.
pub async fn effective_facts(pool: &SqlitePool, proposal_id: i64) -> Result<FactMap, StoreError> {
    get_proposal_with_facts(pool, proposal_id)
        .await?
        .map(|p| p.effective_facts())
        .ok_or(StoreError::ProposalNotFound(proposal_id))
}

pub async fn find_proposal_by_name(
    pool: &SqlitePool,
    name: &str,
) -> Result<Option<ProposalRow>, StoreError> {
    Ok(sqlx::query_as::<_, ProposalRow>(
        "SELECT id, name, created_at FROM proposals WHERE name = ?",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?)
}

pub async fn list_proposals(pool: &SqlitePool) -> Result<Vec<ProposalRow>, StoreError> {
    Ok(sqlx::query_as::<_, ProposalRow>(
        "SELECT id, name, created_at FROM proposals ORDER BY id DESC",
    )
    .fetch_all(pool)
    .await?)
}

/// Deletes a proposal and, through the foreign key, all of its facts.
pub async fn delete_proposal(pool: &SqlitePool, proposal_id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM proposals WHERE id = ?")
        .bind(proposal_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::ProposalNotFound(proposal_id));
    }
    info!("Deleted proposal {proposal_id}");
    Ok(())
}
