use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Collapsed key -> value view of a proposal's facts.
pub type FactMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProposalRow {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FactRow {
    pub id: i64,
    pub proposal_id: i64,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// A proposal with all of its facts eagerly loaded, oldest row first.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalWithFacts {
    #[serde(flatten)]
    pub proposal: ProposalRow,
    pub facts: Vec<FactRow>,
}

impl ProposalWithFacts {
    /// Folds the fact rows into a mapping. Later rows override earlier ones and
    /// blank values are treated as unset.
    pub fn effective_facts(&self) -> FactMap {
        let mut map = FactMap::new();
        for fact in &self.facts {
            if fact.value.trim().is_empty() {
                map.remove(&fact.key);
            } else {
                map.insert(fact.key.clone(), fact.value.clone());
            }
        }
        map
    }
}
