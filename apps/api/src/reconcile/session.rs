//! Explicit per-proposal editing session and its in-memory store.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    New,
    Extracted,
    Prefilled,
    Reviewed,
    Rendered,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::New => "NEW",
            SessionState::Extracted => "EXTRACTED",
            SessionState::Prefilled => "PREFILLED",
            SessionState::Reviewed => "REVIEWED",
            SessionState::Rendered => "RENDERED",
        };
        f.write_str(s)
    }
}

/// Where a proposed field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Stored,
    BestGuess,
    Default,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldValue {
    pub value: String,
    pub source: FieldSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderedProposal {
    pub content: String,
    pub file_name: String,
    pub saved_to: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub state: SessionState,
    pub proposal_id: Option<i64>,
    pub proposal_name: Option<String>,
    pub source_files: Vec<String>,
    /// Concatenated text of every uploaded document.
    #[serde(skip)]
    pub context_text: String,
    pub template: Option<String>,
    /// Proposed value for each required key that has one.
    pub fields: BTreeMap<String, FieldValue>,
    /// Required keys no source could fill; the operator must supply them.
    pub missing: BTreeSet<String>,
    /// Non-fatal step failures, newest last.
    pub warnings: Vec<String>,
    pub rendered: Option<RenderedProposal>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::New,
            proposal_id: None,
            proposal_name: None,
            source_files: Vec::new(),
            context_text: String::new(),
            template: None,
            fields: BTreeMap::new(),
            missing: BTreeSet::new(),
            warnings: Vec::new(),
            rendered: None,
            created_at: Utc::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Sessions keyed by id. Handlers take a copy, run one transition on it and
/// put it back.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Session>>>,
}

impl SessionStore {
    pub fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    pub fn put(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id, session);
    }
}
