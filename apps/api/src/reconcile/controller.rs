//! Reconciliation Controller. Drives a session through
//! NEW → EXTRACTED → PREFILLED → REVIEWED → RENDERED.
//!
//! Every step re-reads the stored facts rather than trusting earlier session
//! state, so steps can be re-run after new uploads. Each persistence step is its
//! own transaction; a failed save does not undo earlier ones.
//!
//! Fill order for a required key: stored fact → model best guess →
//! deterministic default → operator input.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::documents::FILE_SEPARATOR;
use crate::errors::AppError;
use crate::extraction::gateway::FactExtractor;
use crate::facts::store::{add_facts, create_proposal_with_facts, effective_facts};
use crate::facts::value::{format_date, normalize_date_text};
use crate::models::fields::{is_calculated, is_date_key};
use crate::models::proposal::FactMap;
use crate::reconcile::session::{
    FieldSource, FieldValue, RenderedProposal, Session, SessionState,
};
use crate::templates::binding::render_bindings;
use crate::templates::calculated::default_marketing_costs;
use crate::templates::schedule::compute_default_dates;
use crate::templates::store::{rendered_file_name, TemplateStore};

/// Keys the template requires that the known facts don't cover.
pub fn compute_missing(required: &BTreeSet<String>, known: &FactMap) -> BTreeSet<String> {
    required
        .iter()
        .filter(|k| !known.contains_key(k.as_str()) && !is_calculated(k))
        .cloned()
        .collect()
}

/// Uploaded context for the EXTRACTED step.
pub struct Intake {
    pub text: String,
    pub source_files: Vec<String>,
    pub proposal_name: Option<String>,
}

pub struct Reconciler<'a> {
    db: &'a SqlitePool,
    extractor: &'a dyn FactExtractor,
    templates: &'a TemplateStore,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        db: &'a SqlitePool,
        extractor: &'a dyn FactExtractor,
        templates: &'a TemplateStore,
    ) -> Self {
        Self {
            db,
            extractor,
            templates,
        }
    }

    /// NEW/any → EXTRACTED. Extracts seed facts from the new text and stores them
    /// on the session's proposal, creating the proposal on first upload.
    /// Extraction failure is fatal and leaves the session untouched.
    pub async fn ingest(&self, session: &mut Session, intake: Intake) -> Result<(), AppError> {
        let seed = self.extractor.extract_facts(&intake.text).await?;

        let proposal_id = match session.proposal_id {
            Some(id) => {
                if !seed.is_empty() {
                    add_facts(self.db, id, &seed).await?;
                }
                id
            }
            None => {
                let name = intake
                    .proposal_name
                    .clone()
                    .unwrap_or_else(|| default_proposal_name(&intake.source_files));
                let (proposal, _) = create_proposal_with_facts(self.db, &name, &seed).await?;
                session.proposal_id = Some(proposal.id);
                session.proposal_name = Some(proposal.name);
                proposal.id
            }
        };

        if seed.is_empty() {
            session
                .warnings
                .push("The model did not return any structured data".to_string());
        }

        if !session.context_text.is_empty() {
            session.context_text.push_str(FILE_SEPARATOR);
        }
        session.context_text.push_str(&intake.text);
        session.source_files.extend(intake.source_files);
        session.fields.clear();
        session.missing.clear();
        session.rendered = None;
        session.state = SessionState::Extracted;

        info!(
            "Session {} extracted {} seed facts into proposal {}",
            session.id,
            seed.len(),
            proposal_id
        );
        Ok(())
    }

    /// EXTRACTED → PREFILLED. Proposes a value for every required key.
    /// Best-guess failures are recorded as warnings and fall through to defaults.
    pub async fn prefill(
        &self,
        session: &mut Session,
        template: &str,
        today: NaiveDate,
    ) -> Result<(), AppError> {
        require_state(
            session,
            &[
                SessionState::Extracted,
                SessionState::Prefilled,
                SessionState::Reviewed,
                SessionState::Rendered,
            ],
            "prefill",
        )?;
        let proposal_id = proposal_of(session)?;

        let required = self.templates.required_keys(template)?;
        let known = effective_facts(self.db, proposal_id).await?;
        let mut missing = compute_missing(&required, &known);

        let mut fields: BTreeMap<String, FieldValue> = required
            .iter()
            .filter_map(|k| {
                known.get(k).map(|v| {
                    (
                        k.clone(),
                        FieldValue {
                            value: v.clone(),
                            source: FieldSource::Stored,
                        },
                    )
                })
            })
            .collect();

        if !missing.is_empty() {
            let mut guesses = match self
                .extractor
                .best_guess_facts(&session.context_text, &known, &missing)
                .await
            {
                Ok(guesses) => guesses,
                Err(e) => {
                    warn!("Best-guess step failed for session {}: {e}", session.id);
                    session.warnings.push(format!("Best-guess step failed: {e}"));
                    FactMap::new()
                }
            };
            guesses.retain(|k, v| missing.contains(k) && !v.trim().is_empty());

            if !guesses.is_empty() {
                if let Err(e) = add_facts(self.db, proposal_id, &guesses).await {
                    warn!("Saving best guesses failed for session {}: {e}", session.id);
                    session.warnings.push(format!(
                        "Saving best guesses for {} failed: {e}",
                        join_keys(guesses.keys())
                    ));
                }
            }
            for (key, value) in guesses {
                missing.remove(&key);
                fields.insert(
                    key,
                    FieldValue {
                        value,
                        source: FieldSource::BestGuess,
                    },
                );
            }
        }

        let defaults = default_values(today);
        missing.retain(|key| match defaults.get(key) {
            Some(value) => {
                fields.insert(
                    key.clone(),
                    FieldValue {
                        value: value.clone(),
                        source: FieldSource::Default,
                    },
                );
                false
            }
            None => true,
        });

        debug!(
            "Session {} prefilled {} fields; {} still missing",
            session.id,
            fields.len(),
            missing.len()
        );
        session.template = Some(template.to_string());
        session.fields = fields;
        session.missing = missing;
        session.rendered = None;
        session.state = SessionState::Prefilled;
        Ok(())
    }

    /// PREFILLED → REVIEWED. Merges the operator's values over the proposed ones,
    /// validates that every required key has a value and persists the result.
    pub async fn review(
        &self,
        session: &mut Session,
        values: &BTreeMap<String, String>,
    ) -> Result<(), AppError> {
        require_state(
            session,
            &[
                SessionState::Prefilled,
                SessionState::Reviewed,
                SessionState::Rendered,
            ],
            "review",
        )?;
        let proposal_id = proposal_of(session)?;

        let required: BTreeSet<String> = session
            .fields
            .keys()
            .chain(session.missing.iter())
            .cloned()
            .collect();

        let mut final_fields = BTreeMap::new();
        let mut problems = Vec::new();
        for key in &required {
            let (raw, source) = match values.get(key) {
                Some(v) => (v.trim().to_string(), FieldSource::Operator),
                None => match session.fields.get(key) {
                    Some(f) => (f.value.trim().to_string(), f.source),
                    None => (String::new(), FieldSource::Operator),
                },
            };
            if raw.is_empty() {
                problems.push(format!("value for '{key}' cannot be empty"));
                continue;
            }
            let value = if is_date_key(key) {
                match normalize_date_text(&raw) {
                    Ok(v) => v,
                    Err(e) => {
                        problems.push(format!("{key}: {e}"));
                        continue;
                    }
                }
            } else {
                raw
            };
            final_fields.insert(key.clone(), FieldValue { value, source });
        }
        if !problems.is_empty() {
            return Err(AppError::Validation(problems.join("; ")));
        }

        for key in values.keys().filter(|k| !required.contains(*k)) {
            debug!("Ignoring submitted value for unrequired key '{key}'");
        }

        let to_store: FactMap = final_fields
            .iter()
            .map(|(k, f)| (k.clone(), f.value.clone()))
            .collect();
        add_facts(self.db, proposal_id, &to_store).await?;

        session.fields = final_fields;
        session.missing.clear();
        session.rendered = None;
        session.state = SessionState::Reviewed;
        info!(
            "Session {} reviewed; {} values stored",
            session.id,
            to_store.len()
        );
        Ok(())
    }

    /// REVIEWED → RENDERED. Renders from the stored facts with fresh calculated
    /// fields and writes a copy to the output directory.
    pub async fn render(&self, session: &mut Session) -> Result<RenderedProposal, AppError> {
        require_state(
            session,
            &[SessionState::Reviewed, SessionState::Rendered],
            "render",
        )?;
        let proposal_id = proposal_of(session)?;
        let template = session
            .template
            .clone()
            .ok_or_else(|| AppError::Conflict("no template has been selected".to_string()))?;

        let facts = effective_facts(self.db, proposal_id).await?;
        let content = self.templates.render(&template, &render_bindings(&facts))?;

        let proposal_name = session
            .proposal_name
            .clone()
            .unwrap_or_else(|| format!("proposal_{proposal_id}"));
        let saved_to = match self.templates.save_rendered(&proposal_name, &content) {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                warn!("Saving rendered proposal failed: {e}");
                session
                    .warnings
                    .push(format!("Saving the rendered proposal failed: {e}"));
                None
            }
        };

        let rendered = RenderedProposal {
            content,
            file_name: rendered_file_name(&proposal_name),
            saved_to,
        };
        session.rendered = Some(rendered.clone());
        session.state = SessionState::Rendered;
        Ok(rendered)
    }
}

fn require_state(
    session: &Session,
    allowed: &[SessionState],
    action: &str,
) -> Result<(), AppError> {
    if allowed.contains(&session.state) {
        Ok(())
    } else {
        Err(AppError::Conflict(format!(
            "cannot {action} session {} in state {}",
            session.id, session.state
        )))
    }
}

fn proposal_of(session: &Session) -> Result<i64, AppError> {
    session
        .proposal_id
        .ok_or_else(|| AppError::Conflict(format!("session {} has no proposal", session.id)))
}

/// Default dates and marketing costs as fact text.
fn default_values(today: NaiveDate) -> FactMap {
    let mut defaults: FactMap = compute_default_dates(today)
        .into_iter()
        .map(|(k, d)| (k, format_date(d)))
        .collect();
    defaults.extend(default_marketing_costs());
    defaults
}

fn default_proposal_name(source_files: &[String]) -> String {
    let base = source_files
        .first()
        .and_then(|f| std::path::Path::new(f).file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("proposal_from_upload");
    format!("{}_{}", base, Utc::now().timestamp())
}

fn join_keys<'k>(keys: impl Iterator<Item = &'k String>) -> String {
    keys.map(String::as_str).collect::<Vec<_>>().join(", ")
}
