//! Extraction Gateway. Turns context text into flat facts via the model.
//!
//! The model is an unreliable oracle: the key vocabulary is fixed, the reply is
//! requested in JSON-object mode, and every reply is filtered against the
//! expected key set before it is returned.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::extraction::prompts::{
    fill_prompt, BEST_GUESS_PROMPT, BEST_GUESS_SYSTEM, EXTRACT_PROMPT, EXTRACT_SYSTEM,
};
use crate::facts::value::stringify_json_value;
use crate::llm_client::prompts::FLAT_JSON_ONLY;
use crate::llm_client::{LlmClient, LlmError};
use crate::models::fields::{is_recognized, RECOGNIZED_KEYS};
use crate::models::proposal::FactMap;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("the model reply was not valid JSON: {source}")]
    MalformedReply {
        #[source]
        source: serde_json::Error,
    },

    #[error("the model reply was not a flat JSON object")]
    NotAnObject,

    #[error("the model call failed: {0}")]
    Call(#[source] LlmError),
}

impl From<LlmError> for ExtractionError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Parse { source, .. } => ExtractionError::MalformedReply { source },
            other => ExtractionError::Call(other),
        }
    }
}

/// Source of extracted and best-guess facts.
///
/// Carried in `AppState` as `Arc<dyn FactExtractor>`.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    /// Extracts any recognized keys found in `text`.
    async fn extract_facts(&self, text: &str) -> Result<FactMap, ExtractionError>;

    /// Proposes values for `wanted` keys only. Empty `wanted` yields an empty map.
    async fn best_guess_facts(
        &self,
        text: &str,
        known: &FactMap,
        wanted: &BTreeSet<String>,
    ) -> Result<FactMap, ExtractionError>;
}

/// `FactExtractor` backed by the chat completions model.
pub struct LlmFactExtractor {
    llm: LlmClient,
}

impl LlmFactExtractor {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl FactExtractor for LlmFactExtractor {
    async fn extract_facts(&self, text: &str) -> Result<FactMap, ExtractionError> {
        let system = format!(
            "{} {}",
            fill_prompt(EXTRACT_SYSTEM, &[("keys", RECOGNIZED_KEYS.join(", ").as_str())]),
            FLAT_JSON_ONLY
        );
        let prompt = fill_prompt(EXTRACT_PROMPT, &[("text", text)]);

        let reply: Value = self.llm.call_json(&prompt, &system).await?;
        let facts = flatten_reply(reply, is_recognized)?;

        info!("Extracted {} facts from {} chars of context", facts.len(), text.len());
        Ok(facts)
    }

    async fn best_guess_facts(
        &self,
        text: &str,
        known: &FactMap,
        wanted: &BTreeSet<String>,
    ) -> Result<FactMap, ExtractionError> {
        if wanted.is_empty() {
            debug!("No missing keys; skipping best-guess call");
            return Ok(FactMap::new());
        }

        let wanted_list = wanted.iter().cloned().collect::<Vec<_>>().join(", ");
        let known_json =
            serde_json::to_string_pretty(known).unwrap_or_else(|_| "{}".to_string());
        let system = format!(
            "{} {}",
            fill_prompt(BEST_GUESS_SYSTEM, &[("wanted", wanted_list.as_str())]),
            FLAT_JSON_ONLY
        );
        let prompt = fill_prompt(
            BEST_GUESS_PROMPT,
            &[
                ("known", known_json.as_str()),
                ("wanted", wanted_list.as_str()),
                ("text", text),
            ],
        );

        let reply: Value = self.llm.call_json(&prompt, &system).await?;
        let guesses = flatten_reply(reply, |key| wanted.contains(key))?;

        info!(
            "Model proposed {} of {} missing keys",
            guesses.len(),
            wanted.len()
        );
        Ok(guesses)
    }
}

/// Keeps the scalar, non-blank entries of a JSON object whose keys pass `allowed`.
/// Surplus keys are logged and dropped.
pub fn flatten_reply(
    reply: Value,
    allowed: impl Fn(&str) -> bool,
) -> Result<FactMap, ExtractionError> {
    let Value::Object(entries) = reply else {
        return Err(ExtractionError::NotAnObject);
    };

    let mut facts = FactMap::new();
    for (key, value) in entries {
        if !allowed(&key) {
            warn!("Dropping unexpected key '{key}' from model reply");
            continue;
        }
        match stringify_json_value(&value) {
            Some(text) => {
                facts.insert(key, text);
            }
            None => debug!("Dropping empty or nested value for '{key}'"),
        }
    }
    Ok(facts)
}
