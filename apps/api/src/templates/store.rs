//! Template lookup, static analysis and rendering.
//!
//! Templates are Jinja-syntax markdown files named `<name>.md` in one directory.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use minijinja::{Environment, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::facts::value::FactValue;
use crate::models::fields::is_calculated;
use crate::templates::binding::Bindings;

const TEMPLATE_EXTENSION: &str = "md";

/// Functions every minijinja environment defines. Templates call them; they are
/// never facts.
const BUILTIN_GLOBALS: &[&str] = &["range", "dict", "namespace", "debug"];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Template '{name}' could not be parsed: {source}")]
    Invalid {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Rendering template '{name}' failed: {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Importing template '{name}' failed: {reason}")]
    Import { name: String, reason: String },

    #[error("Template IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
    output_dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Names of all available templates, sorted. Empty if the directory is missing.
    pub fn list(&self) -> Result<Vec<String>, TemplateError> {
        if !self.dir.is_dir() {
            warn!("Template directory {} not found", self.dir.display());
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == TEMPLATE_EXTENSION).unwrap_or(false) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn source(&self, name: &str) -> Result<String, TemplateError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        Ok(std::fs::read_to_string(path)?)
    }

    /// Every free variable the template references, minus the calculated keys
    /// and built-in functions.
    /// Found by static analysis; the template is never executed.
    pub fn required_keys(&self, name: &str) -> Result<BTreeSet<String>, TemplateError> {
        let source = self.source(name)?;
        let env = environment();
        let template = env
            .template_from_str(&source)
            .map_err(|source| TemplateError::Invalid {
                name: name.to_string(),
                source,
            })?;

        let keys: BTreeSet<String> = template
            .undeclared_variables(false)
            .into_iter()
            .filter(|k| !is_calculated(k) && !BUILTIN_GLOBALS.contains(&k.as_str()))
            .collect();
        debug!("Template '{}' requires {} keys", name, keys.len());
        Ok(keys)
    }

    /// Renders the template with `bindings`. Unbound variables render empty.
    pub fn render(&self, name: &str, bindings: &Bindings) -> Result<String, TemplateError> {
        let source = self.source(name)?;
        let env = environment();
        let render_err = |source| TemplateError::Render {
            name: name.to_string(),
            source,
        };

        let template = env.template_from_str(&source).map_err(render_err)?;
        let context: BTreeMap<&str, Value> = bindings
            .iter()
            .map(|(k, v)| (k.as_str(), to_template_value(v)))
            .collect();
        template.render(&context).map_err(render_err)
    }

    /// Saves extracted PDF text as a new template.
    pub fn import(&self, name: &str, text: &str) -> Result<PathBuf, TemplateError> {
        let path = self.path_for(name)?;
        if text.trim().is_empty() {
            return Err(TemplateError::Import {
                name: name.to_string(),
                reason: "no text could be extracted".to_string(),
            });
        }
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(&path, text)?;
        info!("Imported template '{}' to {}", name, path.display());
        Ok(path)
    }

    /// Writes a rendered proposal to `<output_dir>/<slug>_proposal.md`.
    pub fn save_rendered(&self, proposal_name: &str, content: &str) -> Result<PathBuf, TemplateError> {
        std::fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(rendered_file_name(proposal_name));
        std::fs::write(&path, content)?;
        info!("Proposal saved to {}", path.display());
        Ok(path)
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, TemplateError> {
        if !is_safe_name(name) {
            return Err(TemplateError::NotFound(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{TEMPLATE_EXTENSION}")))
    }
}

pub fn rendered_file_name(proposal_name: &str) -> String {
    format!("{}_proposal.md", proposal_name.replace(' ', "_").to_lowercase())
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains(['/', '\\'])
        && Path::new(name).components().count() == 1
}

fn environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.add_filter("money", money);
    env
}

/// `{{ amount | money }}` -> `3,250.00`. Non-numbers pass through unchanged.
fn money(value: Value) -> String {
    match f64::try_from(value.clone()) {
        Ok(amount) => format_money(amount),
        Err(_) => value.to_string(),
    }
}

fn format_money(value: f64) -> String {
    let cents = (value.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}{grouped}.{:02}", cents % 100)
}

/// Whole numbers are bound as integers so `{{ cost }}` prints `250`, not `250.0`.
fn to_template_value(value: &FactValue) -> Value {
    match value {
        FactValue::Text(s) => Value::from(s.as_str()),
        FactValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Value::from(*n as i64),
        FactValue::Number(n) => Value::from(*n),
        FactValue::Date(_) => Value::from(value.to_text()),
    }
}
