// Extraction Gateway prompt templates.

pub const EXTRACT_SYSTEM: &str = "\
You are an expert assistant specialized in extracting specific, flat key-value pairs \
from text to populate a proposal template. \
If information for a key is not found, omit the key. \
Extract ONLY the following keys if present: {keys}";

pub const EXTRACT_PROMPT: &str = r#"Extract the required key information from the following text and return it as a flat JSON object.

TEXT:
```
{text}
```"#;

pub const BEST_GUESS_SYSTEM: &str = "\
You are an assistant helping to complete a business proposal. \
Some facts are already known; others are missing. \
Propose a plausible value for each missing key, using the source text and the known facts. \
Dates must be written as YYYY-MM-DD. Amounts must be plain numbers without currency symbols. \
If you cannot make a reasonable guess for a key, omit it. \
Return ONLY the following keys: {wanted}";

pub const BEST_GUESS_PROMPT: &str = r#"KNOWN FACTS (JSON):
{known}

MISSING KEYS:
{wanted}

SOURCE TEXT:
```
{text}
```

Return a flat JSON object containing your best guess for each missing key."#;

/// Fills `{name}` placeholders in a single pass. Substituted text is never
/// rescanned, so braces inside source text or known facts stay literal.
pub fn fill_prompt(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 1..];
        let hit = values
            .iter()
            .find(|(name, _)| tail.strip_prefix(*name).is_some_and(|t| t.starts_with('}')));
        match hit {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len() + 1..];
            }
            None => {
                out.push('{');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
