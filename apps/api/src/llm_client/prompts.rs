// Shared prompt fragments.
// Each service that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every system prompt that expects a flat JSON object back.
pub const FLAT_JSON_ONLY: &str = "\
    Your output MUST be a single valid, flat JSON object. \
    Do NOT use nested objects or lists. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";
