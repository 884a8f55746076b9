// Extraction Gateway: raw context text in, flat fact mapping out.
// All model calls go through llm_client; every reply is filtered against the
// caller's expected key set before it reaches the store.

pub mod gateway;
pub mod handlers;
pub mod prompts;
