// Fact Store: proposals and their text-valued facts, plus the typed view used
// when binding facts into a template.

pub mod handlers;
pub mod store;
pub mod value;
