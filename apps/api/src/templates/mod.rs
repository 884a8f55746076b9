// Template Binder: template discovery and static analysis, typed bindings,
// calculated fields and default scheduling rules.

pub mod binding;
pub mod calculated;
pub mod handlers;
pub mod schedule;
pub mod store;
