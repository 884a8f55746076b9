// Reconciliation Controller: the per-proposal session state machine that fills
// template keys from stored facts, model best guesses, defaults and the operator.

pub mod controller;
pub mod handlers;
pub mod session;
