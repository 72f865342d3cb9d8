//! Abuse-detection rules and per-event handlers.
//!
//! One `Rule` implementation per abuse-detection rule, and one
//! `EventHandler` per known event, wired together by a compile-time
//! dispatch table in [`registry`] rather than a dynamic,
//! reflection-style registry.

pub mod handlers;
pub mod registry;
pub mod rules;

pub use handlers::EventHandler;
pub use registry::{handler_for_event, rules_for_event};
pub use rules::{Rule, RuleOutcome};
