//! Agent hook signal engine: deterministic, rule-based.
//!
//! Classifies tool output against ordered signal patterns, folds recurring
//! errors into fingerprinted aggregate records, tallies skill outcomes, and
//! attaches a threshold-driven advisory to the hook response.
//!
//! No AI, no network; regex matching plus two small JSON stores. Every
//! failure degrades to an empty response.

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod patterns;
pub mod policy;
pub mod store;
pub mod types;

pub use config::Config;
pub use engine::{fail_open, run, Engine, Hook};
pub use error::EngineError;
pub use types::{HookResponse, Outcome, ParsedInput};
