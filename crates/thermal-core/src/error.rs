//! Typed error hierarchy for the thermal-power accounting core.
//!
//! Every error in this crate is fatal to the caller's run — the core has no local recovery
//! path, matching the original `AbruptExit(file, line)` convention — but propagation is via
//! `Result`, not `process::exit` or panic, so embedding applications choose how to surface it.

use thiserror::Error;

/// Errors produced by configuration parsing, trace parsing, I/O, or invariant checks.
#[derive(Debug, Error)]
pub enum ThermalError {
    /// Malformed or missing configuration (e.g. `loc_mapping` with the wrong field count).
    #[error("config error: {0}")]
    Config(String),

    /// Malformed trace line (wrong token count, unknown command name, bad address field).
    #[error("trace error: {0}")]
    Trace(String),

    /// Unable to open or write a trace/CSV path.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A condition the core assumes can never happen at runtime did (unknown `cmd_type`
    /// reaching dispatch, non-finite `dt`, calling `update_power` after finalization).
    #[error("invariant violation at {where_}: {what}")]
    Invariant {
        /// Short description of which invariant broke.
        what: String,
        /// Call site, standing in for the original's `(file, line)` pair.
        where_: &'static str,
    },
}

impl ThermalError {
    /// Build a [`ThermalError::Config`] from a message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`ThermalError::Trace`] from a message.
    pub fn trace(msg: impl Into<String>) -> Self {
        Self::Trace(msg.into())
    }

    /// Build a [`ThermalError::Invariant`] tagged with the call site.
    pub fn invariant(what: impl Into<String>, where_: &'static str) -> Self {
        Self::Invariant {
            what: what.into(),
            where_,
        }
    }
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ThermalError>;
