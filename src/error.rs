//! Error taxonomy shared across the execution core.
//!
//! The split matters for recovery policy: profile errors are programming
//! errors (never retried), context errors are hard validation failures
//! (never sent to a transport), and transport failures carry an
//! [`ErrorClass`] that decides retry-vs-abort in the fallback chain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::ModelRef;

/// Errors from the auth profile manager.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProfileError {
    /// Caller referenced a credential id that was never registered.
    #[error("unknown auth profile '{0}'")]
    ProfileNotFound(String),
}

/// Hard context-window validation failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    /// The effective window is below the platform's usable minimum.
    #[error("{model} has a {available}-token window; minimum usable is {minimum}")]
    WindowTooSmall {
        model: ModelRef,
        available: u32,
        minimum: u32,
    },

    /// The estimated request does not fit the effective window.
    #[error("request needs ~{required} tokens but {model} only offers {available}")]
    ContextExceeded {
        model: ModelRef,
        required: u32,
        available: u32,
    },
}

/// Classification of a failed transport call, driving the fallback policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Network flake or timeout. Retried against the next candidate and
    /// recorded as a profile failure.
    Transient,
    /// Credential rejected or rate-limited upstream. Puts the profile on
    /// cooldown; retried with a different profile/model.
    AuthOrQuota,
    /// Malformed request. Aborts the whole chain — no provider can
    /// satisfy it.
    Fatal,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorClass::Transient => write!(f, "transient"),
            ErrorClass::AuthOrQuota => write!(f, "auth_or_quota"),
            ErrorClass::Fatal => write!(f, "fatal"),
        }
    }
}
