//! Failure classification for the fallback chain.
//!
//! The retry-vs-abort decision is policy, so the mapping is explicit and
//! configurable: status codes first, then case-insensitive substring rules
//! over the error message. Unmatched errors default to transient — wasting
//! one retry on an unrecoverable error is cheaper than giving up on a
//! recoverable one.

use serde::{Deserialize, Serialize};

use super::transport::TransportError;
use crate::error::ErrorClass;

/// One configured substring rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierRule {
    /// Matched case-insensitively against the error message.
    pub pattern: String,
    pub class: ErrorClass,
}

/// Maps transport failures to an [`ErrorClass`].
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassifierRule>,
}

impl ErrorClassifier {
    /// Classifier with only the builtin rules.
    pub fn new() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }

    /// Prepend configured rules; they win over the builtins.
    pub fn with_rules(extra: Vec<ClassifierRule>) -> Self {
        let mut rules = extra;
        rules.extend(builtin_rules());
        Self { rules }
    }

    pub fn classify(&self, error: &TransportError) -> ErrorClass {
        if let Some(status) = error.status {
            match status {
                401 | 403 | 429 => return ErrorClass::AuthOrQuota,
                400 | 404 | 413 | 422 => return ErrorClass::Fatal,
                408 | 500..=599 => return ErrorClass::Transient,
                _ => {}
            }
        }

        let message = error.message.to_lowercase();
        for rule in &self.rules {
            if message.contains(&rule.pattern) {
                return rule.class;
            }
        }
        ErrorClass::Transient
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_rules() -> Vec<ClassifierRule> {
    let table: &[(&str, ErrorClass)] = &[
        ("rate limit", ErrorClass::AuthOrQuota),
        ("too many requests", ErrorClass::AuthOrQuota),
        ("quota", ErrorClass::AuthOrQuota),
        ("unauthorized", ErrorClass::AuthOrQuota),
        ("invalid api key", ErrorClass::AuthOrQuota),
        ("forbidden", ErrorClass::AuthOrQuota),
        ("invalid request", ErrorClass::Fatal),
        ("malformed", ErrorClass::Fatal),
        ("unsupported parameter", ErrorClass::Fatal),
        // A request too large for one provider is too large for the rest of
        // the chain too; the context guard should have caught it.
        ("context_length_exceeded", ErrorClass::Fatal),
        ("context length", ErrorClass::Fatal),
        ("timed out", ErrorClass::Transient),
        ("timeout", ErrorClass::Transient),
        ("connection", ErrorClass::Transient),
        ("overloaded", ErrorClass::Transient),
        ("service unavailable", ErrorClass::Transient),
    ];
    table
        .iter()
        .map(|(pattern, class)| ClassifierRule {
            pattern: pattern.to_string(),
            class: *class,
        })
        .collect()
}
