//! Context-window resolution and request validation.
//!
//! Resolves the effective window for a model (config override → catalog →
//! default, capped by an optional agent-wide ceiling) and checks a
//! prospective request's estimated token usage against it before anything
//! is sent to a transport.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{ModelCatalog, ModelRef};
use crate::error::ContextError;
use crate::fallback::LlmRequest;

/// Windows below this are unusable for the platform's tasks; validation
/// reports a hard error.
pub const HARD_MINIMUM_WINDOW: u32 = 16_000;

/// Windows below this work but are cramped; validation reports a warning.
pub const RECOMMENDED_MINIMUM_WINDOW: u32 = 32_000;

/// Utilization above this ratio triggers a warning.
pub const WARN_UTILIZATION: f64 = 0.90;

/// Estimates token usage for a piece of text. The platform injects its
/// tokenizer-backed implementation; [`HeuristicEstimator`] is the default.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> u32;
}

/// Chars-divided-by-four estimate. Good enough for budget checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> u32 {
        ((text.len() + 3) / 4) as u32
    }
}

/// Where the resolved window value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSource {
    Config,
    Catalog,
    Default,
}

/// The effective context window for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextWindowResolution {
    pub context_window: u32,
    pub source: WindowSource,
    /// True when the agent-wide ceiling actually reduced the value.
    pub capped_by_agent: bool,
}

/// Outcome of validating a request against a model's window.
#[derive(Debug, Clone)]
pub struct ContextValidation {
    /// Estimated tokens the request needs (prompt + expected completion).
    pub required: u32,
    /// Effective window of the model.
    pub available: u32,
    pub errors: Vec<ContextError>,
    pub warnings: Vec<String>,
}

impl ContextValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn should_warn(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Resolves effective context windows and validates requests against them.
pub struct ContextWindowGuard {
    catalog: Arc<ModelCatalog>,
    overrides: HashMap<ModelRef, u32>,
    default_window: u32,
    agent_cap: Option<u32>,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextWindowGuard {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        overrides: HashMap<ModelRef, u32>,
        default_window: u32,
        agent_cap: Option<u32>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Self {
        Self {
            catalog,
            overrides,
            default_window,
            agent_cap,
            estimator,
        }
    }

    /// Resolve the effective window: config override → catalog → default,
    /// then capped by the agent-wide ceiling when one is set.
    pub fn resolve(&self, model: &ModelRef) -> ContextWindowResolution {
        let (value, source) = if let Some(v) = self.overrides.get(model) {
            (*v, WindowSource::Config)
        } else if let Some(info) = self.catalog.model_info(model) {
            (info.context_window, WindowSource::Catalog)
        } else {
            (self.default_window, WindowSource::Default)
        };

        match self.agent_cap {
            Some(cap) if cap < value => ContextWindowResolution {
                context_window: cap,
                source,
                capped_by_agent: true,
            },
            _ => ContextWindowResolution {
                context_window: value,
                source,
                capped_by_agent: false,
            },
        }
    }

    /// Validate a prospective request. Errors mean the request must not be
    /// sent; warnings are advisory and independent of the error state.
    pub fn validate(&self, request: &LlmRequest, model: &ModelRef) -> ContextValidation {
        let required = self.required_tokens(request);
        let available = self.resolve(model).context_window;

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if available < HARD_MINIMUM_WINDOW {
            errors.push(ContextError::WindowTooSmall {
                model: model.clone(),
                available,
                minimum: HARD_MINIMUM_WINDOW,
            });
        }
        if required > available {
            errors.push(ContextError::ContextExceeded {
                model: model.clone(),
                required,
                available,
            });
        }

        if available < RECOMMENDED_MINIMUM_WINDOW {
            warnings.push(format!(
                "{model} offers {available} tokens, below the recommended {RECOMMENDED_MINIMUM_WINDOW}"
            ));
        }
        // Independent of the error state: an oversized request still gets
        // the utilization warning alongside its hard error.
        let utilization = required as f64 / available as f64;
        if utilization > WARN_UTILIZATION {
            warnings.push(format!(
                "request uses {:.0}% of {model}'s window",
                utilization * 100.0
            ));
        }

        ContextValidation {
            required,
            available,
            errors,
            warnings,
        }
    }

    /// Like [`validate`](Self::validate) but surfaces the first error.
    pub fn validate_or_err(
        &self,
        request: &LlmRequest,
        model: &ModelRef,
    ) -> Result<ContextValidation, ContextError> {
        let validation = self.validate(request, model);
        match validation.errors.first() {
            Some(err) => Err(err.clone()),
            None => Ok(validation),
        }
    }

    /// Boolean convenience: would this request fit?
    pub fn would_fit(&self, request: &LlmRequest, model: &ModelRef) -> bool {
        self.validate(request, model).is_valid()
    }

    /// Effective window for a model, in tokens.
    pub fn available_tokens(&self, model: &ModelRef) -> u32 {
        self.resolve(model).context_window
    }

    /// Tokens left over after the request. Negative when it does not fit.
    pub fn remaining_tokens(&self, request: &LlmRequest, model: &ModelRef) -> i64 {
        let available = self.available_tokens(model) as i64;
        available - self.required_tokens(request) as i64
    }

    fn required_tokens(&self, request: &LlmRequest) -> u32 {
        let mut total = self.estimator.estimate(&request.system_prompt)
            + self.estimator.estimate(&request.prompt);
        for chunk in &request.context {
            total += self.estimator.estimate(chunk);
        }
        // The window covers prompt plus expected completion.
        total + request.max_output_tokens.unwrap_or(0)
    }
}
