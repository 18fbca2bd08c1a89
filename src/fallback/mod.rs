//! Cascading fallback execution.
//!
//! The top-level entry point of the core: for one request, walk a
//! prioritized list of (model, profile) pairs — selector primary first,
//! then the configured fallback chain — until a call succeeds or the list
//! is exhausted. Candidates are tried strictly sequentially; a later
//! candidate's credential availability may depend on the profile-state
//! mutations of an earlier attempt.

mod classify;
mod transport;

pub use classify::{ClassifierRule, ErrorClassifier};
pub use transport::{LlmRequest, LlmResponse, ModelTransport, TransportError};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{pricing, AliasResolver, ModelCatalog, ModelRef};
use crate::context::{ContextWindowGuard, TokenEstimator};
use crate::error::ErrorClass;
use crate::profiles::AuthProfileManager;
use crate::selector::{ModelSelector, PreferenceTable, SelectionOptions, TaskType};
use crate::settings::LlmSettings;

/// What happened to one candidate in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Every profile for the candidate's provider was cooling down.
    SkippedNoProfile,
    /// The request failed context validation for this model.
    SkippedContext,
    /// The transport call failed with the given classification.
    Failed(ErrorClass),
}

/// One attempted (model, profile) pair, for the aggregate error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub model: ModelRef,
    pub profile_id: Option<String>,
    pub outcome: AttemptOutcome,
    pub message: String,
}

/// Failure of the whole fallback chain.
#[derive(Debug, Clone, Error)]
pub enum FallbackError {
    /// Every candidate was tried or skipped without success. The records
    /// tell an operator why each path failed.
    #[error("all {} fallback candidate(s) failed: [{}]", attempts.len(), summarize(attempts))]
    Exhausted { attempts: Vec<AttemptRecord> },

    /// A candidate failed fatally (malformed request); no other provider
    /// can satisfy the call, so the chain was abandoned.
    #[error("fatal request error on {model}: {message}")]
    Fatal {
        model: ModelRef,
        message: String,
        attempts: Vec<AttemptRecord>,
    },
}

fn summarize(attempts: &[AttemptRecord]) -> String {
    attempts
        .iter()
        .map(|a| {
            let outcome = match a.outcome {
                AttemptOutcome::SkippedNoProfile => "no profile".to_string(),
                AttemptOutcome::SkippedContext => "context".to_string(),
                AttemptOutcome::Failed(class) => class.to_string(),
            };
            format!("{}: {}", a.model, outcome)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A successful execution, with which (model, profile) pair served it.
#[derive(Debug)]
pub struct Served {
    pub response: LlmResponse,
    pub model: ModelRef,
    pub profile_id: String,
    /// Candidates that failed or were skipped before the winner.
    pub attempts: Vec<AttemptRecord>,
}

/// Point-in-time executor counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub requests: usize,
    /// Successes that needed at least one fallback step.
    pub fallbacks_taken: usize,
    pub exhaustions: usize,
    pub fatal_aborts: usize,
}

#[derive(Debug, Default)]
struct ExecutorMetrics {
    requests: AtomicUsize,
    fallbacks_taken: AtomicUsize,
    exhaustions: AtomicUsize,
    fatal_aborts: AtomicUsize,
}

impl ExecutorMetrics {
    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            fallbacks_taken: self.fallbacks_taken.load(Ordering::Relaxed),
            exhaustions: self.exhaustions.load(Ordering::Relaxed),
            fatal_aborts: self.fatal_aborts.load(Ordering::Relaxed),
        }
    }
}

/// Drives selection, credential choice, context validation, and the
/// injected transport for one call, cascading across candidates.
pub struct FallbackExecutor {
    selector: ModelSelector,
    guard: ContextWindowGuard,
    profiles: Arc<AuthProfileManager>,
    transport: Arc<dyn ModelTransport>,
    classifier: ErrorClassifier,
    fallback_chain: Vec<ModelRef>,
    call_timeout: Duration,
    metrics: ExecutorMetrics,
    catalog: Arc<ModelCatalog>,
}

impl FallbackExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<ModelCatalog>,
        selector: ModelSelector,
        guard: ContextWindowGuard,
        profiles: Arc<AuthProfileManager>,
        transport: Arc<dyn ModelTransport>,
        classifier: ErrorClassifier,
        fallback_chain: Vec<ModelRef>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            selector,
            guard,
            profiles,
            transport,
            classifier,
            fallback_chain,
            call_timeout,
            metrics: ExecutorMetrics::default(),
            catalog,
        }
    }

    /// Wire up an executor from startup configuration plus the two
    /// injected collaborators (transport and token estimator).
    pub fn from_settings(
        settings: &LlmSettings,
        transport: Arc<dyn ModelTransport>,
        estimator: Arc<dyn TokenEstimator>,
    ) -> Self {
        let catalog = Arc::new(ModelCatalog::builtin());
        let aliases = Arc::new(
            AliasResolver::new(settings.default_model_ref()).with_aliases(settings.alias_overrides()),
        );
        let selector = ModelSelector::new(
            Arc::clone(&catalog),
            Arc::clone(&aliases),
            PreferenceTable::builtin().with_overrides(settings.preference_overrides()),
        );
        let guard = ContextWindowGuard::new(
            Arc::clone(&catalog),
            settings.context_window_override_refs(),
            settings.default_context_window,
            settings.agent_context_token_cap,
            estimator,
        );
        let profiles = Arc::new(settings.build_profile_manager());
        let classifier = ErrorClassifier::with_rules(settings.classifier_rules.clone());

        Self::new(
            catalog,
            selector,
            guard,
            profiles,
            transport,
            classifier,
            settings.fallback_chain_refs(),
            Duration::from_secs(settings.call_timeout_secs),
        )
    }

    /// The profile pool, for registration and introspection.
    pub fn profiles(&self) -> &Arc<AuthProfileManager> {
        &self.profiles
    }

    /// The selector, for callers that only want a model decision.
    pub fn selector(&self) -> &ModelSelector {
        &self.selector
    }

    /// The context guard, for pre-flight fit checks.
    pub fn guard(&self) -> &ContextWindowGuard {
        &self.guard
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Candidate list for one call: selector primary first, then the
    /// configured fallback chain, deduplicated in order.
    fn candidates(&self, task: TaskType, options: &SelectionOptions) -> Vec<ModelRef> {
        let primary = self.selector.select(task, options);
        let mut out = vec![primary];
        for model in &self.fallback_chain {
            if !out.contains(model) {
                out.push(model.clone());
            }
        }
        out
    }

    /// Execute a request with cascading fallback.
    ///
    /// Walks the candidate list sequentially. A candidate is skipped when
    /// its provider has no available profile or the request fails context
    /// validation; a transient or auth/quota failure records a profile
    /// failure and moves on; a fatal failure aborts the whole chain.
    pub async fn execute_with_fallback(
        &self,
        request: &LlmRequest,
        task: TaskType,
        options: &SelectionOptions,
    ) -> Result<Served, FallbackError> {
        self.metrics.requests.fetch_add(1, Ordering::Relaxed);

        let candidates = self.candidates(task, options);
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for model in candidates {
            let Some(profile) = self.profiles.get_available_profile(&model.provider) else {
                tracing::debug!(%model, "no available profile, skipping candidate");
                attempts.push(AttemptRecord {
                    model,
                    profile_id: None,
                    outcome: AttemptOutcome::SkippedNoProfile,
                    message: "every profile for the provider is cooling down".to_string(),
                });
                continue;
            };

            let validation = self.guard.validate(request, &model);
            if let Some(error) = validation.errors.first() {
                tracing::debug!(%model, %error, "context validation failed, skipping candidate");
                attempts.push(AttemptRecord {
                    model,
                    profile_id: Some(profile.id),
                    outcome: AttemptOutcome::SkippedContext,
                    message: error.to_string(),
                });
                continue;
            }
            for warning in &validation.warnings {
                tracing::warn!(%model, "{warning}");
            }

            // The profile lock was released inside get_available_profile;
            // nothing is held across this await, so cancellation (drop or
            // timeout) cannot leave pool state inconsistent.
            let call = self
                .transport
                .complete(request, &model, profile.credential());
            let error = match tokio::time::timeout(self.call_timeout, call).await {
                Ok(Ok(response)) => {
                    if let Err(e) = self.profiles.mark_success(&profile.id) {
                        tracing::warn!(profile = %profile.id, %e, "profile vanished mid-call");
                    }
                    if !attempts.is_empty() {
                        self.metrics.fallbacks_taken.fetch_add(1, Ordering::Relaxed);
                    }
                    if let Some(info) = self.catalog.model_info(&model) {
                        let cost = pricing::estimate_cost(
                            info,
                            u64::from(validation.required),
                            request.max_output_tokens.map(u64::from),
                        );
                        tracing::debug!(
                            %model,
                            profile = %profile.id,
                            fallbacks = attempts.len(),
                            estimated_cost = %cost,
                            "request served"
                        );
                    }
                    return Ok(Served {
                        response,
                        model,
                        profile_id: profile.id,
                        attempts,
                    });
                }
                Ok(Err(error)) => error,
                Err(_elapsed) => TransportError::new(
                    None,
                    format!("call timed out after {:?}", self.call_timeout),
                ),
            };

            let class = self.classifier.classify(&error);
            tracing::warn!(
                %model,
                profile = %profile.id,
                %class,
                error = %error,
                "candidate failed"
            );

            if class == ErrorClass::Fatal {
                // Retrying a malformed request elsewhere cannot succeed.
                self.metrics.fatal_aborts.fetch_add(1, Ordering::Relaxed);
                attempts.push(AttemptRecord {
                    model: model.clone(),
                    profile_id: Some(profile.id),
                    outcome: AttemptOutcome::Failed(class),
                    message: error.message.clone(),
                });
                return Err(FallbackError::Fatal {
                    model,
                    message: error.message,
                    attempts,
                });
            }

            if let Err(e) = self.profiles.mark_failure(&profile.id) {
                tracing::warn!(profile = %profile.id, %e, "profile vanished mid-call");
            }
            attempts.push(AttemptRecord {
                model,
                profile_id: Some(profile.id),
                outcome: AttemptOutcome::Failed(class),
                message: error.message,
            });
        }

        self.metrics.exhaustions.fetch_add(1, Ordering::Relaxed);
        Err(FallbackError::Exhausted { attempts })
    }
}
