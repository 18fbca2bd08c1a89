//! Execution core of the agent platform's model layer.
//!
//! Decides which LLM endpoint serves a task, which credential calls it,
//! whether the request fits the model's context window, and what happens
//! when a call fails. Everything else in the platform goes through
//! [`FallbackExecutor::execute_with_fallback`] instead of calling a
//! provider directly.
//!
//! # Architecture
//!
//! ```text
//! task + options
//!       │
//!       ▼
//! ModelSelector ──► ranked candidates (primary + fallback chain)
//!       │
//!       ▼  per candidate, strictly in order
//! AuthProfileManager ──► credential (round-robin, cooldown-aware)
//! ContextWindowGuard ──► fits? (override → catalog → default, capped)
//! ModelTransport     ──► the injected provider call
//!       │
//!       ├─ success ──► mark_success, done
//!       ├─ transient / auth ──► mark_failure, next candidate
//!       └─ fatal ──► abort the whole chain
//! ```
//!
//! The catalog, alias table, and preference table are read-only after
//! construction. The profile pool is the only shared mutable state and is
//! locked per provider. Nothing here speaks a wire protocol: the transport
//! and the token estimator are injected by the surrounding platform, and
//! all collaborators are constructed explicitly and passed in — there are
//! no global registries.

pub mod catalog;
pub mod context;
pub mod error;
pub mod fallback;
pub mod profiles;
pub mod selector;
pub mod settings;

pub use catalog::{
    AliasResolver, CostTier, ModelCapabilities, ModelCatalog, ModelInfo, ModelRef, ModelSpec,
    QualityTier, SpeedTier, DEFAULT_CONTEXT_WINDOW,
};
pub use context::{
    ContextValidation, ContextWindowGuard, ContextWindowResolution, HeuristicEstimator,
    TokenEstimator, WindowSource, HARD_MINIMUM_WINDOW, RECOMMENDED_MINIMUM_WINDOW,
};
pub use error::{ContextError, ErrorClass, ProfileError};
pub use fallback::{
    AttemptOutcome, AttemptRecord, ClassifierRule, ErrorClassifier, FallbackError,
    FallbackExecutor, LlmRequest, LlmResponse, MetricsSnapshot, ModelTransport, Served,
    TransportError,
};
pub use profiles::{AuthProfileManager, ProfileStatus, SelectedProfile};
pub use selector::{
    ModelSelector, PreferenceTable, Selection, SelectionOptions, SelectionReason, TaskType,
};
pub use settings::{LlmSettings, ProfileSettings};
