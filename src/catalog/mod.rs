//! Model catalog, alias resolution, and pricing.
//!
//! Everything here is read-only after construction and safe to share
//! across tasks without synchronization.

mod alias;
mod models;
pub mod pricing;

pub use alias::{AliasResolver, ModelSpec};
pub use models::{
    CostTier, ModelCapabilities, ModelCatalog, ModelInfo, ModelRef, QualityTier, SpeedTier,
    DEFAULT_CONTEXT_WINDOW,
};
