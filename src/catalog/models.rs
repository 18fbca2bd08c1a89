//! Static model catalog.
//!
//! Maps (provider, model) pairs to capability flags, context windows,
//! cost/speed/quality tiers, and per-million pricing. Built once at process
//! start from a fixed table and read-only thereafter.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Context window assumed for models the catalog does not know about.
pub const DEFAULT_CONTEXT_WINDOW: u32 = 128_000;

/// Identity of a specific LLM endpoint: (provider, model name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse a `"provider/model"` string, splitting on the first `/`.
    ///
    /// Model names may themselves contain slashes (e.g. org-scoped names),
    /// so only the first separator is significant.
    pub fn parse(s: &str) -> Option<Self> {
        let (provider, model) = s.split_once('/')?;
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        Some(Self::new(provider, model))
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Model capability flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub code: bool,
    pub reasoning: bool,
    pub general: bool,
    pub vision: bool,
    pub tools: bool,
}

/// Relative cost of a model. Ordering is Low < Medium < High < Premium,
/// which is what the selector's cost-ceiling filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CostTier {
    Low,
    Medium,
    High,
    Premium,
}

impl fmt::Display for CostTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostTier::Low => write!(f, "low"),
            CostTier::Medium => write!(f, "medium"),
            CostTier::High => write!(f, "high"),
            CostTier::Premium => write!(f, "premium"),
        }
    }
}

/// Relative latency of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedTier {
    Slow,
    Standard,
    Fast,
}

/// Relative output quality of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Standard,
    High,
    Premium,
}

/// A model in the catalog with capabilities, tiers, and pricing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub reference: ModelRef,
    pub context_window: u32,
    pub capabilities: ModelCapabilities,
    pub cost_tier: CostTier,
    pub speed_tier: SpeedTier,
    pub quality_tier: QualityTier,
    /// USD per million input tokens.
    pub input_price_per_million: Decimal,
    /// USD per million output tokens.
    pub output_price_per_million: Decimal,
    pub description: String,
}

/// The model catalog — registry of known models.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: HashMap<ModelRef, ModelInfo>,
}

impl ModelCatalog {
    /// Create a catalog populated with the builtin model table.
    pub fn builtin() -> Self {
        let models = builtin_models()
            .into_iter()
            .map(|m| (m.reference.clone(), m))
            .collect();
        Self { models }
    }

    /// Create an empty catalog (tests and embedders that bring their own table).
    pub fn from_models(models: Vec<ModelInfo>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|m| (m.reference.clone(), m))
                .collect(),
        }
    }

    /// Look up a model's catalog entry.
    pub fn model_info(&self, reference: &ModelRef) -> Option<&ModelInfo> {
        self.models.get(reference)
    }

    /// Effective context window for a model.
    ///
    /// Unknown models get [`DEFAULT_CONTEXT_WINDOW`] — this never errors,
    /// so a caller's best-effort model hint never blocks execution.
    pub fn context_window(&self, reference: &ModelRef) -> u32 {
        self.models
            .get(reference)
            .map(|m| m.context_window)
            .unwrap_or(DEFAULT_CONTEXT_WINDOW)
    }

    /// All catalog entries for one provider.
    pub fn models_for_provider(&self, provider: &str) -> Vec<&ModelInfo> {
        let mut out: Vec<&ModelInfo> = self
            .models
            .values()
            .filter(|m| m.reference.provider == provider)
            .collect();
        out.sort_by(|a, b| a.reference.model.cmp(&b.reference.model));
        out
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Builtin model table
// ---------------------------------------------------------------------------

#[allow(clippy::too_many_arguments)]
fn mi(
    provider: &str,
    model: &str,
    ctx: u32,
    caps: (bool, bool, bool, bool, bool),
    cost: CostTier,
    speed: SpeedTier,
    quality: QualityTier,
    input: Decimal,
    output: Decimal,
    description: &str,
) -> ModelInfo {
    let (code, reasoning, general, vision, tools) = caps;
    ModelInfo {
        reference: ModelRef::new(provider, model),
        context_window: ctx,
        capabilities: ModelCapabilities {
            code,
            reasoning,
            general,
            vision,
            tools,
        },
        cost_tier: cost,
        speed_tier: speed,
        quality_tier: quality,
        input_price_per_million: input,
        output_price_per_million: output,
        description: description.to_string(),
    }
}

fn builtin_models() -> Vec<ModelInfo> {
    use CostTier as C;
    use QualityTier as Q;
    use SpeedTier as S;

    // caps = (code, reasoning, general, vision, tools)
    vec![
        // Anthropic
        mi("anthropic", "claude-opus-4.6", 1_000_000, (true, true, true, true, true),
            C::Premium, S::Slow, Q::Premium, dec!(5.0), dec!(25.0),
            "Deepest reasoning; the consultation and decision-making workhorse"),
        mi("anthropic", "claude-sonnet-4", 200_000, (true, true, true, false, true),
            C::High, S::Standard, Q::High, dec!(3.0), dec!(15.0),
            "Balanced code/analysis model, default for most tasks"),
        mi("anthropic", "claude-haiku-4.5", 200_000, (true, false, true, false, true),
            C::Medium, S::Fast, Q::Standard, dec!(1.0), dec!(5.0),
            "Fast and cheap for high-volume light work"),
        // OpenAI
        mi("openai", "gpt-5.2", 400_000, (true, true, true, true, true),
            C::High, S::Standard, Q::Premium, dec!(1.75), dec!(14.0),
            "Large-window generalist with vision"),
        mi("openai", "gpt-5.3-codex", 128_000, (true, true, false, false, true),
            C::High, S::Standard, Q::High, dec!(2.5), dec!(12.0),
            "Code-specialized; strong at refactoring"),
        mi("openai", "gpt-5-mini", 200_000, (true, false, true, false, true),
            C::Low, S::Fast, Q::Standard, dec!(0.25), dec!(2.0),
            "Cheap general model for metric crunching and summaries"),
        mi("openai", "gpt-5-nano", 128_000, (false, false, true, false, false),
            C::Low, S::Fast, Q::Standard, dec!(0.05), dec!(0.4),
            "Smallest tier, classification-grade"),
        // Google
        mi("google", "gemini-2.5-pro", 1_050_000, (true, true, true, true, false),
            C::High, S::Standard, Q::High, dec!(1.25), dec!(10.0),
            "Huge context window, good multimodal analysis"),
        mi("google", "gemini-2.5-flash", 1_000_000, (false, false, true, true, false),
            C::Low, S::Fast, Q::Standard, dec!(0.15), dec!(0.6),
            "Huge window at flash pricing; pattern scans over large inputs"),
        // DeepSeek
        mi("deepseek", "deepseek-chat", 128_000, (true, false, true, false, false),
            C::Low, S::Standard, Q::Standard, dec!(0.28), dec!(0.42),
            "Budget code/general model"),
        mi("deepseek", "deepseek-reasoner", 128_000, (false, true, true, false, false),
            C::Low, S::Slow, Q::High, dec!(0.28), dec!(0.42),
            "Budget chain-of-thought model"),
        // Ollama / local (zero cost)
        mi("ollama", "qwen3-coder:30b", 128_000, (true, false, true, false, true),
            C::Low, S::Standard, Q::Standard, Decimal::ZERO, Decimal::ZERO,
            "Local code model, free"),
        mi("ollama", "deepseek-r1:70b", 128_000, (false, true, true, false, false),
            C::Low, S::Slow, Q::Standard, Decimal::ZERO, Decimal::ZERO,
            "Local reasoning model, free"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_splits_on_first_slash() {
        let r = ModelRef::parse("ollama/qwen3-coder:30b").unwrap();
        assert_eq!(r.provider, "ollama");
        assert_eq!(r.model, "qwen3-coder:30b");

        let r = ModelRef::parse("openrouter/meta/llama-4").unwrap();
        assert_eq!(r.provider, "openrouter");
        assert_eq!(r.model, "meta/llama-4");
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(ModelRef::parse("no-slash").is_none());
        assert!(ModelRef::parse("/leading").is_none());
        assert!(ModelRef::parse("trailing/").is_none());
    }

    #[test]
    fn display_round_trips() {
        let r = ModelRef::new("anthropic", "claude-sonnet-4");
        assert_eq!(ModelRef::parse(&r.to_string()).unwrap(), r);
    }

    #[test]
    fn cost_tier_ordering() {
        assert!(CostTier::Low < CostTier::Medium);
        assert!(CostTier::Medium < CostTier::High);
        assert!(CostTier::High < CostTier::Premium);
    }

    #[test]
    fn known_model_lookup() {
        let catalog = ModelCatalog::builtin();
        let info = catalog
            .model_info(&ModelRef::new("anthropic", "claude-opus-4.6"))
            .unwrap();
        assert_eq!(info.context_window, 1_000_000);
        assert!(info.capabilities.reasoning);
        assert_eq!(info.cost_tier, CostTier::Premium);
    }

    #[test]
    fn unknown_model_gets_default_window() {
        let catalog = ModelCatalog::builtin();
        let window = catalog.context_window(&ModelRef::new("acme", "unknown-1"));
        assert_eq!(window, DEFAULT_CONTEXT_WINDOW);
    }

    #[test]
    fn provider_listing() {
        let catalog = ModelCatalog::builtin();
        let anthropic = catalog.models_for_provider("anthropic");
        assert_eq!(anthropic.len(), 3);
        assert!(anthropic.iter().all(|m| m.reference.provider == "anthropic"));
    }
}
