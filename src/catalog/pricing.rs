//! Per-call cost estimation from catalog pricing.
//!
//! Informational only — the selector filters on cost *tiers*; this gives
//! operators a dollar figure in logs and selection metadata.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::models::ModelInfo;

/// Completion-token allowance assumed when the caller gives no bound.
const DEFAULT_OUTPUT_ESTIMATE: u64 = 4_096;

/// Estimate the USD cost of one call to `model` with roughly
/// `input_tokens` of prompt and an optional output bound.
pub fn estimate_cost(model: &ModelInfo, input_tokens: u64, max_output_tokens: Option<u64>) -> Decimal {
    let output_tokens = max_output_tokens.unwrap_or(DEFAULT_OUTPUT_ESTIMATE);
    let input_cost = Decimal::from(input_tokens) * model.input_price_per_million / dec!(1_000_000);
    let output_cost =
        Decimal::from(output_tokens) * model.output_price_per_million / dec!(1_000_000);
    input_cost + output_cost
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ModelCatalog, ModelRef};

    #[test]
    fn paid_model_has_positive_cost() {
        let catalog = ModelCatalog::builtin();
        let info = catalog
            .model_info(&ModelRef::new("anthropic", "claude-opus-4.6"))
            .unwrap();
        let cost = estimate_cost(info, 10_000, None);
        assert!(cost > Decimal::ZERO);
    }

    #[test]
    fn local_model_is_free() {
        let catalog = ModelCatalog::builtin();
        let info = catalog
            .model_info(&ModelRef::new("ollama", "qwen3-coder:30b"))
            .unwrap();
        assert_eq!(estimate_cost(info, 50_000, Some(8_000)), Decimal::ZERO);
    }

    #[test]
    fn output_bound_caps_estimate() {
        let catalog = ModelCatalog::builtin();
        let info = catalog
            .model_info(&ModelRef::new("openai", "gpt-5.2"))
            .unwrap();
        let small = estimate_cost(info, 1_000, Some(100));
        let large = estimate_cost(info, 1_000, Some(10_000));
        assert!(small < large);
    }
}
