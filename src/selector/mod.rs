//! Task-driven model selection.
//!
//! Maps a task type to an ordered preference list, applies the caller's
//! filters (provider allow/deny, context floor, cost ceiling, required
//! capabilities), and returns the first surviving candidate. Selection is
//! total: when nothing survives, the configured default model is returned
//! rather than an error.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::catalog::{AliasResolver, CostTier, ModelCapabilities, ModelCatalog, ModelRef, ModelSpec};

/// Classification of the calling task, used to rank preferred models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    CodeAnalysis,
    DecisionMaking,
    PatternMatching,
    MetricAnalysis,
    Refactoring,
    Consultation,
    General,
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskType::CodeAnalysis => "code-analysis",
            TaskType::DecisionMaking => "decision-making",
            TaskType::PatternMatching => "pattern-matching",
            TaskType::MetricAnalysis => "metric-analysis",
            TaskType::Refactoring => "refactoring",
            TaskType::Consultation => "consultation",
            TaskType::General => "general",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code-analysis" => Ok(Self::CodeAnalysis),
            "decision-making" => Ok(Self::DecisionMaking),
            "pattern-matching" => Ok(Self::PatternMatching),
            "metric-analysis" => Ok(Self::MetricAnalysis),
            "refactoring" => Ok(Self::Refactoring),
            "consultation" => Ok(Self::Consultation),
            "general" => Ok(Self::General),
            other => Err(format!("unknown task type '{other}'")),
        }
    }
}

/// Ordered model preferences per task type.
#[derive(Debug, Clone)]
pub struct PreferenceTable {
    preferences: HashMap<TaskType, Vec<ModelRef>>,
}

impl PreferenceTable {
    /// The builtin preference ordering.
    pub fn builtin() -> Self {
        let mut m = HashMap::new();
        m.insert(TaskType::CodeAnalysis, refs(&[
            "anthropic/claude-sonnet-4",
            "openai/gpt-5.3-codex",
            "deepseek/deepseek-chat",
        ]));
        m.insert(TaskType::DecisionMaking, refs(&[
            "anthropic/claude-opus-4.6",
            "openai/gpt-5.2",
            "google/gemini-2.5-pro",
        ]));
        m.insert(TaskType::PatternMatching, refs(&[
            "google/gemini-2.5-flash",
            "openai/gpt-5-mini",
            "anthropic/claude-haiku-4.5",
        ]));
        m.insert(TaskType::MetricAnalysis, refs(&[
            "openai/gpt-5-mini",
            "google/gemini-2.5-flash",
            "deepseek/deepseek-chat",
        ]));
        m.insert(TaskType::Refactoring, refs(&[
            "openai/gpt-5.3-codex",
            "anthropic/claude-sonnet-4",
            "ollama/qwen3-coder:30b",
        ]));
        m.insert(TaskType::Consultation, refs(&[
            "anthropic/claude-opus-4.6",
            "google/gemini-2.5-pro",
            "openai/gpt-5.2",
        ]));
        m.insert(TaskType::General, refs(&[
            "anthropic/claude-sonnet-4",
            "openai/gpt-5-mini",
            "google/gemini-2.5-flash",
        ]));
        Self { preferences: m }
    }

    /// Overlay configured preference lists (configuration wins).
    pub fn with_overrides<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (TaskType, Vec<ModelRef>)>,
    {
        for (task, list) in overrides {
            self.preferences.insert(task, list);
        }
        self
    }

    /// Preference list for a task, falling back to the general list.
    pub fn for_task(&self, task: TaskType) -> &[ModelRef] {
        self.preferences
            .get(&task)
            .or_else(|| self.preferences.get(&TaskType::General))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

fn refs(ids: &[&str]) -> Vec<ModelRef> {
    ids.iter()
        .filter_map(|id| ModelRef::parse(id))
        .collect()
}

/// Caller-supplied selection filters, applied per call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionOptions {
    /// Bypass all filtering and use this model (the operator has taken
    /// explicit responsibility).
    #[serde(default)]
    pub force_model: Option<ModelSpec>,

    /// When set, only these providers are considered.
    #[serde(default)]
    pub allowed_providers: Option<HashSet<String>>,

    /// Providers never considered.
    #[serde(default)]
    pub excluded_providers: HashSet<String>,

    /// Minimum catalog context window, in tokens.
    #[serde(default)]
    pub context_window_min: Option<u32>,

    /// Maximum acceptable cost tier (inclusive).
    #[serde(default)]
    pub max_cost_tier: Option<CostTier>,

    /// Capability flags the candidate must have. Flags left `false` are
    /// not required.
    #[serde(default)]
    pub require_capabilities: ModelCapabilities,
}

/// Why the selector chose the model it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionReason {
    /// `force_model` was set.
    Forced,
    /// A task-preference candidate survived the filters.
    Preference,
    /// Nothing survived; the configured default was used.
    Fallback,
}

/// The result of a selection, with enough metadata to explain it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Selection {
    pub model: ModelRef,
    pub reason: SelectionReason,
    /// Index of the chosen model in the task's preference list.
    pub preference_rank: Option<usize>,
    /// How many preference candidates the filters removed.
    pub filtered_count: usize,
}

/// Applies task preferences and filters to pick a model.
#[derive(Debug, Clone)]
pub struct ModelSelector {
    catalog: Arc<ModelCatalog>,
    aliases: Arc<AliasResolver>,
    preferences: PreferenceTable,
}

impl ModelSelector {
    pub fn new(
        catalog: Arc<ModelCatalog>,
        aliases: Arc<AliasResolver>,
        preferences: PreferenceTable,
    ) -> Self {
        Self {
            catalog,
            aliases,
            preferences,
        }
    }

    /// Select a model for a task. Total: always returns some model.
    pub fn select(&self, task: TaskType, options: &SelectionOptions) -> ModelRef {
        self.select_with_metadata(task, options).model
    }

    /// Select a model and explain the choice.
    pub fn select_with_metadata(&self, task: TaskType, options: &SelectionOptions) -> Selection {
        if let Some(spec) = &options.force_model {
            let model = self.aliases.resolve(spec);
            tracing::debug!(%task, %model, "model selection forced");
            return Selection {
                model,
                reason: SelectionReason::Forced,
                preference_rank: None,
                filtered_count: 0,
            };
        }

        let candidates = self.preferences.for_task(task);
        let survivors: Vec<(usize, &ModelRef)> = candidates
            .iter()
            .enumerate()
            .filter(|(_, m)| self.passes_filters(m, options))
            .collect();
        let filtered_count = candidates.len() - survivors.len();

        match survivors.first() {
            Some((rank, model)) => {
                tracing::debug!(
                    %task,
                    model = %model,
                    rank,
                    filtered = filtered_count,
                    "model selected from task preferences"
                );
                Selection {
                    model: (*model).clone(),
                    reason: SelectionReason::Preference,
                    preference_rank: Some(*rank),
                    filtered_count,
                }
            }
            None => {
                let model = self.aliases.default_model().clone();
                tracing::debug!(
                    %task,
                    model = %model,
                    filtered = filtered_count,
                    "no preference candidate survived filters, using default"
                );
                Selection {
                    model,
                    reason: SelectionReason::Fallback,
                    preference_rank: None,
                    filtered_count,
                }
            }
        }
    }

    fn passes_filters(&self, model: &ModelRef, options: &SelectionOptions) -> bool {
        if let Some(allowed) = &options.allowed_providers {
            if !allowed.contains(&model.provider) {
                return false;
            }
        }
        if options.excluded_providers.contains(&model.provider) {
            return false;
        }
        if let Some(min) = options.context_window_min {
            if self.catalog.context_window(model) < min {
                return false;
            }
        }
        let info = self.catalog.model_info(model);
        if let Some(ceiling) = options.max_cost_tier {
            // A model absent from the catalog has unknown cost; it cannot be
            // shown to respect the ceiling.
            match info {
                Some(info) if info.cost_tier <= ceiling => {}
                _ => return false,
            }
        }
        let required = &options.require_capabilities;
        if required.code || required.reasoning || required.general || required.vision
            || required.tools
        {
            let Some(info) = info else { return false };
            let caps = &info.capabilities;
            if (required.code && !caps.code)
                || (required.reasoning && !caps.reasoning)
                || (required.general && !caps.general)
                || (required.vision && !caps.vision)
                || (required.tools && !caps.tools)
            {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn selector() -> ModelSelector {
        let catalog = Arc::new(ModelCatalog::builtin());
        let aliases = Arc::new(AliasResolver::new(ModelRef::new(
            "anthropic",
            "claude-sonnet-4",
        )));
        ModelSelector::new(catalog, aliases, PreferenceTable::builtin())
    }

    #[test]
    fn first_preference_wins_without_filters() {
        let s = selector();
        let selection = s.select_with_metadata(TaskType::CodeAnalysis, &SelectionOptions::default());
        assert_eq!(selection.model, ModelRef::new("anthropic", "claude-sonnet-4"));
        assert_eq!(selection.reason, SelectionReason::Preference);
        assert_eq!(selection.preference_rank, Some(0));
        assert_eq!(selection.filtered_count, 0);
    }

    #[test]
    fn force_bypasses_filters() {
        let s = selector();
        let options = SelectionOptions {
            force_model: Some(ModelSpec::parse("ollama/deepseek-r1:70b")),
            // A filter the forced model would fail:
            allowed_providers: Some(["anthropic".to_string()].into()),
            ..Default::default()
        };
        let selection = s.select_with_metadata(TaskType::General, &options);
        assert_eq!(selection.model, ModelRef::new("ollama", "deepseek-r1:70b"));
        assert_eq!(selection.reason, SelectionReason::Forced);
    }

    #[test]
    fn forced_alias_is_resolved() {
        let s = selector();
        let options = SelectionOptions {
            force_model: Some(ModelSpec::parse("best")),
            ..Default::default()
        };
        let selection = s.select_with_metadata(TaskType::General, &options);
        assert_eq!(selection.model, ModelRef::new("anthropic", "claude-opus-4.6"));
    }

    #[test]
    fn provider_allow_list_filters() {
        let s = selector();
        let options = SelectionOptions {
            allowed_providers: Some(["openai".to_string()].into()),
            ..Default::default()
        };
        let selection = s.select_with_metadata(TaskType::CodeAnalysis, &options);
        assert_eq!(selection.model.provider, "openai");
        assert_eq!(selection.reason, SelectionReason::Preference);
        assert_eq!(selection.preference_rank, Some(1));
        assert_eq!(selection.filtered_count, 2);
    }

    #[test]
    fn provider_deny_list_filters() {
        let s = selector();
        let options = SelectionOptions {
            excluded_providers: ["anthropic".to_string()].into(),
            ..Default::default()
        };
        let selection = s.select_with_metadata(TaskType::Consultation, &options);
        assert_ne!(selection.model.provider, "anthropic");
    }

    #[test]
    fn context_window_floor_filters() {
        let s = selector();
        let options = SelectionOptions {
            context_window_min: Some(300_000),
            ..Default::default()
        };
        // General prefs: sonnet (200k) and mini (200k) fail, flash (1M) survives.
        let selection = s.select_with_metadata(TaskType::General, &options);
        assert_eq!(selection.model, ModelRef::new("google", "gemini-2.5-flash"));
        assert_eq!(selection.filtered_count, 2);
    }

    #[test]
    fn cost_ceiling_filters() {
        let s = selector();
        let options = SelectionOptions {
            max_cost_tier: Some(CostTier::Low),
            ..Default::default()
        };
        let selection = s.select_with_metadata(TaskType::DecisionMaking, &options);
        // Every decision-making preference is High/Premium tier.
        assert_eq!(selection.reason, SelectionReason::Fallback);
        assert_eq!(selection.model, ModelRef::new("anthropic", "claude-sonnet-4"));
    }

    #[test]
    fn capability_requirement_filters() {
        let s = selector();
        let options = SelectionOptions {
            require_capabilities: ModelCapabilities {
                vision: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let selection = s.select_with_metadata(TaskType::General, &options);
        let info = s.catalog.model_info(&selection.model).unwrap();
        assert!(info.capabilities.vision);
    }

    #[test]
    fn selection_is_total() {
        let s = selector();
        let options = SelectionOptions {
            allowed_providers: Some(["no-such-provider".to_string()].into()),
            ..Default::default()
        };
        // Nothing can survive, but we still get a model back.
        let selection = s.select_with_metadata(TaskType::General, &options);
        assert_eq!(selection.reason, SelectionReason::Fallback);
        assert_eq!(selection.model, ModelRef::new("anthropic", "claude-sonnet-4"));
        assert_eq!(selection.filtered_count, 3);
    }

    #[test]
    fn task_type_string_round_trip() {
        for task in [
            TaskType::CodeAnalysis,
            TaskType::DecisionMaking,
            TaskType::PatternMatching,
            TaskType::MetricAnalysis,
            TaskType::Refactoring,
            TaskType::Consultation,
            TaskType::General,
        ] {
            assert_eq!(task.to_string().parse::<TaskType>().unwrap(), task);
        }
    }
}
