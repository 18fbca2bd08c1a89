//! Startup configuration for the execution core.
//!
//! Stored in ~/.modelgate/settings.json and loaded once at startup with
//! file > default priority. The core consumes the parsed form only; no
//! environment probing happens here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::catalog::ModelRef;
use crate::fallback::ClassifierRule;
use crate::profiles::{AuthProfileManager, DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_COOLDOWN_MS};
use crate::selector::TaskType;

/// A credential registered at startup. Deserialize-only: credentials are
/// read from configuration but never written back out.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileSettings {
    pub id: String,
    pub provider: String,
    pub credential: SecretString,
}

/// Configuration read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Backoff base for profile cooldowns, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: i64,

    /// Backoff ceiling for profile cooldowns, in milliseconds.
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: i64,

    /// Context window assumed for models the catalog does not know.
    #[serde(default = "default_context_window")]
    pub default_context_window: u32,

    /// Agent-wide context ceiling. When set, no model is treated as
    /// offering more than this many tokens.
    #[serde(default)]
    pub agent_context_token_cap: Option<u32>,

    /// Per-model window overrides, keyed by `"provider/model"`.
    #[serde(default)]
    pub context_window_overrides: HashMap<String, u32>,

    /// Model used when selection filters eliminate every preference and
    /// when a caller's model hint cannot be resolved.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Extra alias table entries, alias → `"provider/model"`.
    #[serde(default)]
    pub aliases: HashMap<String, String>,

    /// Per-task preference list overrides, task type → `"provider/model"` list.
    #[serde(default)]
    pub task_preferences: HashMap<String, Vec<String>>,

    /// Models appended after the selector's primary, tried in order.
    #[serde(default = "default_fallback_chain")]
    pub fallback_chain: Vec<String>,

    /// Wall-clock bound on one transport call.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Extra failure-classification rules, tried before the builtins.
    #[serde(default)]
    pub classifier_rules: Vec<ClassifierRule>,

    /// Credentials registered at startup. Never serialized back to disk.
    #[serde(default, skip_serializing)]
    pub profiles: Vec<ProfileSettings>,
}

fn default_base_delay_ms() -> i64 {
    DEFAULT_BASE_DELAY_MS
}

fn default_max_cooldown_ms() -> i64 {
    DEFAULT_MAX_COOLDOWN_MS
}

fn default_context_window() -> u32 {
    crate::catalog::DEFAULT_CONTEXT_WINDOW
}

fn default_model() -> String {
    "anthropic/claude-sonnet-4".to_string()
}

fn default_fallback_chain() -> Vec<String> {
    vec![
        "anthropic/claude-sonnet-4".to_string(),
        "openai/gpt-5-mini".to_string(),
        "google/gemini-2.5-flash".to_string(),
    ]
}

fn default_call_timeout_secs() -> u64 {
    120
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_cooldown_ms: default_max_cooldown_ms(),
            default_context_window: default_context_window(),
            agent_context_token_cap: None,
            context_window_overrides: HashMap::new(),
            default_model: default_model(),
            aliases: HashMap::new(),
            task_preferences: HashMap::new(),
            fallback_chain: default_fallback_chain(),
            call_timeout_secs: default_call_timeout_secs(),
            classifier_rules: Vec::new(),
            profiles: Vec::new(),
        }
    }
}

impl LlmSettings {
    /// Default settings file path (~/.modelgate/settings.json).
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".modelgate")
            .join("settings.json")
    }

    /// Load settings from disk, returning defaults if not found.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load settings from a specific path.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), %e, "unreadable settings file, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// The default model as a reference. A malformed configured value
    /// degrades to the builtin default rather than failing startup.
    pub fn default_model_ref(&self) -> ModelRef {
        match ModelRef::parse(&self.default_model) {
            Some(reference) => reference,
            None => {
                tracing::warn!(value = %self.default_model, "malformed default_model, using builtin default");
                ModelRef::new("anthropic", "claude-sonnet-4")
            }
        }
    }

    /// Configured alias additions, with unparseable targets dropped.
    pub fn alias_overrides(&self) -> Vec<(String, ModelRef)> {
        self.aliases
            .iter()
            .filter_map(|(alias, target)| match ModelRef::parse(target) {
                Some(reference) => Some((alias.clone(), reference)),
                None => {
                    tracing::warn!(%alias, %target, "dropping alias with malformed target");
                    None
                }
            })
            .collect()
    }

    /// Configured preference overrides, with unknown task types and
    /// unparseable models dropped.
    pub fn preference_overrides(&self) -> Vec<(TaskType, Vec<ModelRef>)> {
        self.task_preferences
            .iter()
            .filter_map(|(task, models)| {
                let task: TaskType = match task.parse() {
                    Ok(t) => t,
                    Err(e) => {
                        tracing::warn!(%e, "dropping preference override");
                        return None;
                    }
                };
                let refs: Vec<ModelRef> =
                    models.iter().filter_map(|m| ModelRef::parse(m)).collect();
                (!refs.is_empty()).then_some((task, refs))
            })
            .collect()
    }

    /// Window overrides keyed by parsed reference.
    pub fn context_window_override_refs(&self) -> HashMap<ModelRef, u32> {
        self.context_window_overrides
            .iter()
            .filter_map(|(key, window)| ModelRef::parse(key).map(|r| (r, *window)))
            .collect()
    }

    /// The configured fallback chain as references.
    pub fn fallback_chain_refs(&self) -> Vec<ModelRef> {
        self.fallback_chain
            .iter()
            .filter_map(|m| ModelRef::parse(m))
            .collect()
    }

    /// Build the profile pool and register the configured credentials.
    pub fn build_profile_manager(&self) -> AuthProfileManager {
        let manager = AuthProfileManager::new(self.base_delay_ms, self.max_cooldown_ms);
        for p in &self.profiles {
            manager.add_profile(&p.id, &p.provider, p.credential.clone());
        }
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_sane() {
        let s = LlmSettings::default();
        assert_eq!(s.base_delay_ms, 60_000);
        assert_eq!(s.max_cooldown_ms, 3_600_000);
        assert_eq!(s.default_context_window, 128_000);
        assert_eq!(s.agent_context_token_cap, None);
        assert_eq!(
            s.default_model_ref(),
            ModelRef::new("anthropic", "claude-sonnet-4")
        );
        assert_eq!(s.fallback_chain_refs().len(), 3);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let s = LlmSettings::load_from(Path::new("/nonexistent/settings.json"));
        assert_eq!(s.base_delay_ms, 60_000);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut s = LlmSettings::default();
        s.agent_context_token_cap = Some(64_000);
        s.context_window_overrides
            .insert("anthropic/claude-sonnet-4".to_string(), 150_000);
        s.aliases
            .insert("workhorse".to_string(), "openai/gpt-5.2".to_string());
        std::fs::write(&path, serde_json::to_string_pretty(&s).unwrap()).unwrap();

        let loaded = LlmSettings::load_from(&path);
        assert_eq!(loaded.agent_context_token_cap, Some(64_000));
        assert_eq!(
            loaded.context_window_override_refs(),
            HashMap::from([(ModelRef::new("anthropic", "claude-sonnet-4"), 150_000)])
        );
        assert_eq!(
            loaded.alias_overrides(),
            vec![("workhorse".to_string(), ModelRef::new("openai", "gpt-5.2"))]
        );
    }

    #[test]
    fn partial_file_keeps_defaults_for_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"base_delay_ms": 1000}"#).unwrap();

        let loaded = LlmSettings::load_from(&path);
        assert_eq!(loaded.base_delay_ms, 1_000);
        assert_eq!(loaded.max_cooldown_ms, 3_600_000);
    }

    #[test]
    fn malformed_entries_are_dropped_not_fatal() {
        let mut s = LlmSettings::default();
        s.default_model = "no-slash".to_string();
        s.aliases
            .insert("bad".to_string(), "also-no-slash".to_string());
        s.task_preferences
            .insert("not-a-task".to_string(), vec!["openai/gpt-5.2".to_string()]);

        assert_eq!(
            s.default_model_ref(),
            ModelRef::new("anthropic", "claude-sonnet-4")
        );
        assert!(s.alias_overrides().is_empty());
        assert!(s.preference_overrides().is_empty());
    }

    #[test]
    fn preference_overrides_parse() {
        let mut s = LlmSettings::default();
        s.task_preferences.insert(
            "refactoring".to_string(),
            vec![
                "deepseek/deepseek-chat".to_string(),
                "openai/gpt-5.3-codex".to_string(),
            ],
        );
        let overrides = s.preference_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].0, TaskType::Refactoring);
        assert_eq!(overrides[0].1.len(), 2);
    }

    #[test]
    fn profile_manager_registers_configured_credentials() {
        let mut s = LlmSettings::default();
        s.profiles.push(ProfileSettings {
            id: "ant-primary".to_string(),
            provider: "anthropic".to_string(),
            credential: SecretString::from("sk-ant-123".to_string()),
        });
        let manager = s.build_profile_manager();
        assert_eq!(manager.profile_count(), 1);
        assert!(manager.profile_status("ant-primary").unwrap().available);
    }
}
