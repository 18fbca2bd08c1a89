//! Friendly-name resolution.
//!
//! Callers hand the core a model hint in one of three shapes: an explicit
//! (provider, model) reference, a friendly alias ("fast", "best", "claude"),
//! or a `"provider/model"` string. `ModelSpec` makes the three shapes a sum
//! type so resolution is one exhaustive match instead of ad hoc string
//! probing. Resolution is total: anything unresolvable degrades to the
//! configured default model.

use std::collections::HashMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::models::ModelRef;

/// A caller-supplied model hint, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSpec {
    /// A concrete reference, already split into provider and model.
    Explicit(ModelRef),
    /// A `"provider/model"` string, split on the first `/` at resolve time.
    ProviderSlashModel(String),
    /// A friendly alias, matched case-insensitively against the alias table.
    Alias(String),
}

impl ModelSpec {
    /// Classify a raw string: slash-containing input is a provider/model
    /// path, anything else is treated as an alias.
    pub fn parse(input: &str) -> Self {
        if input.contains('/') {
            ModelSpec::ProviderSlashModel(input.to_string())
        } else {
            ModelSpec::Alias(input.to_string())
        }
    }
}

impl From<ModelRef> for ModelSpec {
    fn from(reference: ModelRef) -> Self {
        ModelSpec::Explicit(reference)
    }
}

impl From<&str> for ModelSpec {
    fn from(input: &str) -> Self {
        ModelSpec::parse(input)
    }
}

// Configuration carries model hints as plain strings; an explicit
// reference serializes as a {provider, model} map. Hand-rolled because an
// untagged derive would swallow every string as ProviderSlashModel.
impl Serialize for ModelSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ModelSpec::Explicit(reference) => reference.serialize(serializer),
            ModelSpec::ProviderSlashModel(s) | ModelSpec::Alias(s) => {
                serializer.serialize_str(s)
            }
        }
    }
}

impl<'de> Deserialize<'de> for ModelSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::String(s) => Ok(ModelSpec::parse(&s)),
            other => {
                let reference: ModelRef =
                    serde_json::from_value(other).map_err(D::Error::custom)?;
                Ok(ModelSpec::Explicit(reference))
            }
        }
    }
}

/// Maps friendly names to concrete model references.
#[derive(Debug, Clone)]
pub struct AliasResolver {
    aliases: HashMap<String, ModelRef>,
    default_model: ModelRef,
}

impl AliasResolver {
    /// Create a resolver with the builtin alias table and the given default.
    pub fn new(default_model: ModelRef) -> Self {
        Self {
            aliases: builtin_aliases(),
            default_model,
        }
    }

    /// Overlay additional aliases (configuration wins over builtins).
    pub fn with_aliases<I>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (String, ModelRef)>,
    {
        for (alias, target) in extra {
            self.aliases.insert(alias.to_lowercase(), target);
        }
        self
    }

    /// Look up an alias, case-insensitively.
    pub fn resolve_alias(&self, name: &str) -> Option<ModelRef> {
        self.aliases.get(&name.to_lowercase()).cloned()
    }

    /// Resolve any model hint to a concrete reference.
    ///
    /// Never fails: an unknown alias or malformed string resolves to the
    /// configured default so a best-effort hint never blocks execution.
    pub fn resolve(&self, spec: &ModelSpec) -> ModelRef {
        match spec {
            ModelSpec::Explicit(reference) => reference.clone(),
            ModelSpec::ProviderSlashModel(s) => match ModelRef::parse(s) {
                Some(reference) => reference,
                None => {
                    tracing::debug!(input = %s, "malformed provider/model string, using default");
                    self.default_model.clone()
                }
            },
            ModelSpec::Alias(name) => match self.resolve_alias(name) {
                Some(reference) => reference,
                None => {
                    tracing::debug!(alias = %name, "unknown model alias, using default");
                    self.default_model.clone()
                }
            },
        }
    }

    pub fn default_model(&self) -> &ModelRef {
        &self.default_model
    }
}

fn builtin_aliases() -> HashMap<String, ModelRef> {
    let table = [
        ("fast", ModelRef::new("google", "gemini-2.5-flash")),
        ("cheap", ModelRef::new("openai", "gpt-5-mini")),
        ("best", ModelRef::new("anthropic", "claude-opus-4.6")),
        ("balanced", ModelRef::new("anthropic", "claude-sonnet-4")),
        ("claude", ModelRef::new("anthropic", "claude-sonnet-4")),
        ("gpt", ModelRef::new("openai", "gpt-5.2")),
        ("gemini", ModelRef::new("google", "gemini-2.5-pro")),
        ("code", ModelRef::new("openai", "gpt-5.3-codex")),
        ("reasoning", ModelRef::new("deepseek", "deepseek-reasoner")),
        ("local", ModelRef::new("ollama", "qwen3-coder:30b")),
    ];
    table
        .into_iter()
        .map(|(alias, target)| (alias.to_string(), target))
        .collect()
}
