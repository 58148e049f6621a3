//! Serialized key-mapping input.
//!
//! These are the raw shapes deserialized from RON. Descriptors stay as text
//! here; [`crate::AppRegistry`] parses and validates them.

use serde::{Deserialize, Serialize};

/// Complete mapping input: global bindings plus per-app bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    /// Bindings active for every app.
    #[serde(default)]
    pub global: Vec<BindingSpec>,
    /// Per-application bindings, in priority order.
    #[serde(default)]
    pub apps: Vec<AppSpec>,
    /// Extra edges joining existing chord paths.
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

/// One configured application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppSpec {
    /// Application name as reported by the app-identity provider.
    pub name: String,
    /// Fixed numeric id; assigned automatically when absent.
    #[serde(default)]
    pub id: Option<u32>,
    /// Bindings for this app, first match wins.
    #[serde(default)]
    pub bindings: Vec<BindingSpec>,
}

/// A hotkey (one key) or chord (several keys) and its action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingSpec {
    /// Keystroke descriptors, e.g. `["ctrl+g", "g"]`.
    pub keys: Vec<String>,
    /// What to do when the sequence completes.
    pub action: ActionSpec,
    /// Optional description.
    #[serde(default)]
    pub desc: String,
}

/// Action attached to a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSpec {
    /// Relay these key descriptors to the focused app.
    Send(Vec<String>),
    /// An opaque named action handled by whoever consumes dispatches.
    Named(String),
}

/// An explicit edge `from --key--> to` between two existing chord paths.
///
/// Lets a continuation reuse a node reached by another path, e.g. making
/// `ctrl+x, ctrl+x` lead back into the `ctrl+x` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    /// Owning app; global when absent.
    #[serde(default)]
    pub app: Option<String>,
    /// Path to the source node.
    pub from: Vec<String>,
    /// Key labelling the new edge.
    pub key: String,
    /// Path to the target node.
    pub to: Vec<String>,
}

impl BindingSpec {
    /// Convenience constructor for a named action.
    pub fn named(keys: &[&str], action: &str) -> Self {
        Self {
            keys: keys.iter().map(|k| (*k).to_string()).collect(),
            action: ActionSpec::Named(action.to_string()),
            desc: String::new(),
        }
    }
}
