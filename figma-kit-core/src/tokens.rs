//! Token resolver: turns the local variables payload into a lookup table from variable id
//! to a display name and a literal value for the collection's default mode.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::model::TokenBinding;

const WEB_SYNTAX: &str = "WEB";
const VARIABLE_ALIAS: &str = "VARIABLE_ALIAS";

/// Body of `GET /v1/files/:key/variables/local`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocalVariablesResponse {
    #[serde(default)]
    pub meta: VariablesMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariablesMeta {
    #[serde(default)]
    pub variables: BTreeMap<String, Variable>,
    #[serde(default)]
    pub variable_collections: BTreeMap<String, VariableCollection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variable_collection_id: Option<String>,
    #[serde(default)]
    pub values_by_mode: Map<String, Value>,
    #[serde(default)]
    pub code_syntax: BTreeMap<String, String>,
    #[serde(default)]
    pub resolved_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableCollection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_mode_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenEntry {
    pub name: String,
    pub original_name: String,
    pub value: Option<Value>,
    #[serde(rename = "type")]
    pub token_type: Option<String>,
}

/// Variable id to token. Built once per invocation and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TokenTable {
    entries: BTreeMap<String, TokenEntry>,
}

/// Returns the target id when `value` is a `{type: VARIABLE_ALIAS, id}` reference.
fn alias_target(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;
    if obj.get("type").and_then(Value::as_str) != Some(VARIABLE_ALIAS) {
        return None;
    }
    obj.get("id").and_then(Value::as_str)
}

impl TokenTable {
    pub fn from_response(response: &LocalVariablesResponse) -> Self {
        let meta = &response.meta;
        let default_value = |variable: &Variable| -> Option<Value> {
            let collection = variable
                .variable_collection_id
                .as_ref()
                .and_then(|id| meta.variable_collections.get(id))?;
            let mode = collection.default_mode_id.as_ref()?;
            variable.values_by_mode.get(mode).cloned()
        };

        let mut entries = BTreeMap::new();
        for (id, variable) in &meta.variables {
            let value = match default_value(variable) {
                // Follow one alias hop; a chain of aliases stays unresolved.
                Some(raw) => match alias_target(&raw) {
                    Some(target_id) => meta
                        .variables
                        .get(target_id)
                        .and_then(|target| default_value(target))
                        .filter(|literal| alias_target(literal).is_none()),
                    None => Some(raw),
                },
                None => {
                    debug!(variable_id = %id, "No value for the default mode");
                    None
                }
            };

            let name = variable
                .code_syntax
                .get(WEB_SYNTAX)
                .cloned()
                .unwrap_or_else(|| variable.name.clone());

            entries.insert(
                id.clone(),
                TokenEntry {
                    name,
                    original_name: variable.name.clone(),
                    value,
                    token_type: variable.resolved_type.clone(),
                },
            );
        }

        info!(tokens = entries.len(), "Built token table from local variables");
        TokenTable { entries }
    }

    /// Parses a raw variables payload; an unparseable payload yields an empty table.
    pub fn from_value(payload: &Value) -> Self {
        let response = LocalVariablesResponse::deserialize(payload).unwrap_or_default();
        Self::from_response(&response)
    }

    pub fn get(&self, variable_id: &str) -> Option<&TokenEntry> {
        self.entries.get(variable_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves a single `{type, id}` binding. Arrays of bindings are not resolved.
    pub fn resolve(&self, binding: &Value) -> Option<TokenBinding> {
        let id = binding.as_object()?.get("id")?.as_str()?;
        let entry = self.entries.get(id)?;
        Some(TokenBinding {
            token_name: entry.name.clone(),
            value: entry.value.clone().unwrap_or(Value::Null),
        })
    }
}

/// Outcome of the best-effort variables fetch that precedes enrichment.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableLookup {
    Available(TokenTable),
    Unavailable { reason: String },
}

impl VariableLookup {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        VariableLookup::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn resolve(&self, binding: &Value) -> Option<TokenBinding> {
        match self {
            VariableLookup::Available(table) => table.resolve(binding),
            VariableLookup::Unavailable { .. } => None,
        }
    }

    pub fn token_count(&self) -> usize {
        match self {
            VariableLookup::Available(table) => table.len(),
            VariableLookup::Unavailable { .. } => 0,
        }
    }
}

impl Default for VariableLookup {
    fn default() -> Self {
        VariableLookup::unavailable("no variables fetched")
    }
}
