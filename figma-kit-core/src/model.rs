//! Node shapes: the raw tree as the Figma API returns it, and the enriched tree we emit.
//!
//! Raw nodes are deserialized leniently. A present but malformed optional attribute
//! (say, `fills` given as a string) is treated as absent instead of failing the whole
//! document, and unknown attributes are kept in `extra` so a raw node survives a round
//! trip through this model.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

pub const TEXT: &str = "TEXT";
pub const INSTANCE: &str = "INSTANCE";
pub const SOLID: &str = "SOLID";

/// Parses JSON text of any nesting depth, growing the stack on demand.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Deserialize through `Value` and fall back to the default on a shape mismatch.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Like [`lenient`] but element-wise, so one bad child never drops its siblings.
fn lenient_children<'de, D>(deserializer: D) -> Result<Vec<RawNode>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| {
                RawNode::deserialize(serde_stacker::Deserializer::new(item)).unwrap_or_default()
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNode {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub node_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub absolute_bounding_box: Option<BoundingBox>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Vec::is_empty")]
    pub fills: Vec<Paint>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Vec::is_empty")]
    pub strokes: Vec<Paint>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub style: Option<TypeStyle>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
    /// Property name to binding. A binding is a single `{type, id}` alias or an array of them.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Map::is_empty")]
    pub bound_variables: Map<String, Value>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_children",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<RawNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawNode {
    pub fn is_type(&self, node_type: &str) -> bool {
        self.node_type.as_deref() == Some(node_type)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    #[serde(default, deserialize_with = "lenient")]
    pub x: Option<Number>,
    #[serde(default, deserialize_with = "lenient")]
    pub y: Option<Number>,
    #[serde(default, deserialize_with = "lenient")]
    pub width: Option<Number>,
    #[serde(default, deserialize_with = "lenient")]
    pub height: Option<Number>,
}

/// One entry of `fills` or `strokes`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Paint {
    #[serde(
        rename = "type",
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub paint_type: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub opacity: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Paint {
    /// Hidden only when explicitly flagged `visible: false`.
    pub fn is_visible(&self) -> bool {
        self.visible != Some(false)
    }
}

fn opaque() -> f64 {
    1.0
}

/// RGBA with every channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    #[serde(default)]
    pub r: f64,
    #[serde(default)]
    pub g: f64,
    #[serde(default)]
    pub b: f64,
    #[serde(default = "opaque")]
    pub a: f64,
}

impl Default for Color {
    fn default() -> Self {
        Color {
            r: 0.0,
            g: 0.0,
            b: 0.0,
            a: opaque(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeStyle {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub font_size: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub line_height_px: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<Number>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text_align_horizontal: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Simplified node produced by [`crate::enrich::NodeEnricher`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedNode {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub layout: Layout,
    pub styles: EnrichedStyles,
    #[serde(default)]
    pub bound_variables: BTreeMap<String, TokenBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_description: Option<String>,
    #[serde(default)]
    pub children: Vec<EnrichedNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub x: Option<Number>,
    pub y: Option<Number>,
    pub width: Option<Number>,
    pub height: Option<Number>,
}

impl From<Option<&BoundingBox>> for Layout {
    fn from(bbox: Option<&BoundingBox>) -> Self {
        match bbox {
            Some(b) => Layout {
                x: b.x.clone(),
                y: b.y.clone(),
                width: b.width.clone(),
                height: b.height.clone(),
            },
            None => Layout::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedStyles {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fills: Option<Vec<EnrichedFill>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextFacts>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedFill {
    #[serde(rename = "type")]
    pub paint_type: Option<String>,
    pub opacity: Number,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextFacts {
    pub characters: Option<String>,
    pub font_family: Option<String>,
    pub font_weight: Option<Number>,
    pub font_size: Option<Number>,
    pub text_align: Option<String>,
    pub line_height: Option<Number>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBinding {
    pub token_name: String,
    pub value: Value,
}

/// Number of nodes in a subtree, root included.
pub fn count_raw_nodes(root: &RawNode) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

pub fn count_enriched_nodes(root: &EnrichedNode) -> usize {
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        count += 1;
        stack.extend(node.children.iter());
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_optional_fields_are_treated_as_absent() {
        let node: RawNode = serde_json::from_value(json!({
            "id": "1:1",
            "name": "Broken",
            "type": "FRAME",
            "fills": "not-a-list",
            "absoluteBoundingBox": 12,
            "children": [{"id": "1:2", "type": "TEXT"}, "garbage"]
        }))
        .unwrap();

        assert!(node.fills.is_empty());
        assert!(node.absolute_bounding_box.is_none());
        assert_eq!(node.children.len(), 2);
        assert_eq!(node.children[1], RawNode::default());
    }

    #[test]
    fn unknown_attributes_survive_a_round_trip() {
        let input = json!({
            "id": "1:1",
            "name": "Card",
            "type": "FRAME",
            "cornerRadius": 8,
            "fills": [{"type": "SOLID", "color": {"r": 1.0, "g": 0.5, "b": 0.25, "a": 1.0}, "blendMode": "NORMAL"}]
        });
        let node: RawNode = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&node).unwrap(), input);
    }

    #[test]
    fn counts_every_node() {
        let node: RawNode = serde_json::from_value(json!({
            "id": "0",
            "children": [{"id": "1", "children": [{"id": "2"}, {"id": "3"}]}, {"id": "4"}]
        }))
        .unwrap();
        assert_eq!(count_raw_nodes(&node), 5);
    }
}
