//! Design token extractor ("x-ray scan"): usage-counted colors and typography signatures
//! over a flat list of nodes. Works on raw API nodes and on enriched nodes alike.

use serde::Serialize;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::color::{css_to_hex_rgb, hex_rgb};
use crate::error::{FigmaError, Result};
use crate::model::{parse_json, Color, SOLID, TEXT};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColorToken {
    pub hex: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypographyToken {
    pub font_family: Option<String>,
    pub font_size: Option<Number>,
    pub font_weight: Option<Number>,
    pub line_height: Option<Number>,
    pub letter_spacing: Option<Number>,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DesignTokens {
    pub colors: Vec<ColorToken>,
    pub typography: Vec<TypographyToken>,
}

/// Accumulates counts in first-seen order; [`finish`](Self::finish) sorts by usage.
#[derive(Debug, Default)]
pub struct DesignTokenExtractor {
    colors: Vec<ColorToken>,
    color_index: HashMap<String, usize>,
    typography: Vec<TypographyToken>,
    typography_index: HashMap<String, usize>,
}

static NULL: Value = Value::Null;

fn number(value: Option<&Value>) -> Option<Number> {
    match value {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    }
}

fn key_part(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "null".to_string(),
    }
}

impl DesignTokenExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scan(&mut self, node: &Value) {
        for key in ["fills", "strokes"] {
            let paints = node.get(key).and_then(Value::as_array).into_iter().flatten();
            for paint in paints {
                if paint.get("type").and_then(Value::as_str) != Some(SOLID) {
                    continue;
                }
                if paint.get("visible").and_then(Value::as_bool) == Some(false) {
                    continue;
                }
                let color = paint
                    .get("color")
                    .and_then(|c| serde_json::from_value::<Color>(c.clone()).ok());
                if let Some(color) = color {
                    self.count_color(hex_rgb(&color));
                }
            }
        }

        // Enriched nodes carry pre-rendered color strings under `styles.fills`.
        let enriched_fills = node
            .pointer("/styles/fills")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for fill in enriched_fills {
            if fill.get("type").and_then(Value::as_str) != Some(SOLID) {
                continue;
            }
            if let Some(hex) = fill
                .get("color")
                .and_then(Value::as_str)
                .and_then(css_to_hex_rgb)
            {
                self.count_color(hex);
            }
        }

        if node.get("type").and_then(Value::as_str) == Some(TEXT) {
            self.count_typography(node);
        }
    }

    fn count_color(&mut self, hex: String) {
        match self.color_index.get(&hex) {
            Some(&i) => self.colors[i].count += 1,
            None => {
                self.color_index.insert(hex.clone(), self.colors.len());
                self.colors.push(ColorToken { hex, count: 1 });
            }
        }
    }

    fn count_typography(&mut self, node: &Value) {
        let (style, line_height_key) = match node.get("style").filter(|s| s.is_object()) {
            Some(style) => (style, "lineHeightPx"),
            None => match node.pointer("/styles/text").filter(|s| s.is_object()) {
                Some(style) => (style, "lineHeight"),
                None => (&NULL, "lineHeightPx"),
            },
        };

        let family = style.get("fontFamily");
        let size = style.get("fontSize");
        let weight = style.get("fontWeight");
        let key = format!(
            "{}-{}-{}",
            key_part(family),
            key_part(size),
            key_part(weight)
        );

        let index = match self.typography_index.get(&key) {
            Some(&i) => i,
            None => {
                self.typography_index.insert(key, self.typography.len());
                self.typography.push(TypographyToken {
                    font_family: family.and_then(Value::as_str).map(str::to_string),
                    font_size: number(size),
                    font_weight: number(weight),
                    line_height: number(style.get(line_height_key)),
                    letter_spacing: number(style.get("letterSpacing")),
                    count: 0,
                });
                self.typography.len() - 1
            }
        };
        self.typography[index].count += 1;
    }

    /// Both palettes sorted by descending usage; ties keep first-seen order.
    pub fn finish(self) -> DesignTokens {
        let mut colors = self.colors;
        let mut typography = self.typography;
        colors.sort_by(|a, b| b.count.cmp(&a.count));
        typography.sort_by(|a, b| b.count.cmp(&a.count));
        DesignTokens { colors, typography }
    }
}

pub fn extract(nodes: &[&Value]) -> DesignTokens {
    let mut extractor = DesignTokenExtractor::new();
    for node in nodes {
        extractor.scan(node);
    }
    extractor.finish()
}

/// Finds the root nodes of whatever JSON document the other commands produced.
///
/// Accepts a nodes response (raw `{nodes: {id: {document}}}` or enriched
/// `{nodes: {id: node}}`), a file response (`{document}`), a bare node or a list of nodes.
/// Only objects count as roots: ids the API could not find come back as `null`.
pub fn normalize_roots(data: &Value) -> Vec<&Value> {
    let roots: Vec<&Value> = match data {
        Value::Object(obj) => {
            if let Some(nodes) = obj.get("nodes").and_then(Value::as_object) {
                nodes
                    .values()
                    .map(|wrapper| wrapper.get("document").unwrap_or(wrapper))
                    .collect()
            } else if let Some(document) = obj.get("document") {
                vec![document]
            } else {
                vec![data]
            }
        }
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    };
    roots.into_iter().filter(|root| root.is_object()).collect()
}

/// Pre-order flattening of every subtree in `roots`.
pub fn flatten_nodes<'v>(roots: &[&'v Value]) -> Vec<&'v Value> {
    let mut flat = Vec::new();
    let mut stack: Vec<&Value> = roots.iter().rev().copied().collect();
    while let Some(node) = stack.pop() {
        flat.push(node);
        if let Some(children) = node.get("children").and_then(Value::as_array) {
            stack.extend(children.iter().rev());
        }
    }
    flat
}

/// Reads a previously saved JSON document and extracts its design tokens.
pub fn extract_tokens_from_file(path: &Path) -> Result<DesignTokens> {
    if !path.exists() {
        return Err(FigmaError::MissingInput(path.to_path_buf()));
    }
    let data: Value = parse_json(&fs::read_to_string(path)?)?;
    let roots = normalize_roots(&data);
    let nodes = flatten_nodes(&roots);
    info!(path = %path.display(), nodes = nodes.len(), "Analyzing nodes for design tokens");

    let tokens = extract(&nodes);
    info!(
        colors = tokens.colors.len(),
        typography = tokens.typography.len(),
        "Extracted design tokens"
    );
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(name: &str, family: &str, size: u32, weight: u32) -> Value {
        json!({
            "name": name,
            "type": "TEXT",
            "style": {"fontFamily": family, "fontSize": size, "fontWeight": weight, "lineHeightPx": 20}
        })
    }

    #[test]
    fn end_to_end_single_text_node() {
        let root = json!({
            "name": "Root",
            "type": "FRAME",
            "children": [{
                "name": "T1",
                "type": "TEXT",
                "style": {"fontFamily": "Inter", "fontSize": 14, "fontWeight": 400},
                "characters": "Hi"
            }]
        });
        let roots = normalize_roots(&root);
        let tokens = extract(&flatten_nodes(&roots));

        assert_eq!(
            serde_json::to_value(&tokens).unwrap(),
            json!({
                "colors": [],
                "typography": [{
                    "fontFamily": "Inter",
                    "fontSize": 14,
                    "fontWeight": 400,
                    "lineHeight": null,
                    "letterSpacing": null,
                    "count": 1
                }]
            })
        );
    }

    #[test]
    fn identical_signatures_share_one_counter() {
        let nodes = [
            text("a", "Inter", 16, 500),
            text("b", "Inter", 16, 500),
            text("c", "Inter", 16, 500),
            text("d", "Roboto", 12, 400),
        ];
        let refs: Vec<&Value> = nodes.iter().collect();
        let tokens = extract(&refs);

        assert_eq!(tokens.typography.len(), 2);
        assert_eq!(tokens.typography[0].font_family.as_deref(), Some("Inter"));
        assert_eq!(tokens.typography[0].count, 3);
        assert_eq!(tokens.typography[0].line_height, Some(Number::from(20)));
        assert_eq!(tokens.typography[1].count, 1);
    }

    #[test]
    fn colors_are_counted_across_fills_and_strokes_without_alpha() {
        let nodes = [
            json!({"type": "RECTANGLE",
                "fills": [{"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0, "a": 0.3}}],
                "strokes": [{"type": "SOLID", "color": {"r": 0, "g": 0, "b": 0, "a": 1}}]}),
            json!({"type": "RECTANGLE",
                "fills": [
                    {"type": "SOLID", "color": {"r": 1, "g": 0, "b": 0, "a": 1}},
                    {"type": "SOLID", "visible": false, "color": {"r": 0, "g": 1, "b": 0, "a": 1}},
                    {"type": "GRADIENT_LINEAR"}
                ]}),
            json!({"type": "FRAME", "styles": {"fills": [{"type": "SOLID", "opacity": 1, "color": "rgba(255, 0, 0, 0.50)"}]}}),
        ];
        let refs: Vec<&Value> = nodes.iter().collect();
        let tokens = extract(&refs);

        assert_eq!(
            tokens.colors,
            vec![
                ColorToken { hex: "#ff0000".into(), count: 3 },
                ColorToken { hex: "#000000".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let nodes = [
            text("a", "Mono", 10, 400),
            text("b", "Serif", 10, 400),
            text("c", "Sans", 10, 400),
        ];
        let refs: Vec<&Value> = nodes.iter().collect();
        let families: Vec<_> = extract(&refs)
            .typography
            .into_iter()
            .map(|t| t.font_family.unwrap())
            .collect();
        assert_eq!(families, ["Mono", "Serif", "Sans"]);
    }

    #[test]
    fn normalizes_every_supported_document_shape() {
        let raw_nodes = json!({"nodes": {"1:2": {"document": {"id": "1:2"}}}});
        assert_eq!(normalize_roots(&raw_nodes)[0]["id"], "1:2");

        let enriched_nodes = json!({"nodes": {"1:2": {"id": "1:2", "children": []}}});
        assert_eq!(normalize_roots(&enriched_nodes)[0]["id"], "1:2");

        let file = json!({"document": {"id": "0:0"}});
        assert_eq!(normalize_roots(&file)[0]["id"], "0:0");

        let list = json!([{"id": "a"}, {"id": "b"}]);
        assert_eq!(normalize_roots(&list).len(), 2);
    }

    #[test]
    fn unknown_node_ids_are_not_roots() {
        let nodes = json!({"nodes": {
            "9:9": null,
            "1:2": {"document": {"id": "1:2", "name": "Card"}}
        }});
        let roots = normalize_roots(&nodes);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0]["name"], "Card");

        assert!(normalize_roots(&json!({"nodes": {"9:9": null}})).is_empty());
        assert!(normalize_roots(&json!([null, 1, "x"])).is_empty());
    }

    #[test]
    fn flattening_is_pre_order() {
        let tree = json!({"id": "0", "children": [
            {"id": "1", "children": [{"id": "1.1"}]},
            {"id": "2"}
        ]});
        let ids: Vec<_> = flatten_nodes(&[&tree])
            .into_iter()
            .map(|n| n["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["0", "1", "1.1", "2"]);
    }

    #[test]
    fn missing_input_file_is_reported() {
        let err = extract_tokens_from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, FigmaError::MissingInput(_)));
    }
}
