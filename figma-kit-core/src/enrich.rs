//! Node enricher: raw Figma node tree in, simplified tree with resolved tokens out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::color::css_color;
use crate::error::Result;
use crate::model::{
    count_enriched_nodes, EnrichedFill, EnrichedNode, EnrichedStyles, Layout, RawNode,
    TextFacts, TEXT,
};
use crate::tokens::VariableLookup;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComponentInfo {
    pub name: String,
    pub description: Option<String>,
    pub key: Option<String>,
}

/// Component id to component metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ComponentTable {
    entries: BTreeMap<String, ComponentInfo>,
}

fn component_info(record: &Value) -> Option<ComponentInfo> {
    let name = record.get("name")?.as_str()?.to_string();
    Some(ComponentInfo {
        name,
        description: record
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        key: record.get("key").and_then(Value::as_str).map(str::to_string),
    })
}

impl ComponentTable {
    /// Reads the `components` maps embedded in a `GET /files/:key/nodes` response.
    pub fn from_nodes_response(response: &Value) -> Self {
        let mut table = ComponentTable::default();
        let wrappers = response
            .get("nodes")
            .and_then(Value::as_object)
            .into_iter()
            .flat_map(|nodes| nodes.values());
        for wrapper in wrappers {
            let Some(components) = wrapper.get("components").and_then(Value::as_object) else {
                continue;
            };
            for (id, record) in components {
                if let Some(info) = component_info(record) {
                    table.entries.insert(id.clone(), info);
                }
            }
        }
        table
    }

    /// Reads `meta.components` of `GET /files/:key/components`, keyed by `node_id`.
    pub fn from_published(response: &Value) -> Self {
        let mut table = ComponentTable::default();
        let records = response
            .pointer("/meta/components")
            .and_then(Value::as_array)
            .into_iter()
            .flatten();
        for record in records {
            let Some(node_id) = record.get("node_id").and_then(Value::as_str) else {
                continue;
            };
            if let Some(info) = component_info(record) {
                table.entries.insert(node_id.to_string(), info);
            }
        }
        table
    }

    /// Entries of `other` win on conflicting ids.
    pub fn merge(mut self, other: ComponentTable) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn insert(&mut self, id: impl Into<String>, info: ComponentInfo) {
        self.entries.insert(id.into(), info);
    }

    pub fn get(&self, id: &str) -> Option<&ComponentInfo> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct NodeEnricher<'a> {
    variables: &'a VariableLookup,
    components: &'a ComponentTable,
}

struct Frame<'r> {
    raw: &'r RawNode,
    node: EnrichedNode,
    next_child: usize,
}

impl<'a> NodeEnricher<'a> {
    pub fn new(variables: &'a VariableLookup, components: &'a ComponentTable) -> Self {
        Self {
            variables,
            components,
        }
    }

    /// Enriches `root` and its whole subtree, pre-order, preserving child order.
    ///
    /// Walks with an explicit stack so tree depth is bounded by the heap, not the call stack.
    pub fn enrich(&self, root: &RawNode) -> EnrichedNode {
        let mut stack = vec![Frame {
            raw: root,
            node: self.enrich_shallow(root),
            next_child: 0,
        }];
        let mut finished = None;

        while let Some(frame) = stack.last_mut() {
            let raw = frame.raw;
            if let Some(child) = raw.children.get(frame.next_child) {
                frame.next_child += 1;
                let node = self.enrich_shallow(child);
                stack.push(Frame {
                    raw: child,
                    node,
                    next_child: 0,
                });
                continue;
            }

            let Some(done) = stack.pop() else { break };
            match stack.last_mut() {
                Some(parent) => parent.node.children.push(done.node),
                None => finished = Some(done.node),
            }
        }

        let enriched = finished.unwrap_or_default();
        info!(
            root_id = enriched.id.as_deref().unwrap_or(""),
            nodes = count_enriched_nodes(&enriched),
            tokens = self.variables.token_count(),
            components = self.components.len(),
            "Enriched node tree"
        );
        enriched
    }

    /// Everything except children.
    fn enrich_shallow(&self, raw: &RawNode) -> EnrichedNode {
        let mut bound_variables = BTreeMap::new();
        for (property, binding) in &raw.bound_variables {
            if !binding.is_object() {
                debug!(property = %property, "Skipping non-object variable binding");
                continue;
            }
            if let Some(resolved) = self.variables.resolve(binding) {
                bound_variables.insert(property.clone(), resolved);
            }
        }

        let fills = (!raw.fills.is_empty()).then(|| {
            raw.fills
                .iter()
                .filter(|paint| paint.is_visible())
                .map(|paint| EnrichedFill {
                    paint_type: paint.paint_type.clone(),
                    opacity: paint.opacity.clone().unwrap_or_else(|| Number::from(1)),
                    color: paint.color.as_ref().map(css_color),
                })
                .collect()
        });

        let text = raw.is_type(TEXT).then(|| {
            let style = raw.style.clone().unwrap_or_default();
            TextFacts {
                characters: raw.characters.clone(),
                font_family: style.font_family,
                font_weight: style.font_weight,
                font_size: style.font_size,
                text_align: style.text_align_horizontal,
                line_height: style.line_height_px,
            }
        });

        let component = raw
            .component_id
            .as_deref()
            .and_then(|id| self.components.get(id));

        EnrichedNode {
            id: raw.id.clone(),
            name: raw.name.clone(),
            node_type: raw.node_type.clone(),
            layout: Layout::from(raw.absolute_bounding_box.as_ref()),
            styles: EnrichedStyles { fills, text },
            bound_variables,
            component_name: component.map(|c| c.name.clone()),
            component_description: component.and_then(|c| c.description.clone()),
            children: Vec::with_capacity(raw.children.len()),
        }
    }
}

/// Enriches every `document` of a `GET /files/:key/nodes` response into
/// `{nodes: {id: enriched}}`, keeping the response's id order.
///
/// Components embedded in the response are merged over `components`. Entries without a
/// usable document are skipped.
pub fn enrich_nodes_response(
    response: &Value,
    variables: &VariableLookup,
    components: &ComponentTable,
) -> Result<Value> {
    let components = components
        .clone()
        .merge(ComponentTable::from_nodes_response(response));
    let enricher = NodeEnricher::new(variables, &components);

    let mut enriched = Map::new();
    let wrappers = response
        .get("nodes")
        .and_then(Value::as_object)
        .into_iter()
        .flatten();
    for (id, wrapper) in wrappers {
        let Some(document) = wrapper.get("document") else {
            warn!(node_id = %id, "Node missing from response, skipping");
            continue;
        };
        match RawNode::deserialize(serde_stacker::Deserializer::new(document)) {
            Ok(raw) => {
                enriched.insert(id.clone(), serde_json::to_value(enricher.enrich(&raw))?);
            }
            Err(e) => warn!(node_id = %id, error = %e, "Unreadable node document, skipping"),
        }
    }

    let mut out = Map::new();
    out.insert("nodes".to_string(), Value::Object(enriched));
    Ok(Value::Object(out))
}
