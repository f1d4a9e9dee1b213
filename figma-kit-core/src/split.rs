//! Tree partitioner: breaks a large enriched node tree into files that each stay under a
//! line budget when pretty-printed, plus a handful of derived views (structure, texts,
//! instances, images, colors, summary) and a README describing the result.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::color::css_color;
use crate::error::{FigmaError, Result};
use crate::extract::normalize_roots;
use crate::model::{parse_json, Color, SOLID};

pub const DEFAULT_MAX_LINES: usize = 250;

/// Nodes deeper than this are collapsed to a stub in `01-structure.json`.
pub const STRUCTURE_MAX_DEPTH: usize = 3;

const UNNAMED: &str = "unnamed";

/// Line count of the 2-space pretty-printed JSON text of `value`.
pub fn estimate_lines(value: &Value) -> usize {
    serde_json::to_string_pretty(value)
        .map(|text| text.lines().count())
        .unwrap_or_default()
}

fn name_of(node: &Value) -> &str {
    node.get("name").and_then(Value::as_str).unwrap_or(UNNAMED)
}

fn id_of(node: &Value) -> &str {
    node.get("id").and_then(Value::as_str).unwrap_or_default()
}

fn children_of(node: &Value) -> &[Value] {
    node.get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn field(node: &Value, key: &str) -> Value {
    node.get(key).cloned().unwrap_or(Value::Null)
}

fn field_or_empty_object(node: &Value, key: &str) -> Value {
    node.get(key).cloned().unwrap_or_else(|| json!({}))
}

/// Synthetic node holding a contiguous run of `node`'s children.
///
/// Raw nodes have no `layout`, so their bounding box and fills are carried instead.
fn fragment(node: &Value, index: usize, children: Vec<Value>) -> (String, Value) {
    let name = format!("{}_part{index}", name_of(node));
    let mut value = Map::new();
    value.insert("id".into(), json!(format!("{}_part{index}", id_of(node))));
    value.insert("name".into(), json!(name));
    value.insert("type".into(), field(node, "type"));
    value.insert("layout".into(), field(node, "layout"));
    if node.get("layout").is_none() {
        for key in ["absoluteBoundingBox", "fills"] {
            if let Some(raw) = node.get(key) {
                value.insert(key.into(), raw.clone());
            }
        }
    }
    value.insert("styles".into(), field_or_empty_object(node, "styles"));
    value.insert(
        "boundVariables".into(),
        field_or_empty_object(node, "boundVariables"),
    );
    value.insert("children".into(), Value::Array(children));
    (name, Value::Object(value))
}

/// Lines a fragment of `node` costs before any child is added.
///
/// A fragment with children `c1..cn` pretty-prints to `shell + 1 + sum(lines(ci))` lines,
/// where `shell` is the fragment with an empty children array.
fn fragment_overhead(node: &Value) -> usize {
    let (_, shell) = fragment(node, 0, Vec::new());
    estimate_lines(&shell) + 1
}

/// Splits `node` into named pieces that each fit in `max_lines`.
///
/// A node that already fits, or that has no children, comes back as a single piece under
/// its own name. Otherwise its children are packed greedily, in order, into `_partN`
/// fragments. A child too large for any fragment is split recursively and its pieces are
/// emitted in place. Reading the leaves of all pieces in order gives back the leaves of
/// the input in order. A leaf that is itself over budget is emitted as-is.
pub fn split_node(node: &Value, max_lines: usize) -> Vec<(String, Value)> {
    let children = children_of(node);
    if children.is_empty() || estimate_lines(node) <= max_lines {
        return vec![(name_of(node).to_string(), node.clone())];
    }

    let overhead = fragment_overhead(node);
    let mut pieces = Vec::new();
    let mut chunk: Vec<Value> = Vec::new();
    let mut running = overhead;
    let mut index = 0;
    let mut spliced = false;

    for child in children {
        let child_lines = estimate_lines(child);
        if overhead + child_lines > max_lines {
            if !chunk.is_empty() {
                pieces.push(fragment(node, index, std::mem::take(&mut chunk)));
                index += 1;
                running = overhead;
            }
            debug!(node = %name_of(child), lines = child_lines, "Splitting oversized child");
            pieces.extend(split_node(child, max_lines));
            spliced = true;
        } else if running + child_lines > max_lines && !chunk.is_empty() {
            pieces.push(fragment(node, index, std::mem::take(&mut chunk)));
            index += 1;
            chunk.push(child.clone());
            running = overhead + child_lines;
        } else {
            chunk.push(child.clone());
            running += child_lines;
        }
    }

    if !chunk.is_empty() {
        if index == 0 && !spliced {
            pieces.push((name_of(node).to_string(), node.clone()));
        } else {
            pieces.push(fragment(node, index, chunk));
        }
    }
    pieces
}

/// Outline of the tree down to `max_depth`; deeper nodes become truncated stubs.
pub fn structure_tree(node: &Value, depth: usize, max_depth: usize) -> Value {
    let children = children_of(node);
    if depth > max_depth {
        return json!({
            "id": field(node, "id"),
            "name": field(node, "name"),
            "type": field(node, "type"),
            "children_count": children.len(),
            "truncated": true,
        });
    }

    let mut outline = Map::new();
    outline.insert("id".into(), field(node, "id"));
    outline.insert("name".into(), field(node, "name"));
    outline.insert("type".into(), field(node, "type"));
    outline.insert("layout".into(), field(node, "layout"));
    if !children.is_empty() {
        let nested = children
            .iter()
            .map(|child| structure_tree(child, depth + 1, max_depth))
            .collect();
        outline.insert("children".into(), Value::Array(nested));
        outline.insert("children_count".into(), json!(children.len()));
    }
    Value::Object(outline)
}

/// Pre-order walk yielding every node with its slash-separated name path.
fn walk_with_paths(root: &Value) -> Vec<(&Value, String)> {
    let mut visited = Vec::new();
    let mut stack = vec![(root, format!("/{}", name_of(root)))];
    while let Some((node, path)) = stack.pop() {
        for child in children_of(node).iter().rev() {
            stack.push((child, format!("{path}/{}", name_of(child))));
        }
        visited.push((node, path));
    }
    visited
}

fn is_image_like(node: &Value) -> bool {
    let node_type = node.get("type").and_then(Value::as_str).unwrap_or_default();
    matches!(node_type, "VECTOR" | "FRAME" | "GROUP")
        && name_of(node).to_lowercase().contains("image")
}

pub fn extract_texts(root: &Value) -> Vec<Value> {
    walk_with_paths(root)
        .into_iter()
        .filter(|(node, _)| node.get("type").and_then(Value::as_str) == Some("TEXT"))
        .map(|(node, path)| {
            let text = node.pointer("/styles/text").cloned().unwrap_or(Value::Null);
            let characters = text
                .get("characters")
                .or_else(|| node.get("characters"))
                .cloned()
                .unwrap_or(Value::Null);
            json!({
                "id": field(node, "id"),
                "name": field(node, "name"),
                "path": path,
                "layout": field(node, "layout"),
                "styles": text,
                "characters": characters,
            })
        })
        .collect()
}

pub fn extract_instances(root: &Value) -> Vec<Value> {
    walk_with_paths(root)
        .into_iter()
        .filter(|(node, _)| node.get("type").and_then(Value::as_str) == Some("INSTANCE"))
        .map(|(node, path)| {
            json!({
                "id": field(node, "id"),
                "name": field(node, "name"),
                "path": path,
                "layout": field(node, "layout"),
                "componentId": field(node, "componentId"),
                "componentName": field(node, "componentName"),
                "children_count": children_of(node).len(),
            })
        })
        .collect()
}

pub fn extract_images(root: &Value) -> Vec<Value> {
    walk_with_paths(root)
        .into_iter()
        .filter(|(node, _)| is_image_like(node))
        .map(|(node, path)| {
            json!({
                "id": field(node, "id"),
                "name": field(node, "name"),
                "type": field(node, "type"),
                "path": path,
                "layout": field(node, "layout"),
            })
        })
        .collect()
}

fn listed(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

/// CSS color of a visible SOLID fill, whether pre-rendered (enriched) or `{r, g, b, a}` (raw).
fn solid_fill_color(fill: &Value) -> Option<String> {
    if fill.get("type").and_then(Value::as_str) != Some(SOLID) {
        return None;
    }
    if fill.get("visible").and_then(Value::as_bool) == Some(false) {
        return None;
    }
    match fill.get("color")? {
        Value::String(css) => Some(css.clone()),
        raw @ Value::Object(_) => Color::deserialize(raw).ok().map(|c| css_color(&c)),
        _ => None,
    }
}

/// Usage count of every SOLID fill color in the tree, in first-seen order.
pub fn extract_colors(root: &Value) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (node, _) in walk_with_paths(root) {
        let mut fills = listed(node.pointer("/styles/fills"));
        fills.extend(listed(node.get("fills")));
        for color in fills.into_iter().filter_map(solid_fill_color) {
            match index.get(&color) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(color.clone(), counts.len());
                    counts.push((color, 1));
                }
            }
        }
    }
    counts
}

fn by_usage(colors: &[(String, usize)]) -> Vec<(String, usize)> {
    let mut sorted = colors.to_vec();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}

/// Aggregate statistics plus a listing of the top-level sections.
pub fn summarize(
    root: &Value,
    texts: &[Value],
    instances: &[Value],
    images: &[Value],
    colors: &[(String, usize)],
) -> Value {
    let nodes = walk_with_paths(root);
    let mut nodes_by_type = Map::new();
    for (node, _) in &nodes {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or("UNKNOWN");
        let count = nodes_by_type
            .get(node_type)
            .and_then(Value::as_u64)
            .unwrap_or(0);
        nodes_by_type.insert(node_type.to_string(), json!(count + 1));
    }

    let top_colors: Vec<Value> = by_usage(colors)
        .into_iter()
        .take(10)
        .map(|(color, count)| json!([color, count]))
        .collect();

    let sections: Vec<Value> = children_of(root)
        .iter()
        .map(|section| {
            json!({
                "name": field(section, "name"),
                "type": field(section, "type"),
                "children_count": children_of(section).len(),
            })
        })
        .collect();

    json!({
        "name": field(root, "name"),
        "id": field(root, "id"),
        "type": field(root, "type"),
        "layout": field(root, "layout"),
        "statistics": {
            "total_nodes": nodes.len(),
            "text_nodes": texts.len(),
            "component_instances": instances.len(),
            "images": images.len(),
            "unique_colors": colors.len(),
            "nodes_by_type": nodes_by_type,
        },
        "top_colors": top_colors,
        "sections": sections,
    })
}

/// File stem for a section: lowercase, with spaces, dashes and path separators as `_`.
fn section_stem(name: &str) -> String {
    let stem: String = name
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '/' | '\\' => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() || stem.chars().all(|c| c == '.') {
        UNNAMED.to_string()
    } else {
        stem
    }
}

/// Hands out section stems, suffixing `_2`, `_3`, ... on collision.
#[derive(Default)]
struct StemAllocator {
    used: HashSet<String>,
}

impl StemAllocator {
    fn allocate(&mut self, name: &str) -> String {
        let base = section_stem(name);
        let mut stem = base.clone();
        let mut n = 2;
        while !self.used.insert(stem.clone()) {
            stem = format!("{base}_{n}");
            n += 1;
        }
        stem
    }
}

/// What [`split_tree`] wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitReport {
    pub output_dir: PathBuf,
    /// File names relative to `output_dir`, in the order they were written.
    pub files: Vec<String>,
    pub section_files: usize,
}

fn write_json(dir: &Path, name: &str, value: &Value, report: &mut SplitReport) -> Result<()> {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string_pretty(value)?)?;
    debug!(path = %path.display(), "Wrote split file");
    report.files.push(name.to_string());
    Ok(())
}

fn readme(source: &str, summary: &Value, files: &[String], colors: &[(String, usize)]) -> String {
    let stats = &summary["statistics"];
    let stat = |key: &str| stats[key].as_u64().unwrap_or(0);
    let name = summary["name"].as_str().unwrap_or(UNNAMED);

    let mut out = format!("# {name} - Split Data\n\n");
    out.push_str(&format!("Source: `{source}`\n\n"));
    out.push_str("## Statistics\n\n");
    out.push_str(&format!("- Total nodes: {}\n", stat("total_nodes")));
    out.push_str(&format!("- Text nodes: {}\n", stat("text_nodes")));
    out.push_str(&format!("- Component instances: {}\n", stat("component_instances")));
    out.push_str(&format!("- Images: {}\n", stat("images")));
    out.push_str(&format!("- Unique colors: {}\n\n", stat("unique_colors")));

    out.push_str("## Files\n\n");
    for file in files {
        out.push_str(&format!("- `{file}`\n"));
    }

    out.push_str("\n## Recommended Reading Order\n\n");
    out.push_str("1. `00-summary.json` for the overview\n");
    out.push_str("2. `01-structure.json` for the hierarchy\n");
    out.push_str("3. `02-texts.json` for the copy\n");
    out.push_str("4. `sections/*.json` for section details\n");
    out.push_str("5. `99-full-tree.json` only when everything is needed\n");

    out.push_str("\n## Top Colors\n\n");
    for (color, count) in by_usage(colors).into_iter().take(5) {
        out.push_str(&format!("- `{color}`: {count} uses\n"));
    }
    out
}

/// Everything derived from one root, ready to be written to disk.
#[derive(Debug, Clone)]
pub struct SplitOutput<'a> {
    pub root: &'a Value,
    pub summary: Value,
    pub structure: Value,
    pub texts: Vec<Value>,
    pub instances: Vec<Value>,
    pub images: Vec<Value>,
    pub colors: Vec<(String, usize)>,
    /// `(file stem, piece)` per section file, stems already unique.
    pub sections: Vec<(String, Value)>,
}

impl<'a> SplitOutput<'a> {
    pub fn build(root: &'a Value, max_lines: usize) -> Self {
        let texts = extract_texts(root);
        let instances = extract_instances(root);
        let images = extract_images(root);
        let colors = extract_colors(root);
        let summary = summarize(root, &texts, &instances, &images, &colors);

        let mut stems = StemAllocator::default();
        let mut sections = Vec::new();
        for section in children_of(root) {
            let lines = estimate_lines(section);
            if lines > max_lines {
                warn!(section = %name_of(section), lines, max_lines, "Section over budget, splitting");
            }
            for (name, piece) in split_node(section, max_lines) {
                sections.push((stems.allocate(&name), piece));
            }
        }

        SplitOutput {
            root,
            summary,
            structure: structure_tree(root, 0, STRUCTURE_MAX_DEPTH),
            texts,
            instances,
            images,
            colors,
            sections,
        }
    }

    /// Writes all files into `dir`; `source` is only quoted in the README.
    pub fn write(&self, dir: &Path, source: &str) -> Result<SplitReport> {
        fs::create_dir_all(dir.join("sections"))?;
        let mut report = SplitReport {
            output_dir: dir.to_path_buf(),
            files: Vec::new(),
            section_files: 0,
        };

        write_json(dir, "00-summary.json", &self.summary, &mut report)?;
        write_json(dir, "01-structure.json", &self.structure, &mut report)?;

        if !self.texts.is_empty() {
            let doc = json!({"texts": self.texts, "count": self.texts.len()});
            write_json(dir, "02-texts.json", &doc, &mut report)?;
        }
        if !self.instances.is_empty() {
            let doc = json!({"instances": self.instances, "count": self.instances.len()});
            write_json(dir, "03-instances.json", &doc, &mut report)?;
        }
        if !self.images.is_empty() {
            let doc = json!({"images": self.images, "count": self.images.len()});
            write_json(dir, "04-images.json", &doc, &mut report)?;
        }
        if !self.colors.is_empty() {
            let palette: Vec<Value> = by_usage(&self.colors)
                .into_iter()
                .map(|(color, usage_count)| json!({"color": color, "usage_count": usage_count}))
                .collect();
            let doc = json!({"colors": palette, "total_unique": self.colors.len()});
            write_json(dir, "05-colors.json", &doc, &mut report)?;
        }

        for (stem, piece) in &self.sections {
            write_json(dir, &format!("sections/{stem}.json"), piece, &mut report)?;
            report.section_files += 1;
        }

        write_json(dir, "99-full-tree.json", self.root, &mut report)?;

        fs::write(
            dir.join("README.md"),
            readme(source, &self.summary, &report.files, &self.colors),
        )?;
        report.files.push("README.md".to_string());

        info!(
            output = %dir.display(),
            files = report.files.len(),
            sections = report.section_files,
            "Split complete"
        );
        Ok(report)
    }
}

/// Builds and writes the split output for `root` into `output_dir`.
pub fn split_tree(
    root: &Value,
    source: &str,
    output_dir: &Path,
    max_lines: usize,
) -> Result<SplitReport> {
    info!(output = %output_dir.display(), max_lines, "Splitting node tree");
    SplitOutput::build(root, max_lines).write(output_dir, source)
}

/// `<input dir>/<input stem>-split`.
pub fn default_output_dir(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "nodes".to_string());
    input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}-split"))
}

/// Reads a saved nodes document and splits its first root.
pub fn split_file(input: &Path, output_dir: Option<&Path>, max_lines: usize) -> Result<SplitReport> {
    if !input.exists() {
        return Err(FigmaError::MissingInput(input.to_path_buf()));
    }
    let data: Value = parse_json(&fs::read_to_string(input)?)?;
    let root = normalize_roots(&data)
        .into_iter()
        .next()
        .ok_or_else(|| FigmaError::EmptyInput(input.to_path_buf()))?;

    let output_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output_dir(input));
    split_tree(root, &input.display().to_string(), &output_dir, max_lines)
}
