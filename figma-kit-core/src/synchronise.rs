//! High-level pipeline: pulls everything the toolkit knows how to fetch for one file and
//! a set of node ids, and writes one JSON artifact per step.
//!
//! Steps run in a fixed order: node tree, variables, styles, components, image URLs.
//! Each step is isolated. A failing step is logged and recorded, and the pipeline moves
//! on. Once all steps ran, the raw tree is enriched (best effort) and
//! `sync-summary.json` records which artifacts exist.
//!
//! # Major Types
//! - [`SyncRequest`]: what to fetch and where to put it
//! - [`SyncReport`]: per-step outcome, also the source of `sync-summary.json`
//!
//! # Callable From
//! - The `sync` subcommand of the CLI crate and the integration tests, with any
//!   [`FigmaApi`] implementation (the real client or `MockFigmaApi`).

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::contract::{FigmaApi, ImageFormat};
use crate::enrich::{enrich_nodes_response, ComponentTable};
use crate::error::Result;
use crate::tokens::{TokenTable, VariableLookup};

pub const SUMMARY_FILE: &str = "sync-summary.json";
pub const ENRICHED_FILE: &str = "enriched-tree.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    NodeTree,
    Variables,
    Styles,
    Components,
    ImageUrls,
}

impl SyncStep {
    pub const ALL: [SyncStep; 5] = [
        SyncStep::NodeTree,
        SyncStep::Variables,
        SyncStep::Styles,
        SyncStep::Components,
        SyncStep::ImageUrls,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SyncStep::NodeTree => "node_tree",
            SyncStep::Variables => "variables",
            SyncStep::Styles => "styles",
            SyncStep::Components => "components",
            SyncStep::ImageUrls => "image_urls",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            SyncStep::NodeTree => "node-tree-raw.json",
            SyncStep::Variables => "variables.json",
            SyncStep::Styles => "styles.json",
            SyncStep::Components => "components.json",
            SyncStep::ImageUrls => "image-urls.json",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub file_key: String,
    pub node_ids: Vec<String>,
    pub output_dir: PathBuf,
    pub image_format: ImageFormat,
    pub image_scale: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepStatus {
    Written(PathBuf),
    /// The API answered but had nothing to give (variables behind a 403).
    Unavailable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub step: SyncStep,
    pub status: StepStatus,
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    pub file_key: String,
    pub node_ids: Vec<String>,
    pub steps: Vec<StepOutcome>,
    /// Path of `enriched-tree.json` when enrichment succeeded.
    pub enriched: Option<PathBuf>,
}

impl SyncReport {
    pub fn completed(&self) -> usize {
        self.steps
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Written(_)))
            .count()
    }

    pub fn total(&self) -> usize {
        SyncStep::ALL.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.total()
    }

    pub fn outcome(&self, step: SyncStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|o| o.step == step)
    }

    /// Body of `sync-summary.json`.
    pub fn summary(&self) -> Value {
        let mut steps = Map::new();
        for outcome in &self.steps {
            let file = match &outcome.status {
                StepStatus::Written(_) => json!(outcome.step.file_name()),
                _ => Value::Null,
            };
            steps.insert(outcome.step.name().to_string(), file);
        }
        json!({
            "file_key": self.file_key,
            "node_ids": self.node_ids,
            "steps": steps,
            "completed": self.completed(),
            "total": self.total(),
        })
    }
}

/// Pretty-prints `value` to `path`, creating parent directories.
pub fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    info!(path = %path.display(), "Saved JSON");
    Ok(())
}

/// Builds the variable lookup for enrichment without ever failing the caller.
pub async fn fetch_variable_lookup<A>(api: &A, file_key: &str) -> VariableLookup
where
    A: FigmaApi + ?Sized,
{
    match api.fetch_local_variables(file_key).await {
        Ok(Some(payload)) => VariableLookup::Available(TokenTable::from_value(&payload)),
        Ok(None) => VariableLookup::unavailable("variables API not accessible (403)"),
        Err(e) => {
            warn!(error = %e, "Could not fetch variables, enriching without tokens");
            VariableLookup::unavailable(e.to_string())
        }
    }
}

/// Fetches `node_ids` and enriches them, with variables resolved when available.
///
/// Only the node fetch itself can fail; variables are best effort.
pub async fn fetch_enriched_nodes<A>(
    api: &A,
    file_key: &str,
    node_ids: &[String],
    depth: Option<u32>,
) -> Result<Value>
where
    A: FigmaApi + ?Sized,
{
    let raw = api.fetch_nodes(file_key, node_ids, depth).await?;
    let variables = fetch_variable_lookup(api, file_key).await;
    enrich_nodes_response(&raw, &variables, &ComponentTable::default())
}

fn record(step: SyncStep, result: Result<Option<PathBuf>>) -> StepOutcome {
    let status = match result {
        Ok(Some(path)) => {
            info!(step = step.name(), path = %path.display(), "[SYNC] Step completed");
            StepStatus::Written(path)
        }
        Ok(None) => {
            warn!(step = step.name(), "[SYNC] Step skipped, data unavailable");
            StepStatus::Unavailable
        }
        Err(e) => {
            error!(step = step.name(), error = %e, "[SYNC][ERROR] Step failed, continuing");
            StepStatus::Failed(e.to_string())
        }
    };
    StepOutcome { step, status }
}

pub async fn synchronise<A>(api: &A, request: &SyncRequest) -> Result<SyncReport>
where
    A: FigmaApi + ?Sized,
{
    info!(
        file_key = %request.file_key,
        nodes = request.node_ids.len(),
        output_dir = %request.output_dir.display(),
        "[SYNC] Starting Figma synchronisation"
    );
    fs::create_dir_all(&request.output_dir)?;

    let path_of = |step: SyncStep| request.output_dir.join(step.file_name());
    let save = |step: SyncStep, value: &Value| -> Result<Option<PathBuf>> {
        let path = path_of(step);
        save_json(&path, value)?;
        Ok(Some(path))
    };

    let mut steps = Vec::with_capacity(SyncStep::ALL.len());
    let file_key = request.file_key.as_str();

    let node_tree = api.fetch_nodes(file_key, &request.node_ids, None).await;
    let raw_tree = node_tree.as_ref().ok().cloned();
    steps.push(record(
        SyncStep::NodeTree,
        node_tree.and_then(|tree| save(SyncStep::NodeTree, &tree)),
    ));

    let variables = api.fetch_local_variables(file_key).await;
    let lookup = match &variables {
        Ok(Some(payload)) => VariableLookup::Available(TokenTable::from_value(payload)),
        Ok(None) => VariableLookup::unavailable("variables API not accessible (403)"),
        Err(e) => VariableLookup::unavailable(e.to_string()),
    };
    steps.push(record(
        SyncStep::Variables,
        variables.and_then(|payload| match payload {
            Some(payload) => save(SyncStep::Variables, &payload),
            None => Ok(None),
        }),
    ));

    let styles = api.fetch_styles(file_key).await;
    steps.push(record(
        SyncStep::Styles,
        styles.and_then(|styles| save(SyncStep::Styles, &styles)),
    ));

    let components = api.fetch_components(file_key).await;
    let published = match &components {
        Ok(body) => ComponentTable::from_published(body),
        Err(_) => ComponentTable::default(),
    };
    steps.push(record(
        SyncStep::Components,
        components.and_then(|body| save(SyncStep::Components, &body)),
    ));

    let images = api
        .fetch_image_urls(
            file_key,
            &request.node_ids,
            request.image_format,
            request.image_scale,
        )
        .await;
    steps.push(record(
        SyncStep::ImageUrls,
        images.and_then(|urls| save(SyncStep::ImageUrls, &urls)),
    ));

    let enriched = match raw_tree {
        Some(raw) => {
            let path = request.output_dir.join(ENRICHED_FILE);
            match enrich_nodes_response(&raw, &lookup, &published)
                .and_then(|tree| save_json(&path, &tree))
            {
                Ok(()) => Some(path),
                Err(e) => {
                    error!(error = %e, "[SYNC][ERROR] Enrichment failed");
                    None
                }
            }
        }
        None => {
            warn!("[SYNC] No node tree, skipping enrichment");
            None
        }
    };

    let report = SyncReport {
        file_key: request.file_key.clone(),
        node_ids: request.node_ids.clone(),
        steps,
        enriched,
    };
    save_json(&request.output_dir.join(SUMMARY_FILE), &report.summary())?;

    info!(
        completed = report.completed(),
        total = report.total(),
        "[SYNC] Synchronisation finished"
    );
    Ok(report)
}
