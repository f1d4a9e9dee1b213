///
/// This module implements the CLI interface for figma-kit: command parsing, credential
/// lookup, dispatch to `figma-kit-core` and output handling.
///
/// All fetching, enrichment, scanning and splitting lives in the [`figma-kit-core`] crate.
/// This module is glue.
///
/// ## Output
/// With the global `--output <file>` every command writes its JSON result there
/// (pretty-printed, parent directories created). Without it a preview of at most
/// [`PREVIEW_CHARS`] characters is printed to stdout.
///
/// ## Credentials
/// Remote commands need a token from `--token` or `FIGMA_ACCESS_TOKEN`. Local commands
/// (`extract-tokens`, `split`) never look for one.
///
/// [`figma-kit-core`]: ../../figma_kit_core/
use crate::load_config::{load_config, resolve_token, CliConfig};
use anyhow::Result;
use clap::{Parser, Subcommand};
use figma_kit_core::client::FigmaClient;
use figma_kit_core::config::parse_file_key;
use figma_kit_core::contract::{FigmaApi, ImageFormat};
use figma_kit_core::extract::{extract_tokens_from_file, flatten_nodes, normalize_roots};
use figma_kit_core::split::split_file;
use figma_kit_core::synchronise::{fetch_enriched_nodes, save_json, synchronise, SyncRequest};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};

pub const PREVIEW_CHARS: usize = 2000;

/// CLI for figma-kit: pull, enrich, scan and split Figma design data.
#[derive(Parser)]
#[clap(
    name = "figma-kit",
    version,
    about = "Fetch Figma design data, enrich node trees, extract design tokens and split large trees"
)]
pub struct Cli {
    /// Figma personal access token (defaults to FIGMA_ACCESS_TOKEN)
    #[clap(long, global = true)]
    pub token: Option<String>,

    /// Write the JSON result to this file instead of printing a preview
    #[clap(long, short, global = true)]
    pub output: Option<PathBuf>,

    /// Optional YAML settings file
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch a whole file
    File {
        /// File key or figma.com URL
        file_key: String,
        /// Print node counts by type instead of the document
        #[clap(long)]
        summary: bool,
        #[clap(long)]
        depth: Option<u32>,
    },
    /// Fetch nodes and enrich them with resolved tokens
    Nodes {
        file_key: String,
        /// Comma-separated node ids, e.g. 1:2,3:4
        ids: String,
        #[clap(long)]
        depth: Option<u32>,
    },
    /// List published components
    Components { file_key: String },
    /// List published styles
    Styles { file_key: String },
    /// Fetch local variables (needs variables access on the plan)
    LocalVariables { file_key: String },
    /// Get render URLs for nodes
    Images {
        file_key: String,
        ids: String,
        #[clap(long, default_value = "svg")]
        format: ImageFormat,
        #[clap(long, default_value_t = 1.0)]
        scale: f64,
    },
    /// Extract color and typography tokens from a saved JSON file
    ExtractTokens { input_file: PathBuf },
    /// Fetch everything for a set of nodes into one directory
    Sync {
        file_key: String,
        ids: String,
        #[clap(long)]
        output_dir: Option<PathBuf>,
        #[clap(long, default_value = "svg")]
        format: ImageFormat,
        #[clap(long, default_value_t = 1.0)]
        scale: f64,
    },
    /// Split a saved node tree into files under a line budget
    Split {
        input: PathBuf,
        #[clap(long)]
        output_dir: Option<PathBuf>,
        #[clap(long)]
        max_lines: Option<usize>,
    },
}

impl Commands {
    pub fn is_remote(&self) -> bool {
        !matches!(self, Commands::ExtractTokens { .. } | Commands::Split { .. })
    }
}

pub fn parse_node_ids(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// First `max_chars` characters of `text`, with `...` appended when something was cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            save_json(path, value)?;
            println!("Saved to {}", path.display());
        }
        None => {
            let text = serde_json::to_string_pretty(value)?;
            println!("{}", preview(&text, PREVIEW_CHARS));
        }
    }
    Ok(())
}

/// Node counts by type for a file response.
pub fn file_summary(file: &Value) -> Value {
    let roots = normalize_roots(file);
    let nodes = flatten_nodes(&roots);
    let mut by_type = Map::new();
    for node in &nodes {
        let node_type = node.get("type").and_then(Value::as_str).unwrap_or("UNKNOWN");
        let count = by_type.get(node_type).and_then(Value::as_u64).unwrap_or(0);
        by_type.insert(node_type.to_string(), json!(count + 1));
    }
    json!({
        "name": file.get("name").cloned().unwrap_or(Value::Null),
        "lastModified": file.get("lastModified").cloned().unwrap_or(Value::Null),
        "version": file.get("version").cloned().unwrap_or(Value::Null),
        "total_nodes": nodes.len(),
        "nodes_by_type": by_type,
    })
}

/// Runs one remote command against `api`.
pub async fn run_remote<A>(
    api: &A,
    command: Commands,
    output: Option<&Path>,
    config: &CliConfig,
) -> Result<()>
where
    A: FigmaApi + ?Sized,
{
    match command {
        Commands::File {
            file_key,
            summary,
            depth,
        } => {
            let file = api.fetch_file(&parse_file_key(&file_key), depth).await?;
            if summary {
                emit(&file_summary(&file), output)
            } else {
                emit(&file, output)
            }
        }
        Commands::Nodes {
            file_key,
            ids,
            depth,
        } => {
            let key = parse_file_key(&file_key);
            let enriched = fetch_enriched_nodes(api, &key, &parse_node_ids(&ids), depth).await?;
            emit(&enriched, output)
        }
        Commands::Components { file_key } => {
            emit(&api.fetch_components(&parse_file_key(&file_key)).await?, output)
        }
        Commands::Styles { file_key } => {
            emit(&api.fetch_styles(&parse_file_key(&file_key)).await?, output)
        }
        Commands::LocalVariables { file_key } => {
            match api.fetch_local_variables(&parse_file_key(&file_key)).await? {
                Some(variables) => emit(&variables, output),
                None => {
                    eprintln!(
                        "Warning: variables API not accessible (403). Variables need an Enterprise plan or a token with file_variables:read."
                    );
                    emit(&json!({}), output)
                }
            }
        }
        Commands::Images {
            file_key,
            ids,
            format,
            scale,
        } => {
            let urls = api
                .fetch_image_urls(&parse_file_key(&file_key), &parse_node_ids(&ids), format, scale)
                .await?;
            emit(&urls, output)
        }
        Commands::Sync {
            file_key,
            ids,
            output_dir,
            format,
            scale,
        } => {
            let request = SyncRequest {
                file_key: parse_file_key(&file_key),
                node_ids: parse_node_ids(&ids),
                output_dir: output_dir.unwrap_or_else(|| config.sync.output_dir.clone()),
                image_format: format,
                image_scale: scale,
            };
            let report = synchronise(api, &request).await?;
            tracing::info!(command = "sync", completed = report.completed(), "Synchronisation complete");
            println!(
                "Sync finished: {}/{} steps completed, output in {}",
                report.completed(),
                report.total(),
                request.output_dir.display()
            );
            Ok(())
        }
        Commands::ExtractTokens { .. } | Commands::Split { .. } => Err(anyhow::anyhow!(
            "local command passed to the remote dispatcher"
        )),
    }
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => CliConfig::default(),
    };
    let output = cli.output.as_deref();

    match cli.command {
        Commands::ExtractTokens { input_file } => {
            tracing::info!(command = "extract-tokens", input = %input_file.display(), "Extracting design tokens");
            let tokens = extract_tokens_from_file(&input_file)?;
            emit(&tokens, output)
        }
        Commands::Split {
            input,
            output_dir,
            max_lines,
        } => {
            let max_lines = max_lines.unwrap_or(config.split.max_lines);
            tracing::info!(command = "split", input = %input.display(), max_lines, "Splitting node tree");
            let report = split_file(&input, output_dir.as_deref(), max_lines)?;
            println!(
                "Split into {} files ({} section files) in {}",
                report.files.len(),
                report.section_files,
                report.output_dir.display()
            );
            Ok(())
        }
        command => {
            let token = resolve_token(cli.token)?;
            let client = FigmaClient::new(config.client_config(token)?)?;
            run_remote(&client, command, output, &config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_comma_separated_and_trimmed() {
        assert_eq!(parse_node_ids("1:2, 3:4,,"), ["1:2", "3:4"]);
        assert!(parse_node_ids("").is_empty());
    }

    #[test]
    fn preview_cuts_on_char_boundaries() {
        assert_eq!(preview("abc", 5), "abc");
        assert_eq!(preview("abcdef", 3), "abc...");
        assert_eq!(preview("ééé", 2), "éé...");
    }

    #[test]
    fn file_summary_counts_types() {
        let file = json!({
            "name": "Design",
            "document": {"type": "DOCUMENT", "children": [
                {"type": "CANVAS", "children": [{"type": "FRAME"}, {"type": "FRAME"}]}
            ]}
        });
        let summary = file_summary(&file);
        assert_eq!(summary["total_nodes"], 4);
        assert_eq!(summary["nodes_by_type"]["FRAME"], 2);
        assert_eq!(summary["name"], "Design");
    }

    #[test]
    fn only_extract_and_split_are_local() {
        let local = Commands::ExtractTokens {
            input_file: PathBuf::from("x.json"),
        };
        assert!(!local.is_remote());
        assert!(Commands::Styles {
            file_key: "k".into()
        }
        .is_remote());
    }
}
