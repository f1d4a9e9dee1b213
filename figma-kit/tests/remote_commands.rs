use figma_kit::cli::{run_remote, Commands};
use figma_kit::load_config::CliConfig;
use figma_kit_core::contract::{ImageFormat, MockFigmaApi};
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn read(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn nodes_command_writes_enriched_nodes_for_url_keys() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("nested/nodes.json");

    let mut api = MockFigmaApi::new();
    api.expect_fetch_nodes()
        .times(1)
        .returning(|key, ids, _| {
            assert_eq!(key, "AbC123");
            assert_eq!(ids, ["1:2".to_string(), "3:4".to_string()]);
            Ok(json!({"nodes": {
                "1:2": {"document": {"id": "1:2", "name": "A", "type": "FRAME"}},
                "3:4": {"document": {"id": "3:4", "name": "B", "type": "TEXT", "characters": "x"}}
            }}))
        });
    api.expect_fetch_local_variables()
        .times(1)
        .returning(|_| Ok(None));

    let command = Commands::Nodes {
        file_key: "https://www.figma.com/design/AbC123/Landing?node-id=1-2".to_string(),
        ids: "1:2,3:4".to_string(),
        depth: None,
    };
    run_remote(&api, command, Some(&out), &CliConfig::default())
        .await
        .unwrap();

    let written = read(&out);
    let ids: Vec<&String> = written["nodes"].as_object().unwrap().keys().collect();
    assert_eq!(ids, ["1:2", "3:4"]);
    assert_eq!(written["nodes"]["3:4"]["styles"]["text"]["characters"], "x");
}

#[tokio::test]
async fn forbidden_local_variables_write_an_empty_object() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("vars.json");

    let mut api = MockFigmaApi::new();
    api.expect_fetch_local_variables().returning(|_| Ok(None));

    let command = Commands::LocalVariables {
        file_key: "KEY".to_string(),
    };
    run_remote(&api, command, Some(&out), &CliConfig::default())
        .await
        .unwrap();

    assert_eq!(read(&out), json!({}));
}

#[tokio::test]
async fn file_summary_counts_node_types() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("summary.json");

    let mut api = MockFigmaApi::new();
    api.expect_fetch_file().times(1).returning(|_, depth| {
        assert_eq!(depth, Some(2));
        Ok(json!({
            "name": "Design System",
            "document": {"type": "DOCUMENT", "children": [
                {"type": "CANVAS", "children": [{"type": "COMPONENT"}, {"type": "COMPONENT"}]}
            ]}
        }))
    });

    let command = Commands::File {
        file_key: "KEY".to_string(),
        summary: true,
        depth: Some(2),
    };
    run_remote(&api, command, Some(&out), &CliConfig::default())
        .await
        .unwrap();

    let summary = read(&out);
    assert_eq!(summary["name"], "Design System");
    assert_eq!(summary["nodes_by_type"]["COMPONENT"], 2);
}

#[tokio::test]
async fn images_command_passes_format_and_scale() {
    let mut api = MockFigmaApi::new();
    api.expect_fetch_image_urls()
        .times(1)
        .returning(|_, _, format, scale| {
            assert_eq!(format, ImageFormat::Png);
            assert_eq!(scale, 2.0);
            Ok(json!({"images": {}}))
        });

    let command = Commands::Images {
        file_key: "KEY".to_string(),
        ids: "1:2".to_string(),
        format: ImageFormat::Png,
        scale: 2.0,
    };
    run_remote(&api, command, None, &CliConfig::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn sync_command_uses_the_given_output_dir() {
    let dir = tempdir().unwrap();
    let out_dir = dir.path().join("sync");

    let mut api = MockFigmaApi::new();
    api.expect_fetch_nodes()
        .returning(|_, _, _| Ok(json!({"nodes": {}})));
    api.expect_fetch_local_variables().returning(|_| Ok(None));
    api.expect_fetch_styles().returning(|_| Ok(json!({})));
    api.expect_fetch_components().returning(|_| Ok(json!({})));
    api.expect_fetch_image_urls()
        .returning(|_, _, _, _| Ok(json!({})));

    let command = Commands::Sync {
        file_key: "KEY".to_string(),
        ids: "1:2".to_string(),
        output_dir: Some(out_dir.clone()),
        format: ImageFormat::Svg,
        scale: 1.0,
    };
    run_remote(&api, command, None, &CliConfig::default())
        .await
        .unwrap();

    let summary = read(&out_dir.join("sync-summary.json"));
    assert_eq!(summary["completed"], 4);
    assert_eq!(summary["total"], 5);
}

#[tokio::test]
async fn upstream_errors_propagate() {
    let mut api = MockFigmaApi::new();
    api.expect_fetch_styles().returning(|_| {
        Err(figma_kit_core::FigmaError::Http {
            url: "https://api.figma.com/v1/files/KEY/styles".into(),
            status: 404,
            body: "Not found".into(),
        })
    });

    let command = Commands::Styles {
        file_key: "KEY".to_string(),
    };
    let err = run_remote(&api, command, None, &CliConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"));
}
