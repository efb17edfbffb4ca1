//! End-to-end scenarios (§8) driving the full [`Orchestrator`] against a
//! [`FakeGraphSource`] fixture and asserting on the written JSONL file,
//! in the teacher's `tests/*_test.rs` style.

use std::sync::Arc;

use export_core::{GraphValue, Node, Path, PropertyMap, Relationship, SerializerLimits};
use export_db::{FakeGraphSource, GraphSource};
use export_io::header::strip_padding;
use graph_export::{ExportConfig, Orchestrator};
use tokio_util::sync::CancellationToken;

fn test_config(output_dir: std::path::PathBuf) -> ExportConfig {
    ExportConfig {
        database_uri: "bolt://unused".into(),
        database_user: "unused".into(),
        database_password: "unused".into(),
        output_dir,
        batch_size: 3,
        max_retries: 2,
        retry_delay_ms: 1,
        max_retry_delay_ms: 2,
        query_timeout_seconds: 30,
        skip_schema_collection: false,
        validate_json_output: true,
        allow_insecure: false,
        json_buffer_size_kb: 64,
        limits: SerializerLimits::default(),
        enable_hashed_ids: true,
        progress_interval_ms: 60_000,
        quiet: true,
    }
}

fn node(id: &str, labels: &[&str], props: PropertyMap) -> Node {
    Node::new(id, labels.iter().map(|s| s.to_string()).collect(), props)
}

async fn run(source: FakeGraphSource, config: ExportConfig) -> (graph_export::ExportOutcome, Vec<u8>) {
    let orchestrator = Orchestrator::new(config, Arc::new(source) as Arc<dyn GraphSource>);
    let outcome = orchestrator.run(CancellationToken::new()).await.expect("export should succeed");
    let bytes = std::fs::read(&outcome.output_path).expect("output file should exist");
    (outcome, bytes)
}

fn lines_of(bytes: &[u8]) -> Vec<&str> {
    std::str::from_utf8(bytes).expect("output must be valid UTF-8").lines().collect()
}

#[tokio::test]
async fn empty_db_produces_exactly_one_header_line() {
    let dir = tempfile::tempdir().unwrap();
    let (outcome, bytes) = run(FakeGraphSource::empty(), test_config(dir.path().to_path_buf())).await;

    assert_eq!(outcome.nodes_exported, 0);
    assert_eq!(outcome.relationships_exported, 0);
    assert!(bytes.ends_with(b"\n"));
    assert_eq!(lines_of(&bytes).len(), 1);

    let header = strip_padding(&bytes).unwrap();
    assert_eq!(header["database_statistics"]["node_count"], 0);
    assert_eq!(header["database_statistics"]["relationship_count"], 0);
    assert_eq!(header["error_summary"]["has_errors"], false);
}

#[tokio::test]
async fn single_node_no_properties_is_two_lines_with_start_line_two() {
    let dir = tempfile::tempdir().unwrap();
    let n = node("n1", &["X"], PropertyMap::new());
    let source = FakeGraphSource::with_nodes("X", vec![n]);
    let (outcome, bytes) = run(source, test_config(dir.path().to_path_buf())).await;

    assert_eq!(outcome.nodes_exported, 1);
    let lines = lines_of(&bytes);
    assert_eq!(lines.len(), 2);

    let record: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(record["type"], "node");
    assert_eq!(record["labels"], serde_json::json!(["X"]));
    assert_eq!(record["properties"], serde_json::json!({}));
    assert!(record["element_id"].is_string());

    let header = strip_padding(&bytes).unwrap();
    assert_eq!(header["record_type_start_lines"]["X"], 2);
}

#[tokio::test]
async fn unicode_property_keys_round_trip_and_stable_id_is_deterministic() {
    let mut props = PropertyMap::new();
    props.insert("кириллица".into(), GraphValue::Int64(1));
    props.insert("中文属性".into(), GraphValue::Int64(2));
    let n = node("n1", &["Person"], props);

    let dir_a = tempfile::tempdir().unwrap();
    let (_, bytes_a) = run(FakeGraphSource::with_nodes("Person", vec![n.clone()]), test_config(dir_a.path().to_path_buf())).await;
    let dir_b = tempfile::tempdir().unwrap();
    let (_, bytes_b) = run(FakeGraphSource::with_nodes("Person", vec![n]), test_config(dir_b.path().to_path_buf())).await;

    let line_a = lines_of(&bytes_a)[1];
    let line_b = lines_of(&bytes_b)[1];
    let record_a: serde_json::Value = serde_json::from_str(line_a).unwrap();
    let record_b: serde_json::Value = serde_json::from_str(line_b).unwrap();

    assert_eq!(record_a["properties"]["кириллица"], 1);
    assert_eq!(record_a["properties"]["中文属性"], 2);
    // export_id differs per run (it's a fresh UUID); stable_id must not.
    assert_ne!(record_a["export_id"], record_b["export_id"]);
    assert_eq!(record_a["stable_id"], record_b["stable_id"]);
}

#[tokio::test]
async fn deeply_nested_map_truncates_past_max_depth_but_still_emits_the_record() {
    let limits = SerializerLimits { max_nested_depth: 10, nested_shallow_depth: 10, nested_reference_depth: 10, ..Default::default() };
    let mut innermost = GraphValue::Int64(42);
    for _ in 0..12 {
        let mut m = PropertyMap::new();
        m.insert("next".into(), innermost);
        innermost = GraphValue::Map(m);
    }
    let mut props = PropertyMap::new();
    props.insert("nested".into(), innermost);
    let n = node("n1", &["Deep"], props);

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.limits = limits;
    let (outcome, bytes) = run(FakeGraphSource::with_nodes("Deep", vec![n]), config).await;

    assert_eq!(outcome.nodes_exported, 1);
    assert_eq!(outcome.error_count, 1);
    let lines = lines_of(&bytes);
    assert_eq!(lines.len(), 3); // header, node, one aggregated error record
    let error_record: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
    assert_eq!(error_record["type"], "error");
    assert_eq!(error_record["count"], 1);
}

#[tokio::test]
async fn path_valued_property_serializes_in_full_mode() {
    let a = node("a", &["X"], PropertyMap::new());
    let b = node("b", &["X"], PropertyMap::new());
    let rel = Relationship::new("r1", "NEXT", "a", "b", PropertyMap::new()).unwrap();
    let path = Path::new(vec![a, b], vec![rel]).unwrap();
    let mut props = PropertyMap::new();
    props.insert("route".into(), GraphValue::Path(path));
    let n = node("n1", &["Trip"], props);

    let dir = tempfile::tempdir().unwrap();
    let (outcome, bytes) = run(FakeGraphSource::with_nodes("Trip", vec![n]), test_config(dir.path().to_path_buf())).await;

    assert_eq!(outcome.error_count, 0);
    let record: serde_json::Value = serde_json::from_str(lines_of(&bytes)[1]).unwrap();
    assert_eq!(record["properties"]["route"]["mode"], "full");
    assert_eq!(record["properties"]["route"]["nodes"].as_array().unwrap().len(), 2);
    assert_eq!(record["properties"]["route"]["relationships"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn nodes_and_relationships_both_export_with_relationships_following_nodes() {
    let a = node("a", &["Person"], PropertyMap::new());
    let b = node("b", &["Person"], PropertyMap::new());
    let rel = Relationship::new("r1", "KNOWS", "a", "b", PropertyMap::new()).unwrap();
    let source = FakeGraphSource::with_nodes("Person", vec![a, b]).and_relationships("KNOWS", vec![rel]);

    let dir = tempfile::tempdir().unwrap();
    let (outcome, bytes) = run(source, test_config(dir.path().to_path_buf())).await;

    assert_eq!(outcome.nodes_exported, 2);
    assert_eq!(outcome.relationships_exported, 1);
    let lines = lines_of(&bytes);
    assert_eq!(lines.len(), 4); // header + 2 nodes + 1 relationship

    let rel_record: serde_json::Value = serde_json::from_str(lines[3]).unwrap();
    assert_eq!(rel_record["type"], "relationship");
    assert_eq!(rel_record["label"], "KNOWS");

    let header = strip_padding(&bytes).unwrap();
    assert_eq!(header["record_type_start_lines"]["Person"], 2);
    assert_eq!(header["database_schema"]["labels"], serde_json::json!(["Person"]));
    assert_eq!(header["database_schema"]["relationship_types"], serde_json::json!(["KNOWS"]));
}

#[tokio::test]
async fn pagination_failure_mid_kind_keeps_already_emitted_nodes() {
    // failing_after(4) lets preflight(0)/schema_snapshot(1)/
    // supports_keyset_pagination(2)/the first node batch(3) through, then
    // fails permanently from call index 4 onward: the second "Person"
    // batch fails (terminating that kind early but keeping its first
    // batch), and the once-broken source then fails every subsequent
    // relationship call too, so "KNOWS" exports nothing rather than
    // aborting the whole run (§4.5: a pagination failure terminates only
    // the kind it occurred in, with partial counts kept).
    let nodes: Vec<Node> = (0..5).map(|i| node(&format!("n{i}"), &["Person"], PropertyMap::new())).collect();
    let rel = Relationship::new("r1", "KNOWS", "n0", "n1", PropertyMap::new()).unwrap();
    let source = FakeGraphSource::with_nodes("Person", nodes).and_relationships("KNOWS", vec![rel]).failing_after(4);

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path().to_path_buf());
    config.batch_size = 3;
    config.max_retries = 0;
    let (outcome, _bytes) = run(source, config).await;

    assert_eq!(outcome.nodes_exported, 3);
    assert_eq!(outcome.relationships_exported, 0);
}
