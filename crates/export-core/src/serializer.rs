//! Canonical JSON value serializer (§4.1, C1).
//!
//! Converts a [`GraphValue`] into a `serde_json::Value` under the depth,
//! collection, and path-mode limits carried by [`SerializerLimits`].
//! Never panics and never propagates a `Result` across the public
//! boundary: every failure becomes a [`SerializeError`] pushed onto the
//! caller-visible issue list plus a sentinel (`null`, or an envelope with
//! `"truncated": true`) in the returned value, per the §4.1 contract.

use base64::Engine;
use serde_json::{json, Map, Value};

use crate::error::SerializeError;
use crate::id_hash;
use crate::limits::SerializerLimits;
use crate::value::{GraphDuration, GraphValue, Node, OffsetTime, Path, PropertyMap, Relationship};

/// One recovered error, tagged with the element_id it occurred against —
/// exactly the shape C3's `record()` wants.
#[derive(Debug, Clone)]
pub struct SerializeIssue {
    pub element_id: String,
    pub error: SerializeError,
}

/// The three-way depth-band partition from §4.1, plus the abort band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepthBand {
    Deep,
    Shallow,
    Reference,
    Abort,
}

fn depth_band(depth: usize, limits: &SerializerLimits) -> DepthBand {
    if depth >= limits.max_nested_depth {
        DepthBand::Abort
    } else if depth >= limits.nested_reference_depth {
        DepthBand::Reference
    } else if depth >= limits.nested_shallow_depth {
        DepthBand::Shallow
    } else {
        DepthBand::Deep
    }
}

/// Per-record serialization context. One instance is used for exactly one
/// top-level record (§3: "produced ... consumed once ... dropped"); it is
/// never retained across records.
struct SerializeContext<'a> {
    limits: &'a SerializerLimits,
    enable_hashed_ids: bool,
    export_run_id: &'a str,
    issues: Vec<SerializeIssue>,
    /// element_id stack for the CircularReference check during nested
    /// Node/Relationship/Path traversal (§9: depth-bounded, not full cycle
    /// detection — the depth bands are the real safety net).
    visiting: Vec<String>,
}

impl<'a> SerializeContext<'a> {
    fn new(limits: &'a SerializerLimits, enable_hashed_ids: bool, export_run_id: &'a str) -> Self {
        Self { limits, enable_hashed_ids, export_run_id, issues: Vec::new(), visiting: Vec::new() }
    }

    fn push_issue(&mut self, element_id: &str, error: SerializeError) {
        self.issues.push(SerializeIssue { element_id: element_id.to_string(), error });
    }
}

/// Serialize a top-level node record to its canonical shape (§4.1: `type`,
/// `element_id`, `export_id`, `labels`, `properties`, optional `stable_id`).
pub fn serialize_node_record(
    node: &Node,
    limits: &SerializerLimits,
    enable_hashed_ids: bool,
    export_run_id: &str,
) -> (Value, Vec<SerializeIssue>) {
    let mut ctx = SerializeContext::new(limits, enable_hashed_ids, export_run_id);
    let value = serialize_node_deep(&mut ctx, node, 0);
    (value, ctx.issues)
}

/// Serialize a top-level relationship record (§4.1: `type`, `element_id`,
/// `export_id`, `label`, `start_element_id`, `end_element_id`,
/// `properties`, optional `stable_id`).
pub fn serialize_relationship_record(
    rel: &Relationship,
    limits: &SerializerLimits,
    enable_hashed_ids: bool,
    export_run_id: &str,
) -> (Value, Vec<SerializeIssue>) {
    let mut ctx = SerializeContext::new(limits, enable_hashed_ids, export_run_id);
    let value = serialize_relationship_deep(&mut ctx, rel, 0);
    (value, ctx.issues)
}

/// Serialize a standalone path value (used directly by callers that hold
/// a `GraphValue::Path`, and exercised at the unit-test level per §8).
pub fn serialize_path_record(
    path: &Path,
    limits: &SerializerLimits,
    enable_hashed_ids: bool,
    export_run_id: &str,
) -> (Value, Vec<SerializeIssue>) {
    let mut ctx = SerializeContext::new(limits, enable_hashed_ids, export_run_id);
    let value = serialize_path(&mut ctx, path);
    (value, ctx.issues)
}

fn serialize_node_deep(ctx: &mut SerializeContext, node: &Node, depth: usize) -> Value {
    let (labels, labels_truncated) = truncate_labels(&node.labels, ctx.limits.max_labels_per_node);
    let mut obj = Map::new();
    obj.insert("type".into(), json!("node"));
    obj.insert("element_id".into(), json!(node.element_id));
    obj.insert("export_id".into(), json!(ctx.export_run_id));
    obj.insert("labels".into(), json!(labels));
    if labels_truncated {
        obj.insert("labels_truncated".into(), json!(true));
    }
    obj.insert("properties".into(), serialize_map(ctx, &node.properties, depth + 1));
    if ctx.enable_hashed_ids {
        obj.insert("stable_id".into(), json!(id_hash::node_id(&node.labels, &node.properties)));
    }
    Value::Object(obj)
}

fn serialize_relationship_deep(ctx: &mut SerializeContext, rel: &Relationship, depth: usize) -> Value {
    let mut obj = Map::new();
    obj.insert("type".into(), json!("relationship"));
    obj.insert("element_id".into(), json!(rel.element_id));
    obj.insert("export_id".into(), json!(ctx.export_run_id));
    obj.insert("label".into(), json!(rel.rel_type));
    obj.insert("start_element_id".into(), json!(rel.start_element_id));
    obj.insert("end_element_id".into(), json!(rel.end_element_id));
    obj.insert("properties".into(), serialize_map(ctx, &rel.properties, depth + 1));
    if ctx.enable_hashed_ids {
        obj.insert(
            "stable_id".into(),
            json!(id_hash::relationship_id(&rel.rel_type, &rel.start_element_id, &rel.end_element_id, &rel.properties)),
        );
    }
    Value::Object(obj)
}

fn serialize_node_nested(ctx: &mut SerializeContext, node: &Node, depth: usize) -> Value {
    if ctx.visiting.contains(&node.element_id) {
        ctx.push_issue(&node.element_id, SerializeError::CircularReference { element_id: node.element_id.clone() });
        return json!({ "element_id": node.element_id, "reference": true });
    }
    match depth_band(depth, ctx.limits) {
        DepthBand::Abort => {
            ctx.push_issue(&node.element_id, SerializeError::DepthExceeded);
            Value::Null
        }
        DepthBand::Reference => {
            let (labels, _) = truncate_labels(&node.labels, ctx.limits.max_labels_in_reference_mode);
            json!({ "type": "node", "element_id": node.element_id, "labels": labels })
        }
        DepthBand::Shallow => {
            let mut obj = Map::new();
            obj.insert("type".into(), json!("node"));
            obj.insert("element_id".into(), json!(node.element_id));
            obj.insert("labels".into(), json!(node.labels));
            obj.insert("properties".into(), json!(scalar_properties(ctx, &node.properties)));
            Value::Object(obj)
        }
        DepthBand::Deep => {
            ctx.visiting.push(node.element_id.clone());
            let value = serialize_node_deep(ctx, node, depth);
            ctx.visiting.pop();
            value
        }
    }
}

fn serialize_relationship_nested(ctx: &mut SerializeContext, rel: &Relationship, depth: usize) -> Value {
    if ctx.visiting.contains(&rel.element_id) {
        ctx.push_issue(&rel.element_id, SerializeError::CircularReference { element_id: rel.element_id.clone() });
        return json!({ "element_id": rel.element_id, "reference": true });
    }
    match depth_band(depth, ctx.limits) {
        DepthBand::Abort => {
            ctx.push_issue(&rel.element_id, SerializeError::DepthExceeded);
            Value::Null
        }
        DepthBand::Reference => {
            json!({ "type": "relationship", "element_id": rel.element_id, "label": rel.rel_type })
        }
        DepthBand::Shallow => {
            let mut obj = Map::new();
            obj.insert("type".into(), json!("relationship"));
            obj.insert("element_id".into(), json!(rel.element_id));
            obj.insert("label".into(), json!(rel.rel_type));
            obj.insert("start_element_id".into(), json!(rel.start_element_id));
            obj.insert("end_element_id".into(), json!(rel.end_element_id));
            obj.insert("properties".into(), json!(scalar_properties(ctx, &rel.properties)));
            Value::Object(obj)
        }
        DepthBand::Deep => {
            ctx.visiting.push(rel.element_id.clone());
            let value = serialize_relationship_deep(ctx, rel, depth);
            ctx.visiting.pop();
            value
        }
    }
}

/// Properties filtered to scalars only, for Shallow mode ("top-level
/// scalar properties only" — §4.1). Routed through the *checked* scalar
/// path (`ctx`-threading) since these properties are being serialized for
/// the first time here — a non-finite float or out-of-range temporal
/// still needs its warning recorded, not just a silent `null`.
fn scalar_properties(ctx: &mut SerializeContext, properties: &PropertyMap) -> Map<String, Value> {
    let mut obj = Map::new();
    for (key, value) in properties {
        if let Some(scalar) = try_serialize_scalar(ctx, key, value) {
            obj.insert(key.clone(), scalar);
        }
    }
    obj
}

/// Serializes a value iff it is a plain scalar (not List/Map/Node/
/// Relationship/Path); returns `None` for container/structural kinds.
fn try_serialize_scalar(ctx: &mut SerializeContext, key: &str, value: &GraphValue) -> Option<Value> {
    match value {
        GraphValue::List(_) | GraphValue::Map(_) | GraphValue::Node(_) | GraphValue::Relationship(_) | GraphValue::Path(_) => None,
        other => Some(serialize_scalar_or_temporal_checked(ctx, other, key)),
    }
}

fn serialize_map(ctx: &mut SerializeContext, map: &PropertyMap, depth: usize) -> Value {
    match depth_band(depth, ctx.limits) {
        DepthBand::Abort => {
            ctx.push_issue("", SerializeError::DepthExceeded);
            Value::Null
        }
        _ => {
            let mut obj = Map::new();
            for (key, value) in map {
                let serialized = serialize_nested_value(ctx, value, depth, key);
                obj.insert(key.clone(), serialized);
            }
            Value::Object(obj)
        }
    }
}

fn serialize_list(ctx: &mut SerializeContext, items: &[GraphValue], depth: usize) -> Value {
    match depth_band(depth, ctx.limits) {
        DepthBand::Abort => {
            ctx.push_issue("", SerializeError::DepthExceeded);
            Value::Null
        }
        _ => {
            let max = ctx.limits.max_collection_items;
            let truncated = items.len() > max;
            let slice = if truncated { &items[..max] } else { items };
            let serialized: Vec<Value> = slice.iter().map(|v| serialize_nested_value(ctx, v, depth, "")).collect();
            if truncated {
                json!({ "items": serialized, "truncated": true, "original_length": items.len() })
            } else {
                Value::Array(serialized)
            }
        }
    }
}

/// Dispatch for any value found while descending into a container
/// (Map/List/Node-properties/path members). `key` is used only to label
/// `PropertySerializationFailed` — pass `""` for list elements.
fn serialize_nested_value(ctx: &mut SerializeContext, value: &GraphValue, depth: usize, key: &str) -> Value {
    match value {
        GraphValue::List(items) => serialize_list(ctx, items, depth + 1),
        GraphValue::Map(map) => serialize_map(ctx, map, depth + 1),
        GraphValue::Node(node) => serialize_node_nested(ctx, node, depth + 1),
        GraphValue::Relationship(rel) => serialize_relationship_nested(ctx, rel, depth + 1),
        GraphValue::Path(path) => serialize_path(ctx, path),
        other => serialize_scalar_or_temporal_checked(ctx, other, key),
    }
}

/// Scalar/temporal serialization that also records the warning-level
/// issues (non-finite float, out-of-range temporal) §3/§4.1 call for.
fn serialize_scalar_or_temporal_checked(ctx: &mut SerializeContext, value: &GraphValue, key: &str) -> Value {
    match value {
        GraphValue::Float64(f) if !f.is_finite() => {
            ctx.push_issue(key, SerializeError::NonFiniteFloat);
            Value::Null
        }
        GraphValue::Duration(d) if !duration_in_range(d) => {
            ctx.push_issue(key, SerializeError::TemporalTruncated { reason: "duration component out of range".into() });
            let clamped = GraphDuration { nanos: d.nanos.clamp(0, 999_999_999), ..*d };
            serialize_scalar_or_temporal(&GraphValue::Duration(clamped))
        }
        other => serialize_scalar_or_temporal(other),
    }
}

fn duration_in_range(d: &GraphDuration) -> bool {
    (0..1_000_000_000).contains(&d.nanos)
}

/// Serialization for the kinds that never recurse and never fail: plain
/// scalars, byte strings, and the five temporal kinds, plus spatial
/// points. Every caller that can see a non-finite float or an
/// out-of-range temporal goes through `serialize_scalar_or_temporal_checked`
/// first; this function is the unconditional fallback once those checks
/// have already run (or never apply, e.g. for points and strings).
fn serialize_scalar_or_temporal(value: &GraphValue) -> Value {
    match value {
        GraphValue::Null => Value::Null,
        GraphValue::Bool(b) => json!(*b),
        GraphValue::Int64(i) => json!(*i),
        GraphValue::Float64(f) => {
            if f.is_finite() {
                serde_json::Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        GraphValue::String(s) => json!(s),
        GraphValue::Bytes(bytes) => {
            json!({ "encoding": "base64", "data": base64::engine::general_purpose::STANDARD.encode(bytes) })
        }
        GraphValue::DateTime(dt) => json!(dt.to_rfc3339()),
        GraphValue::LocalDateTime(dt) => json!(dt.format("%Y-%m-%dT%H:%M:%S%.9f").to_string()),
        GraphValue::LocalDate(d) => json!(d.format("%Y-%m-%d").to_string()),
        GraphValue::LocalTime(t) => json!(t.format("%H:%M:%S%.9f").to_string()),
        GraphValue::OffsetTime(ot) => json!(serialize_offset_time(ot)),
        GraphValue::Duration(d) => json!(serialize_duration(d)),
        GraphValue::Point2D(p) => json!({ "srid": p.srid, "x": p.x, "y": p.y }),
        GraphValue::Point3D(p) => json!({ "srid": p.srid, "x": p.x, "y": p.y, "z": p.z }),
        // Containers/structural kinds never reach this function — the
        // caller (serialize_nested_value / serialize_record) dispatches
        // those explicitly before falling through here.
        GraphValue::List(_) | GraphValue::Map(_) | GraphValue::Node(_) | GraphValue::Relationship(_) | GraphValue::Path(_) => {
            Value::Null
        }
    }
}

fn serialize_offset_time(ot: &OffsetTime) -> String {
    format!("{}{}", ot.time.format("%H:%M:%S%.9f"), ot.offset)
}

fn serialize_duration(d: &GraphDuration) -> String {
    format!("P{}M{}DT{}.{:09}S", d.months, d.days, d.seconds, d.nanos.max(0))
}

fn truncate_labels(labels: &[String], max: usize) -> (Vec<String>, bool) {
    if labels.len() > max {
        (labels[..max].to_vec(), true)
    } else {
        (labels.to_vec(), false)
    }
}

// --- Path serialization (§4.1 "Path modes") ---------------------------

enum PathMode {
    Full,
    Compact,
    IdsOnly,
}

fn choose_path_mode(node_count: usize, limits: &SerializerLimits) -> PathMode {
    if node_count <= limits.path_full_limit {
        PathMode::Full
    } else if node_count <= limits.path_compact_limit {
        PathMode::Compact
    } else {
        PathMode::IdsOnly
    }
}

fn serialize_path(ctx: &mut SerializeContext, path: &Path) -> Value {
    let node_count = path.node_count();
    if node_count > ctx.limits.max_path_length {
        ctx.push_issue("", SerializeError::PathTooLong { node_count });
        return json!({ "truncated": true, "reason": "path_too_long" });
    }
    match choose_path_mode(node_count, ctx.limits) {
        PathMode::Full => serialize_path_full(ctx, path),
        PathMode::Compact => serialize_path_compact(ctx, path),
        PathMode::IdsOnly => serialize_path_ids_only(path),
    }
}

fn serialize_path_full(ctx: &mut SerializeContext, path: &Path) -> Value {
    // The path-property depth cap is independent of the ambient depth
    // bands: clone the limits with a tight band so `serialize_map`
    // aborts (and records DepthExceeded) past `path_property_depth`
    // regardless of how deep the surrounding record already is.
    let capped = SerializerLimits { max_nested_depth: ctx.limits.path_property_depth, ..*ctx.limits };
    let nodes: Vec<Value> = path
        .nodes
        .iter()
        .map(|node| {
            let mut inner = SerializeContext { limits: &capped, ..fork(ctx) };
            let mut obj = Map::new();
            obj.insert("element_id".into(), json!(node.element_id));
            obj.insert("labels".into(), json!(node.labels));
            obj.insert("properties".into(), serialize_map(&mut inner, &node.properties, 0));
            ctx.issues.append(&mut inner.issues);
            Value::Object(obj)
        })
        .collect();
    let relationships: Vec<Value> = path
        .relationships
        .iter()
        .map(|rel| {
            let mut inner = SerializeContext { limits: &capped, ..fork(ctx) };
            let mut obj = Map::new();
            obj.insert("element_id".into(), json!(rel.element_id));
            obj.insert("type".into(), json!(rel.rel_type));
            obj.insert("start_element_id".into(), json!(rel.start_element_id));
            obj.insert("end_element_id".into(), json!(rel.end_element_id));
            obj.insert("properties".into(), serialize_map(&mut inner, &rel.properties, 0));
            ctx.issues.append(&mut inner.issues);
            Value::Object(obj)
        })
        .collect();
    json!({ "mode": "full", "nodes": nodes, "relationships": relationships })
}

fn serialize_path_compact(ctx: &SerializeContext, path: &Path) -> Value {
    let nodes: Vec<Value> = path
        .nodes
        .iter()
        .map(|node| {
            let (labels, _) = truncate_labels(&node.labels, ctx.limits.max_labels_in_path_compact);
            json!({ "element_id": node.element_id, "labels": labels })
        })
        .collect();
    let relationships: Vec<Value> = path
        .relationships
        .iter()
        .map(|rel| json!({ "element_id": rel.element_id, "type": rel.rel_type, "start_element_id": rel.start_element_id, "end_element_id": rel.end_element_id }))
        .collect();
    json!({ "mode": "compact", "nodes": nodes, "relationships": relationships })
}

fn serialize_path_ids_only(path: &Path) -> Value {
    let node_ids: Vec<&str> = path.nodes.iter().map(|n| n.element_id.as_str()).collect();
    let rel_ids: Vec<&str> = path.relationships.iter().map(|r| r.element_id.as_str()).collect();
    json!({ "mode": "ids_only", "nodes": node_ids, "relationships": rel_ids })
}

/// Shallow-clone the context's non-limits fields for a sub-call that needs
/// its own `limits` reference but should still share `export_run_id`/
/// `enable_hashed_ids` and accumulate into the same issue/visiting state
/// conceptually (issues are merged back by the caller; `visiting` restarts
/// per path member since a path's own nodes are already distinct by
/// construction — see `Path::new`).
fn fork<'a>(ctx: &SerializeContext<'a>) -> SerializeContext<'a> {
    SerializeContext {
        limits: ctx.limits,
        enable_hashed_ids: ctx.enable_hashed_ids,
        export_run_id: ctx.export_run_id,
        issues: Vec::new(),
        visiting: Vec::new(),
    }
}
