//! Canonical content-addressed ID hasher (§4.2, C2).
//!
//! `node_id`/`relationship_id` hash a *canonical* byte encoding of their
//! inputs — sorted labels, key-sorted properties, explicit type tags, no
//! whitespace — so the same graph element hashes identically regardless
//! of label insertion order or property key order. BLAKE3 is already in
//! the teacher's dependency stack for content-addressed IDs; its 256-bit
//! output is lower-hexed via `hex` to the 64-character string §8 requires.

use crate::value::{GraphValue, PropertyMap};

// Explicit type tags (§4.2 "fixed representation"). Values are arbitrary
// but must stay stable across releases — they are part of the hash input.
const TAG_NULL: u8 = 0;
const TAG_BOOL_FALSE: u8 = 1;
const TAG_BOOL_TRUE: u8 = 2;
const TAG_INT64: u8 = 3;
const TAG_FLOAT64: u8 = 4;
const TAG_STRING: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_DATETIME: u8 = 7;
const TAG_LOCAL_DATETIME: u8 = 8;
const TAG_LOCAL_DATE: u8 = 9;
const TAG_LOCAL_TIME: u8 = 10;
const TAG_OFFSET_TIME: u8 = 11;
const TAG_DURATION: u8 = 12;
const TAG_POINT2D: u8 = 13;
const TAG_POINT3D: u8 = 14;
const TAG_LIST: u8 = 15;
const TAG_MAP: u8 = 16;
const TAG_NODE: u8 = 17;
const TAG_RELATIONSHIP: u8 = 18;
const TAG_PATH: u8 = 19;

/// Deterministic 64-lowercase-hex-char content ID for a node, independent
/// of label insertion order and property key order (§4.2 invariant ii).
pub fn node_id(labels: &[String], properties: &PropertyMap) -> String {
    let mut buf = Vec::new();
    buf.push(TAG_NODE);
    write_sorted_labels(labels, &mut buf);
    write_map(properties, &mut buf);
    hash_hex(&buf)
}

/// Deterministic 64-lowercase-hex-char content ID for a relationship.
pub fn relationship_id(
    rel_type: &str,
    start_element_id: &str,
    end_element_id: &str,
    properties: &PropertyMap,
) -> String {
    let mut buf = Vec::new();
    buf.push(TAG_RELATIONSHIP);
    write_string(rel_type, &mut buf);
    write_string(start_element_id, &mut buf);
    write_string(end_element_id, &mut buf);
    write_map(properties, &mut buf);
    hash_hex(&buf)
}

fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())
}

fn write_sorted_labels(labels: &[String], buf: &mut Vec<u8>) {
    let mut sorted: Vec<&String> = labels.iter().collect();
    sorted.sort();
    sorted.dedup();
    write_u64(sorted.len() as u64, buf);
    for label in sorted {
        write_string(label, buf);
    }
}

fn write_u64(v: u64, buf: &mut Vec<u8>) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_string(s: &str, buf: &mut Vec<u8>) {
    buf.push(TAG_STRING);
    write_u64(s.len() as u64, buf);
    buf.extend_from_slice(s.as_bytes());
}

fn write_map(map: &PropertyMap, buf: &mut Vec<u8>) {
    buf.push(TAG_MAP);
    // `PropertyMap` is a `BTreeMap<String, _>`; iteration is already
    // lexicographic by key, which is exactly the canonicalization rule.
    write_u64(map.len() as u64, buf);
    for (key, value) in map {
        write_string(key, buf);
        write_value(value, buf);
    }
}

fn write_value(value: &GraphValue, buf: &mut Vec<u8>) {
    match value {
        GraphValue::Null => buf.push(TAG_NULL),
        GraphValue::Bool(false) => buf.push(TAG_BOOL_FALSE),
        GraphValue::Bool(true) => buf.push(TAG_BOOL_TRUE),
        GraphValue::Int64(i) => {
            buf.push(TAG_INT64);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        GraphValue::Float64(f) => {
            buf.push(TAG_FLOAT64);
            // Normalize -0.0 to 0.0 and NaN to a single canonical bit
            // pattern so equivalent floats always hash identically.
            let normalized = if *f == 0.0 { 0.0 } else if f.is_nan() { f64::NAN } else { *f };
            buf.extend_from_slice(&normalized.to_bits().to_le_bytes());
        }
        GraphValue::String(s) => write_string(s, buf),
        GraphValue::Bytes(b) => {
            buf.push(TAG_BYTES);
            write_u64(b.len() as u64, buf);
            buf.extend_from_slice(b);
        }
        GraphValue::DateTime(dt) => write_string_tagged(TAG_DATETIME, &dt.to_rfc3339(), buf),
        GraphValue::LocalDateTime(dt) => write_string_tagged(TAG_LOCAL_DATETIME, &dt.to_string(), buf),
        GraphValue::LocalDate(d) => write_string_tagged(TAG_LOCAL_DATE, &d.to_string(), buf),
        GraphValue::LocalTime(t) => write_string_tagged(TAG_LOCAL_TIME, &t.to_string(), buf),
        GraphValue::OffsetTime(ot) => {
            write_string_tagged(TAG_OFFSET_TIME, &format!("{}{}", ot.time, ot.offset), buf)
        }
        GraphValue::Duration(d) => {
            buf.push(TAG_DURATION);
            for part in [d.months, d.days, d.seconds, d.nanos as i64] {
                buf.extend_from_slice(&part.to_le_bytes());
            }
        }
        GraphValue::Point2D(p) => {
            buf.push(TAG_POINT2D);
            buf.extend_from_slice(&p.srid.to_le_bytes());
            buf.extend_from_slice(&p.x.to_bits().to_le_bytes());
            buf.extend_from_slice(&p.y.to_bits().to_le_bytes());
        }
        GraphValue::Point3D(p) => {
            buf.push(TAG_POINT3D);
            buf.extend_from_slice(&p.srid.to_le_bytes());
            buf.extend_from_slice(&p.x.to_bits().to_le_bytes());
            buf.extend_from_slice(&p.y.to_bits().to_le_bytes());
            buf.extend_from_slice(&p.z.to_bits().to_le_bytes());
        }
        GraphValue::List(items) => {
            buf.push(TAG_LIST);
            write_u64(items.len() as u64, buf);
            for item in items {
                write_value(item, buf);
            }
        }
        GraphValue::Map(map) => write_map(map, buf),
        GraphValue::Node(node) => {
            buf.push(TAG_NODE);
            write_sorted_labels(&node.labels, buf);
            write_map(&node.properties, buf);
        }
        GraphValue::Relationship(rel) => {
            buf.push(TAG_RELATIONSHIP);
            write_string(&rel.rel_type, buf);
            write_string(&rel.start_element_id, buf);
            write_string(&rel.end_element_id, buf);
            write_map(&rel.properties, buf);
        }
        GraphValue::Path(path) => {
            buf.push(TAG_PATH);
            write_u64(path.nodes.len() as u64, buf);
            for node in &path.nodes {
                write_sorted_labels(&node.labels, buf);
                write_map(&node.properties, buf);
            }
            write_u64(path.relationships.len() as u64, buf);
            for rel in &path.relationships {
                write_string(&rel.rel_type, buf);
                write_map(&rel.properties, buf);
            }
        }
    }
}

fn write_string_tagged(tag: u8, s: &str, buf: &mut Vec<u8>) {
    buf.push(tag);
    write_u64(s.len() as u64, buf);
    buf.extend_from_slice(s.as_bytes());
}
