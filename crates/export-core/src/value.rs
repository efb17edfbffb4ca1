//! The graph value model.
//!
//! A [`GraphValue`] is a tagged union over every kind of value a property
//! graph can hand back: scalars, temporals, spatial points, and the
//! structural kinds (node, relationship, path) that nest other values.
//! Adding a new variant means touching every exhaustive match over this
//! type — there is no open polymorphism here by design (see DESIGN.md).

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};

/// Properties are keyed by name and canonically ordered (`BTreeMap` sorts
/// by key), which both satisfies the canonical-ID sort requirement and
/// gives deterministic JSON key order in the value serializer for free.
pub type PropertyMap = BTreeMap<String, GraphValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    Null,
    Bool(bool),
    Int64(i64),
    /// NaN / +-Inf are caught at the serializer boundary (C1), not here —
    /// this type can still hold them so canonicalization (C2) sees the
    /// raw bit pattern.
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<FixedOffset>),
    LocalDateTime(NaiveDateTime),
    LocalDate(NaiveDate),
    LocalTime(NaiveTime),
    OffsetTime(OffsetTime),
    Duration(GraphDuration),
    Point2D(Point2D),
    Point3D(Point3D),
    List(Vec<GraphValue>),
    Map(PropertyMap),
    Node(Node),
    Relationship(Relationship),
    Path(Path),
}

/// A wall-clock time of day plus a UTC offset, without a date component.
/// `chrono::NaiveTime` has no offset of its own, hence the wrapper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetTime {
    pub time: NaiveTime,
    pub offset: FixedOffset,
}

/// A calendar/clock duration in the Neo4j sense: months and days are
/// kept distinct from seconds because they are not a fixed number of
/// seconds (a month is not always 30*86400s) — collapsing them would
/// silently lose precision on round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphDuration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanos: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2D {
    pub srid: i32,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point3D {
    pub srid: i32,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A node in the source graph.
///
/// Invariant: `labels` is deduplicated (stable, first-occurrence order)
/// before it ever reaches the serializer — see [`Node::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub element_id: String,
    pub labels: Vec<String>,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(element_id: impl Into<String>, labels: Vec<String>, properties: PropertyMap) -> Self {
        Self {
            element_id: element_id.into(),
            labels: dedup_stable(labels),
            properties,
        }
    }
}

/// A relationship in the source graph.
///
/// Invariant: both endpoint IDs are non-empty — enforced in
/// [`Relationship::new`] rather than trusted from the caller, since a
/// blank endpoint would silently corrupt path-stitching validation
/// ([`Path::new`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub element_id: String,
    pub rel_type: String,
    pub start_element_id: String,
    pub end_element_id: String,
    pub properties: PropertyMap,
}

impl Relationship {
    pub fn new(
        element_id: impl Into<String>,
        rel_type: impl Into<String>,
        start_element_id: impl Into<String>,
        end_element_id: impl Into<String>,
        properties: PropertyMap,
    ) -> Result<Self, InvalidRelationship> {
        let start_element_id = start_element_id.into();
        let end_element_id = end_element_id.into();
        if start_element_id.is_empty() || end_element_id.is_empty() {
            return Err(InvalidRelationship::EmptyEndpoint);
        }
        Ok(Self {
            element_id: element_id.into(),
            rel_type: rel_type.into(),
            start_element_id,
            end_element_id,
            properties,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidRelationship {
    #[error("relationship endpoint element_id must not be empty")]
    EmptyEndpoint,
}

/// An alternating Node, Relationship, Node, … sequence of length >= 1
/// node. [`Path::new`] checks the stitching invariant from §3: every
/// relationship's endpoints must equal its neighboring nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
}

impl Path {
    pub fn new(nodes: Vec<Node>, relationships: Vec<Relationship>) -> Result<Self, InvalidPath> {
        if nodes.is_empty() {
            return Err(InvalidPath::Empty);
        }
        if relationships.len() != nodes.len() - 1 {
            return Err(InvalidPath::LengthMismatch {
                nodes: nodes.len(),
                relationships: relationships.len(),
            });
        }
        for (i, rel) in relationships.iter().enumerate() {
            let (start, end) = (&nodes[i], &nodes[i + 1]);
            let stitched = (rel.start_element_id == start.element_id && rel.end_element_id == end.element_id)
                || (rel.start_element_id == end.element_id && rel.end_element_id == start.element_id);
            if !stitched {
                return Err(InvalidPath::BrokenStitch { index: i });
            }
        }
        Ok(Self { nodes, relationships })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidPath {
    #[error("path must contain at least one node")]
    Empty,
    #[error("path has {nodes} nodes but {relationships} relationships (expected {})", nodes.saturating_sub(1))]
    LengthMismatch { nodes: usize, relationships: usize },
    #[error("relationship at index {index} does not connect its neighboring nodes")]
    BrokenStitch { index: usize },
}

fn dedup_stable(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_dedups_labels_preserving_order() {
        let node = Node::new("n1", vec!["Person".into(), "Customer".into(), "Person".into()], PropertyMap::new());
        assert_eq!(node.labels, vec!["Person".to_string(), "Customer".to_string()]);
    }

    #[test]
    fn relationship_rejects_empty_endpoints() {
        let err = Relationship::new("r1", "KNOWS", "", "n2", PropertyMap::new()).unwrap_err();
        assert_eq!(err, InvalidRelationship::EmptyEndpoint);
    }

    #[test]
    fn path_accepts_well_stitched_triples() {
        let a = Node::new("a", vec!["X".into()], PropertyMap::new());
        let b = Node::new("b", vec!["X".into()], PropertyMap::new());
        let rel = Relationship::new("r1", "KNOWS", "a", "b", PropertyMap::new()).unwrap();
        let path = Path::new(vec![a, b], vec![rel]).unwrap();
        assert_eq!(path.node_count(), 2);
    }

    #[test]
    fn path_rejects_broken_stitch() {
        let a = Node::new("a", vec!["X".into()], PropertyMap::new());
        let b = Node::new("b", vec!["X".into()], PropertyMap::new());
        let rel = Relationship::new("r1", "KNOWS", "a", "zzz", PropertyMap::new()).unwrap();
        let err = Path::new(vec![a, b], vec![rel]).unwrap_err();
        assert_eq!(err, InvalidPath::BrokenStitch { index: 0 });
    }
}
