//! Graph value model, canonical JSON serializer, content-addressed ID
//! hasher, and error accumulator — zero I/O (§4.1-4.3, §4.2, C1-C3).
//!
//! Everything above the file/database boundary lives in the `export-db`
//! and `export-io` crates; this crate is pure data + pure functions so it
//! can be exhaustively property-tested without a database or filesystem.

pub mod accumulator;
pub mod error;
pub mod id_hash;
pub mod limits;
pub mod serializer;
pub mod value;

pub use accumulator::{ErrorAccumulator, FlushedError};
pub use error::{ExportError, SerializeError, Severity};
pub use limits::SerializerLimits;
pub use serializer::{serialize_node_record, serialize_path_record, serialize_relationship_record, SerializeIssue};
pub use value::{GraphDuration, GraphValue, Node, OffsetTime, Path, Point2D, Point3D, PropertyMap, Relationship};
