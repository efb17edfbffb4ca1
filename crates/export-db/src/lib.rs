//! Database-facing port trait, retry/circuit-breaker policy, and
//! pagination driver (§4.4, §4.5, §4.5-AMBIENT, C4/C5).

pub mod fake_source;
pub mod graph_source;
pub mod paginator;
pub mod retry;

pub use fake_source::FakeGraphSource;
pub use graph_source::{GraphSource, NodePage, RelationshipPage, SchemaSnapshot};
pub use paginator::{Cursor, NodeBatch, Paginator, RelationshipBatch};
pub use retry::{CircuitBreaker, RetryExecutor, RetryPolicy};
