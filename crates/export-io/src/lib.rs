//! Record writer, two-phase metadata header, throttled progress reporting,
//! and the line/error coordinator (§4.6-4.10, C6-C7, C9-C10).

pub mod coordinator;
pub mod header;
pub mod progress;
pub mod record_writer;

pub use coordinator::LineCoordinator;
pub use header::{
    Compatibility, DatabaseSchema, DatabaseStatistics, Environment, ErrorSummary, ExportManifest, MetadataHeader,
    PaginationPerformance, ProducerIdentity, SecurityFlags, SourceSystem, SUPPORTED_RECORD_TYPES,
};
pub use progress::{KindStats, ProgressThrottle, Stats};
pub use record_writer::{RecordWriter, WriterStats};
