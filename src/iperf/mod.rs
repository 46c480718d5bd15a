pub mod filename;
pub mod record;
pub mod summary;

pub use filename::{decode_filename, split_stream_line, IdentifierPolicy, LogIdentity};
pub use record::{BatchRecord, MetricMetadata, MetricRecord, MetricType, StreamRecord};
pub use summary::{BandwidthTable, LineShape, SummarySelection};
