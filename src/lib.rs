pub mod config;
pub mod discover;
pub mod error;
pub mod ingest;
pub mod iperf;
pub mod logging;
pub mod output;

pub use config::{AppConfig, DecoderConfig};
pub use error::{ParseError, Result};
pub use ingest::{parse_log_file, parse_log_lines, parse_stream_line, IngestStats};
pub use iperf::{BatchRecord, IdentifierPolicy, LogIdentity, MetricRecord, StreamRecord};

pub struct Settings {}

impl Settings {
    /// Size of a header-only log in the deployment these logs come from.
    pub const REFERENCE_SENTINEL_SIZE: u64 = 1124;
    pub const IDENTIFIER_TOKENS: usize = 2;
    pub const STREAM_LABEL: &str = "hpc_networking";
    pub const MBITS_PER_GBIT: f64 = 1024.0;
}
