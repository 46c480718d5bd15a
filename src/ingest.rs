//! Entry points that tie log names, file contents and output records together.
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::config::DecoderConfig;
use crate::discover::collect_log_files;
use crate::error::{ParseError, Result};
use crate::iperf::{
    decode_filename, split_stream_line, BandwidthTable, BatchRecord, LogIdentity, StreamRecord,
    SummarySelection,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Records emitted.
    pub processed: usize,
    /// Stream lines without a receiver summary.
    pub skipped: usize,
    /// Logs or lines that could not be decoded or read.
    pub failed: usize,
}

/// Parses one log file into a batch record.
///
/// A file whose size equals `config.sentinel_size` is not read and yields
/// zero bitrates. Directions without a summary line also report zero.
pub fn parse_log_file(
    path: &Path,
    config: &DecoderConfig,
    selection: SummarySelection,
) -> Result<BatchRecord> {
    let name = path.to_string_lossy();
    let identity = decode_filename(&name, config)?;

    let size = fs::metadata(path)?.len();
    if config.sentinel_size == Some(size) {
        debug!("{} is {} bytes, reporting the run as down", name, size);
        return Ok(BatchRecord::node_down(identity));
    }

    let bytes = fs::read(path)?;
    let contents = String::from_utf8_lossy(&bytes);
    Ok(parse_log_lines(identity, contents.lines(), selection))
}

/// Builds a batch record from lines that were already read, in file order.
pub fn parse_log_lines<I, S>(identity: LogIdentity, lines: I, selection: SummarySelection) -> BatchRecord
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let table = BandwidthTable::from_lines(lines);
    BatchRecord::new(
        identity,
        table.receiver_value(selection),
        table.sender_value(selection),
    )
}

/// Parses one `<path>/<name>.log:<payload>` line into a stream record.
///
/// A payload without a receiver summary yields a value of zero.
pub fn parse_stream_line(line: &str, config: &DecoderConfig) -> Result<StreamRecord> {
    let (identity, table) = scan_stream_line(line, config)?;
    Ok(StreamRecord::new(identity, table.receiver_value(SummarySelection::First)))
}

fn scan_stream_line(line: &str, config: &DecoderConfig) -> Result<(LogIdentity, BandwidthTable)> {
    let (name, payload) = split_stream_line(line)?;
    let identity = decode_filename(name, config)?;
    let mut table = BandwidthTable::new();
    table.scan_line(payload);
    Ok((identity, table))
}

/// Reads `grep -r` style lines and emits a record for every receiver summary.
///
/// Lines without a receiver summary are skipped. Malformed lines are logged
/// and counted as failed. Errors from `emit` stop the run.
pub fn parse_stream<R, F>(mut reader: R, config: &DecoderConfig, mut emit: F) -> Result<IngestStats>
where
    R: BufRead,
    F: FnMut(StreamRecord) -> io::Result<()>,
{
    let mut stats = IngestStats::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            continue;
        }

        match scan_stream_line(line, config) {
            Ok((identity, table)) if !table.receiver().is_empty() => {
                emit(StreamRecord::new(
                    identity,
                    table.receiver_value(SummarySelection::First),
                ))?;
                stats.processed += 1;
            }
            Ok(_) => {
                debug!("No receiver summary in: {}", line);
                stats.skipped += 1;
            }
            Err(e) => {
                error!("{}", e);
                stats.failed += 1;
            }
        }
    }

    info!(
        "Stream done: {} records, {} lines skipped, {} failed",
        stats.processed, stats.skipped, stats.failed
    );
    Ok(stats)
}

/// Emits one batch record per log found under `paths`.
///
/// Undecodable or unreadable logs are logged and skipped, unless `fail_fast`
/// is set, in which case the first such error is returned.
pub fn parse_paths<F>(
    paths: &[PathBuf],
    recursive: bool,
    fail_fast: bool,
    config: &DecoderConfig,
    selection: SummarySelection,
    mut emit: F,
) -> Result<IngestStats>
where
    F: FnMut(BatchRecord) -> io::Result<()>,
{
    let mut stats = IngestStats::default();

    for root in paths {
        if !root.exists() {
            let e = ParseError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", root.display()),
            ));
            error!("{}", e);
            stats.failed += 1;
            if fail_fast {
                return Err(e);
            }
            continue;
        }

        for path in collect_log_files(root, recursive) {
            match parse_log_file(&path, config, selection) {
                Ok(record) => {
                    emit(record)?;
                    stats.processed += 1;
                }
                Err(e) => {
                    error!("Skipping {}: {}", path.display(), e);
                    stats.failed += 1;
                    if fail_fast {
                        return Err(e);
                    }
                }
            }
        }
    }

    info!(
        "Batch done: {} records, {} failed",
        stats.processed, stats.failed
    );
    Ok(stats)
}
