//! Recognizes the stream 5 lines of iperf3 text output and extracts bitrates.
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::Settings;

lazy_static! {
    static ref HEADER_RE: Regex = Regex::new(r"\[\sID\]\s(\w+)\s+(\w+)\s+(\w+)\s+(\w+)").unwrap();
    static ref INTERVAL_RE: Regex = Regex::new(
        r"\[\s+5\]\s+([0-9]*\.?[0-9]+)-([0-9]*\.?[0-9]+)\s+sec\s+([0-9]*\.?[0-9]+)\s([KMG]Bytes)\s+([0-9]*\.?[0-9]+)\s+(\w+/sec)\s+\d+\s+[0-9]*\.?[0-9]+\s+([KMG]Bytes)"
    )
    .unwrap();
    static ref RECEIVER_RE: Regex = Regex::new(
        r"\[\s+5\]\s+([0-9]*\.?[0-9]+)-([0-9]*\.?[0-9]+)\s+sec\s+([0-9]*\.?[0-9]+)\s([KMG]Bytes)\s+([0-9]*\.?[0-9]+)\s+(\w+/sec)\s+receiver"
    )
    .unwrap();
    static ref SENDER_RE: Regex = Regex::new(
        r"\[\s+5\]\s+([0-9]*\.?[0-9]+)-([0-9]*\.?[0-9]+)\s+sec\s+([0-9]*\.?[0-9]+)\s([KMG]Bytes)\s+([0-9]*\.?[0-9]+)\s+(\w+/sec)\s+(\d+)\s+sender"
    )
    .unwrap();
}

/// Unit of the transferred-amount column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteUnit {
    KBytes,
    MBytes,
    GBytes,
}

impl FromStr for ByteUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "KBytes" => Ok(ByteUnit::KBytes),
            "MBytes" => Ok(ByteUnit::MBytes),
            "GBytes" => Ok(ByteUnit::GBytes),
            _ => Err(format!("Unknown byte unit '{}'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receiver,
    Sender,
}

/// Captures of a receiver or sender summary line.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub direction: Direction,
    pub start: f64,
    pub end: f64,
    pub transferred: f64,
    pub transferred_unit: ByteUnit,
    pub bitrate: f64,
    pub bitrate_unit: String,
    /// Only reported on sender lines; `None` when the count does not fit a u64.
    pub retransmits: Option<u64>,
}

impl SummaryLine {
    fn from_captures(direction: Direction, caps: &Captures) -> Option<Self> {
        // Counts too large for u64 still leave the bitrate usable.
        let retransmits = caps.get(7).and_then(|m| m.as_str().parse().ok());
        Some(SummaryLine {
            direction,
            start: caps[1].parse().ok()?,
            end: caps[2].parse().ok()?,
            transferred: caps[3].parse().ok()?,
            transferred_unit: caps[4].parse().ok()?,
            bitrate: caps[5].parse().ok()?,
            bitrate_unit: caps[6].to_string(),
            retransmits,
        })
    }

    /// Bitrate in Gbits/sec.
    pub fn gbits_per_sec(&self) -> f64 {
        normalize_bitrate(self.bitrate, self.transferred_unit)
    }
}

/// Scales a bitrate to Gbits/sec.
///
/// The scale is taken from the transferred-amount unit, not from the bitrate
/// unit column: `GBytes` rows are already in Gbits/sec, everything else is
/// read as Mbits/sec.
pub fn normalize_bitrate(bitrate: f64, transferred_unit: ByteUnit) -> f64 {
    match transferred_unit {
        ByteUnit::GBytes => bitrate,
        ByteUnit::KBytes | ByteUnit::MBytes => bitrate / Settings::MBITS_PER_GBIT,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LineShape {
    /// `[ ID] Interval Transfer Bitrate ...`
    Header,
    /// Per-second stream 5 line with retransmit and cwnd columns.
    Interval,
    Summary(SummaryLine),
    Unrecognized,
}

/// Classifies one line of iperf3 output. Summary lines take precedence.
pub fn classify_line(line: &str) -> LineShape {
    if let Some(summary) = RECEIVER_RE
        .captures(line)
        .and_then(|caps| SummaryLine::from_captures(Direction::Receiver, &caps))
    {
        return LineShape::Summary(summary);
    }
    if let Some(summary) = SENDER_RE
        .captures(line)
        .and_then(|caps| SummaryLine::from_captures(Direction::Sender, &caps))
    {
        return LineShape::Summary(summary);
    }
    if INTERVAL_RE.is_match(line) {
        return LineShape::Interval;
    }
    if HEADER_RE.is_match(line) {
        return LineShape::Header;
    }
    LineShape::Unrecognized
}

/// Which match is authoritative when a direction matched more than once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySelection {
    #[default]
    First,
    Last,
}

impl FromStr for SummarySelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "first" => Ok(SummarySelection::First),
            "last" => Ok(SummarySelection::Last),
            _ => Err(format!("Invalid selection '{}', expected first or last", s)),
        }
    }
}

/// Normalized bitrates per direction, in scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BandwidthTable {
    receiver: Vec<f64>,
    sender: Vec<f64>,
}

impl BandwidthTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new();
        for line in lines {
            table.scan_line(line.as_ref());
        }
        table
    }

    /// Records the bitrate of a summary line and returns the line's shape.
    pub fn scan_line(&mut self, line: &str) -> LineShape {
        let shape = classify_line(line);
        if let LineShape::Summary(summary) = &shape {
            let value = summary.gbits_per_sec();
            match summary.direction {
                Direction::Receiver => self.receiver.push(value),
                Direction::Sender => self.sender.push(value),
            }
        }
        shape
    }

    pub fn receiver(&self) -> &[f64] {
        &self.receiver
    }

    pub fn sender(&self) -> &[f64] {
        &self.sender
    }

    /// Selected receiver bitrate, `0.0` when nothing matched.
    pub fn receiver_value(&self, selection: SummarySelection) -> f64 {
        select(&self.receiver, selection)
    }

    /// Selected sender bitrate, `0.0` when nothing matched.
    pub fn sender_value(&self, selection: SummarySelection) -> f64 {
        select(&self.sender, selection)
    }
}

fn select(values: &[f64], selection: SummarySelection) -> f64 {
    let value = match selection {
        SummarySelection::First => values.first(),
        SummarySelection::Last => values.last(),
    };
    value.copied().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVER_MBYTES: &str =
        "[  5]   0.00-10.10  sec   350 MBytes   291 Mbits/sec                  receiver";
    const RECEIVER_GBYTES: &str =
        "[  5]   0.00-10.10  sec   350 GBytes   291 Mbits/sec                  receiver";
    const SENDER: &str =
        "[  5]   0.00-10.00  sec   255 MBytes   214 Mbits/sec   14             sender";
    const INTERVAL: &str =
        "[  5]   1.00-2.00   sec  25.0 MBytes   210 Mbits/sec    0    409 KBytes";
    const HEADER: &str = "[ ID] Interval           Transfer     Bitrate         Retr  Cwnd";

    #[test]
    fn test_receiver_mbytes_is_divided() {
        let LineShape::Summary(summary) = classify_line(RECEIVER_MBYTES) else {
            panic!("receiver line not recognized");
        };
        assert_eq!(summary.direction, Direction::Receiver);
        assert_eq!(summary.start, 0.0);
        assert_eq!(summary.end, 10.10);
        assert_eq!(summary.transferred, 350.0);
        assert_eq!(summary.transferred_unit, ByteUnit::MBytes);
        assert_eq!(summary.bitrate_unit, "Mbits/sec");
        assert_eq!(summary.retransmits, None);
        assert_eq!(summary.gbits_per_sec(), 0.2841796875);
    }

    #[test]
    fn test_receiver_gbytes_is_unchanged() {
        let mut table = BandwidthTable::new();
        table.scan_line(RECEIVER_GBYTES);
        assert_eq!(table.receiver(), &[291.0]);
        assert!(table.sender().is_empty());
    }

    #[test]
    fn test_kbytes_scaled_like_mbytes() {
        assert_eq!(normalize_bitrate(512.0, ByteUnit::KBytes), 0.5);
        assert_eq!(normalize_bitrate(512.0, ByteUnit::MBytes), 0.5);
        assert_eq!(normalize_bitrate(512.0, ByteUnit::GBytes), 512.0);
    }

    #[test]
    fn test_sender_line() {
        let LineShape::Summary(summary) = classify_line(SENDER) else {
            panic!("sender line not recognized");
        };
        assert_eq!(summary.direction, Direction::Sender);
        assert_eq!(summary.retransmits, Some(14));
        assert_eq!(summary.gbits_per_sec(), 0.208984375);
    }

    #[test]
    fn test_oversized_retransmit_count_keeps_sender_bitrate() {
        let line = "[  5]   0.00-10.00  sec   255 MBytes   214 Mbits/sec   99999999999999999999999             sender";
        let LineShape::Summary(summary) = classify_line(line) else {
            panic!("sender line not recognized");
        };
        assert_eq!(summary.retransmits, None);
        assert_eq!(BandwidthTable::from_lines([line]).sender(), &[0.208984375]);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(classify_line(HEADER), LineShape::Header);
        assert_eq!(classify_line(INTERVAL), LineShape::Interval);
        assert_eq!(classify_line("iperf Done."), LineShape::Unrecognized);
        assert_eq!(classify_line(""), LineShape::Unrecognized);
        // Other stream ids are ignored.
        assert_eq!(
            classify_line("[  7]   0.00-10.10  sec   350 MBytes   291 Mbits/sec   receiver"),
            LineShape::Unrecognized
        );
    }

    #[test]
    fn test_unmatched_lines_yield_zero() {
        let table = BandwidthTable::from_lines([HEADER, INTERVAL, "garbage", ""]);
        assert!(table.receiver().is_empty());
        assert!(table.sender().is_empty());
        assert_eq!(table.receiver_value(SummarySelection::First), 0.0);
        assert_eq!(table.sender_value(SummarySelection::Last), 0.0);
    }

    #[test]
    fn test_selection_first_and_last() {
        let table = BandwidthTable::from_lines([RECEIVER_MBYTES, RECEIVER_GBYTES]);
        assert_eq!(table.receiver_value(SummarySelection::First), 0.2841796875);
        assert_eq!(table.receiver_value(SummarySelection::Last), 291.0);
    }

    #[test]
    fn test_scan_is_repeatable() {
        let lines = [HEADER, INTERVAL, SENDER, RECEIVER_MBYTES];
        assert_eq!(BandwidthTable::from_lines(lines), BandwidthTable::from_lines(lines));
    }

    #[test]
    fn test_selection_from_str() {
        assert_eq!("first".parse::<SummarySelection>(), Ok(SummarySelection::First));
        assert_eq!("LAST".parse::<SummarySelection>(), Ok(SummarySelection::Last));
        assert!("middle".parse::<SummarySelection>().is_err());
    }
}
