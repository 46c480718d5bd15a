//! Decodes the host identifier and creation time encoded in iperf3 log names.
//!
//! Log names follow `<identifier>-YYYY-MM-DDTHH:MM.log`. The timestamp carries
//! no zone and is read as local time of the parsing host. Comparing timestamps
//! across hosts only works when the parsing host runs in the same timezone as
//! the host that wrote the logs.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, LocalResult, NaiveDateTime, Offset, TimeDelta, TimeZone};

use crate::config::DecoderConfig;
use crate::error::{ParseError, Result};

pub const LOG_EXTENSION: &str = ".log";
const STREAM_SEPARATOR: &str = ".log:";
const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// `YYYY`, `MM` and `DDTHH:MM` once the name is split on `-`.
const DATE_TOKENS: usize = 3;

/// How the system identifier is derived from a log name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierPolicy {
    /// The first `n` hyphen-separated tokens, joined with `-`.
    FirstTokens(usize),
    /// A constant label, independent of the name.
    Fixed(String),
}

impl Default for IdentifierPolicy {
    fn default() -> Self {
        IdentifierPolicy::FirstTokens(crate::Settings::IDENTIFIER_TOKENS)
    }
}

impl fmt::Display for IdentifierPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierPolicy::FirstTokens(n) => write!(f, "first:{}", n),
            IdentifierPolicy::Fixed(label) => write!(f, "fixed:{}", label),
        }
    }
}

impl FromStr for IdentifierPolicy {
    type Err = String;

    /// Accepts `first:<n>` or `fixed:<label>`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("first", n)) => match n.parse::<usize>() {
                Ok(0) | Err(_) => Err(format!("Invalid token count '{}'", n)),
                Ok(n) => Ok(IdentifierPolicy::FirstTokens(n)),
            },
            Some(("fixed", label)) if !label.is_empty() => {
                Ok(IdentifierPolicy::Fixed(label.to_string()))
            }
            _ => Err(format!(
                "Invalid identifier policy '{}', expected first:<n> or fixed:<label>",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogIdentity {
    pub system: String,
    /// Unix seconds, always integer valued.
    pub timestamp: f64,
}

/// Decodes a log name, optionally preceded by directory components.
///
/// Directory components must be separated by `/`. A prefix separated by `\` is
/// not recognized and ends up in the identifier tokens.
pub fn decode_filename(name: &str, config: &DecoderConfig) -> Result<LogIdentity> {
    let basename = name.rsplit('/').next().unwrap_or(name);
    let stem = basename
        .strip_suffix(LOG_EXTENSION)
        .ok_or_else(|| ParseError::format(name, "missing .log extension"))?;

    let tokens: Vec<&str> = stem.split('-').collect();
    let tokens = tokens
        .get(config.path_prefix_tokens..)
        .ok_or_else(|| ParseError::format(name, "fewer tokens than the path prefix"))?;

    let (system, date_tokens) = match &config.identifier {
        IdentifierPolicy::FirstTokens(n) => {
            if *n == 0 || tokens.len() != n + DATE_TOKENS {
                return Err(ParseError::format(
                    name,
                    format!(
                        "expected {} identifier tokens followed by a date, found {} tokens",
                        n,
                        tokens.len()
                    ),
                ));
            }
            (tokens[..*n].join("-"), &tokens[*n..])
        }
        IdentifierPolicy::Fixed(label) => {
            if tokens.len() <= DATE_TOKENS {
                return Err(ParseError::format(
                    name,
                    format!("expected an identifier followed by a date, found {} tokens", tokens.len()),
                ));
            }
            (label.clone(), &tokens[tokens.len() - DATE_TOKENS..])
        }
    };

    let date = date_tokens.join("-");
    let timestamp = local_timestamp(&date).map_err(|reason| ParseError::format(name, reason))?;

    Ok(LogIdentity { system, timestamp })
}

/// Parses `YYYY-MM-DDTHH:MM` as naive local time and returns unix seconds.
pub fn local_timestamp(date: &str) -> std::result::Result<f64, String> {
    zoned_timestamp(&Local, date)
}

/// Parses `YYYY-MM-DDTHH:MM` as naive time in `tz` and returns unix seconds.
///
/// A time repeated by a DST fall-back resolves to its earliest instant. A time
/// skipped by a DST jump is read with the offset in effect before the jump,
/// the way `mktime` normalizes it.
pub fn zoned_timestamp<Tz: TimeZone>(tz: &Tz, date: &str) -> std::result::Result<f64, String> {
    let naive = NaiveDateTime::parse_from_str(date, DATE_FORMAT)
        .map_err(|e| format!("unparsable date '{}': {}", date, e))?;

    let seconds = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.timestamp(),
        LocalResult::Ambiguous(earliest, _) => earliest.timestamp(),
        LocalResult::None => {
            let before_gap = naive
                .checked_sub_signed(TimeDelta::days(1))
                .ok_or_else(|| format!("'{}' is out of range", date))?;
            let offset = tz.offset_from_utc_datetime(&before_gap).fix();
            naive.and_utc().timestamp() - i64::from(offset.local_minus_utc())
        }
    };
    Ok(seconds as f64)
}

/// Splits a `grep -r` style line into the log name (with `.log`) and the payload.
pub fn split_stream_line(line: &str) -> Result<(&str, &str)> {
    let idx = line
        .find(STREAM_SEPARATOR)
        .ok_or_else(|| ParseError::format(line, "missing '.log:' separator"))?;
    let name = &line[..idx + LOG_EXTENSION.len()];
    let payload = &line[idx + STREAM_SEPARATOR.len()..];
    Ok((name, payload))
}
