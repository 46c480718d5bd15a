use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::iperf::{IdentifierPolicy, SummarySelection};
use crate::output::OutputFormat;
use crate::Settings;

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default = "default_batch_decoder")]
    pub batch: DecoderConfig,
    #[serde(default = "default_stream_decoder")]
    pub stream: DecoderConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// How log names are turned into a system identifier and timestamp.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    #[serde(
        default = "default_identifier",
        deserialize_with = "identifier_deserialize"
    )]
    pub identifier: IdentifierPolicy,
    /// Byte size of a log that holds a header but no measurement.
    /// Such logs produce zero bitrates without being parsed.
    #[serde(default)]
    pub sentinel_size: Option<u64>,
    /// Leading hyphen tokens of the log name to ignore.
    #[serde(default)]
    pub path_prefix_tokens: usize,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ParserConfig {
    #[serde(default)]
    pub selection: SummarySelection,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_identifier() -> IdentifierPolicy {
    IdentifierPolicy::FirstTokens(Settings::IDENTIFIER_TOKENS)
}
fn default_batch_decoder() -> DecoderConfig {
    DecoderConfig::default()
}
fn default_stream_decoder() -> DecoderConfig {
    DecoderConfig {
        identifier: IdentifierPolicy::Fixed(String::from(Settings::STREAM_LABEL)),
        ..DecoderConfig::default()
    }
}

fn identifier_deserialize<'de, D>(deserializer: D) -> Result<IdentifierPolicy, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            batch: default_batch_decoder(),
            stream: default_stream_decoder(),
            parser: ParserConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            identifier: default_identifier(),
            sentinel_size: None,
            path_prefix_tokens: 0,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse config file")
    }
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level: off, error, warn, info, debug or trace. Overrides --verbose and RUST_LOG
    #[arg(long, global = true, value_parser = log_level_parse)]
    pub log_level: Option<LevelFilter>,

    /// Output format: json or csv
    #[arg(long, global = true)]
    pub format: Option<OutputFormat>,

    /// Which match wins when a direction matched more than once: first or last
    #[arg(long, global = true)]
    pub selection: Option<SummarySelection>,

    /// Identifier policy: first:<n> or fixed:<label>
    #[arg(long, global = true)]
    pub identifier: Option<IdentifierPolicy>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Emit one record per log file
    Batch {
        /// Log files or directories holding *.log files
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,

        /// Stop at the first log that cannot be parsed
        #[arg(long)]
        fail_fast: bool,

        /// Byte size of logs from failed runs
        #[arg(long, conflicts_with = "no_sentinel")]
        sentinel_size: Option<u64>,

        /// Parse every log regardless of its size
        #[arg(long)]
        no_sentinel: bool,
    },
    /// Emit one record per `grep -r` line read from a file or stdin.
    /// Lines carry no file size, so there are no sentinel options here.
    Stream {
        input: Option<PathBuf>,
    },
}

fn log_level_parse(s: &str) -> Result<LevelFilter, String> {
    LevelFilter::from_str(s).map_err(|_| format!("Invalid log level '{}'", s))
}

impl CliArgs {
    /// Applies command line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        let decoder = match &self.command {
            Command::Batch {
                sentinel_size,
                no_sentinel,
                ..
            } => {
                if let Some(size) = sentinel_size {
                    config.batch.sentinel_size = Some(*size);
                }
                if *no_sentinel {
                    config.batch.sentinel_size = None;
                }
                &mut config.batch
            }
            Command::Stream { .. } => &mut config.stream,
        };

        if let Some(identifier) = &self.identifier {
            decoder.identifier = identifier.clone();
        }
        if let Some(selection) = self.selection {
            config.parser.selection = selection;
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
    }
}

/// Reads the config file when it exists and layers the command line on top.
pub fn load_config(cli_args: &CliArgs) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    if Path::new(&cli_args.config).exists() {
        let contents = fs::read_to_string(&cli_args.config)
            .with_context(|| format!("Failed to read config file {}", cli_args.config))?;
        config = AppConfig::from_toml_str(&contents)?;
    }

    cli_args.apply(&mut config);
    Ok(config)
}
