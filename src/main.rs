use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};

use iperf_metrics::config::{load_config, CliArgs, Command};
use iperf_metrics::ingest::{parse_paths, parse_stream};
use iperf_metrics::logging::logger;
use iperf_metrics::output::RecordWriter;

fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    logger::setup_logging(cli_args.verbose, cli_args.log_level)?;

    let config = load_config(&cli_args)?;
    debug!("{:?}", config);

    let stdout = io::stdout();
    let mut writer = RecordWriter::new(BufWriter::new(stdout.lock()), config.output.format);

    match &cli_args.command {
        Command::Batch {
            paths,
            recursive,
            fail_fast,
            ..
        } => {
            info!("Parsing {} path(s) with identifier {}", paths.len(), config.batch.identifier);
            parse_paths(
                paths,
                *recursive,
                *fail_fast,
                &config.batch,
                config.parser.selection,
                |record| writer.write(&record.into()),
            )
            .context("Batch run aborted")?;
        }
        Command::Stream { input } => {
            let emit = |record: iperf_metrics::StreamRecord| writer.write(&record.into());
            match input {
                Some(path) => {
                    let file = File::open(path)
                        .with_context(|| format!("Failed to open {}", path.display()))?;
                    parse_stream(BufReader::new(file), &config.stream, emit)?;
                }
                None => {
                    parse_stream(io::stdin().lock(), &config.stream, emit)?;
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}
