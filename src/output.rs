use std::io::{self, Write};
use std::str::FromStr;

use serde::Deserialize;

use crate::iperf::{BatchRecord, MetricRecord, StreamRecord};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One JSON array per line.
    #[default]
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Invalid output format '{}', expected json or csv", s)),
        }
    }
}

const BATCH_CSV_HEADER: &str = "machine,timestamp,ingress,egress,metric_type,unit";
const STREAM_CSV_HEADER: &str = "metric,timestamp,value,metric_type,unit";

/// Writes records to a sink, one per line.
pub struct RecordWriter<W: Write> {
    out: W,
    format: OutputFormat,
    header_written: bool,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        RecordWriter {
            out,
            format,
            header_written: false,
        }
    }

    pub fn write(&mut self, record: &MetricRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, record)?;
                writeln!(self.out)
            }
            OutputFormat::Csv => {
                if !self.header_written {
                    let header = match record {
                        MetricRecord::Batch(_) => BATCH_CSV_HEADER,
                        MetricRecord::Stream(_) => STREAM_CSV_HEADER,
                    };
                    writeln!(self.out, "{}", header)?;
                    self.header_written = true;
                }
                writeln!(self.out, "{}", csv_row(record))
            }
        }
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn csv_row(record: &MetricRecord) -> String {
    match record {
        MetricRecord::Batch(BatchRecord {
            system,
            timestamp,
            receiver,
            sender,
            metadata,
        }) => format!(
            "{},{},{},{},{},{}",
            csv_field(system),
            timestamp,
            receiver,
            sender,
            metadata.metric_type.as_str(),
            metadata.unit
        ),
        MetricRecord::Stream(StreamRecord {
            label,
            timestamp,
            value,
            metadata,
        }) => format!(
            "{},{},{},{},{}",
            csv_field(label),
            timestamp,
            value,
            metadata.metric_type.as_str(),
            metadata.unit
        ),
    }
}

// Quotes fields holding a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iperf::LogIdentity;

    fn identity(system: &str) -> LogIdentity {
        LogIdentity {
            system: system.to_string(),
            timestamp: 1512033240.0,
        }
    }

    fn render(format: OutputFormat, records: &[MetricRecord]) -> String {
        let mut writer = RecordWriter::new(Vec::new(), format);
        for record in records {
            writer.write(record).unwrap();
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn test_json_lines() {
        let records: [MetricRecord; 2] = [
            BatchRecord::new(identity("spartan-nci"), 0.5, 0.25).into(),
            BatchRecord::node_down(identity("spartan-novastor")).into(),
        ];
        let text = render(OutputFormat::Json, &records);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"["spartan-nci",1512033240.0,0.5,0.25,{"metric_type":"histogram","unit":"bytes"}]"#
        );
    }

    #[test]
    fn test_csv_batch_has_header_once() {
        let records: [MetricRecord; 2] = [
            BatchRecord::new(identity("spartan-nci"), 0.5, 0.25).into(),
            BatchRecord::new(identity("a,b"), 1.0, 2.0).into(),
        ];
        let text = render(OutputFormat::Csv, &records);
        assert_eq!(
            text,
            "machine,timestamp,ingress,egress,metric_type,unit\n\
             spartan-nci,1512033240,0.5,0.25,histogram,bytes\n\
             \"a,b\",1512033240,1,2,histogram,bytes\n"
        );
    }

    #[test]
    fn test_csv_stream() {
        let records: [MetricRecord; 1] = [StreamRecord::new(identity("hpc_networking"), 0.2841796875).into()];
        let text = render(OutputFormat::Csv, &records);
        assert_eq!(
            text,
            "metric,timestamp,value,metric_type,unit\n\
             hpc_networking,1512033240,0.2841796875,gauge,bytes\n"
        );
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("CSV".parse::<OutputFormat>(), Ok(OutputFormat::Csv));
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
