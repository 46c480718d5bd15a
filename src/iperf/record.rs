//! Output records. Both kinds serialize as positional JSON arrays, and their
//! arity differs on purpose: consumers tell the modes apart by element count.
use serde::ser::{Serialize, SerializeTuple, Serializer};

use super::filename::LogIdentity;

const METRIC_UNIT: &str = "bytes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Histogram,
    Gauge,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Histogram => "histogram",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Values are Gbits/sec even though the unit is reported as `bytes`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricMetadata {
    pub metric_type: MetricType,
    pub unit: &'static str,
}

impl MetricMetadata {
    pub fn new(metric_type: MetricType) -> Self {
        MetricMetadata {
            metric_type,
            unit: METRIC_UNIT,
        }
    }
}

/// One record per whole log file.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    pub system: String,
    pub timestamp: f64,
    pub receiver: f64,
    pub sender: f64,
    pub metadata: MetricMetadata,
}

impl BatchRecord {
    pub const ARITY: usize = 5;

    pub fn new(identity: LogIdentity, receiver: f64, sender: f64) -> Self {
        BatchRecord {
            system: identity.system,
            timestamp: identity.timestamp,
            receiver,
            sender,
            metadata: MetricMetadata::new(MetricType::Histogram),
        }
    }

    /// Record for a run that produced no data, e.g. a node that was down.
    pub fn node_down(identity: LogIdentity) -> Self {
        Self::new(identity, 0.0, 0.0)
    }
}

impl Serialize for BatchRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(Self::ARITY)?;
        tuple.serialize_element(&self.system)?;
        tuple.serialize_element(&self.timestamp)?;
        tuple.serialize_element(&self.receiver)?;
        tuple.serialize_element(&self.sender)?;
        tuple.serialize_element(&self.metadata)?;
        tuple.end()
    }
}

/// One record per pre-split `grep` line. Carries no sender value.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRecord {
    pub label: String,
    pub timestamp: f64,
    pub value: f64,
    pub metadata: MetricMetadata,
}

impl StreamRecord {
    pub const ARITY: usize = 4;

    pub fn new(identity: LogIdentity, value: f64) -> Self {
        StreamRecord {
            label: identity.system,
            timestamp: identity.timestamp,
            value,
            metadata: MetricMetadata::new(MetricType::Gauge),
        }
    }
}

impl Serialize for StreamRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(Self::ARITY)?;
        tuple.serialize_element(&self.label)?;
        tuple.serialize_element(&self.timestamp)?;
        tuple.serialize_element(&self.value)?;
        tuple.serialize_element(&self.metadata)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricRecord {
    Batch(BatchRecord),
    Stream(StreamRecord),
}

impl MetricRecord {
    pub fn arity(&self) -> usize {
        match self {
            MetricRecord::Batch(_) => BatchRecord::ARITY,
            MetricRecord::Stream(_) => StreamRecord::ARITY,
        }
    }
}

impl From<BatchRecord> for MetricRecord {
    fn from(record: BatchRecord) -> Self {
        MetricRecord::Batch(record)
    }
}

impl From<StreamRecord> for MetricRecord {
    fn from(record: StreamRecord) -> Self {
        MetricRecord::Stream(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn identity(system: &str) -> LogIdentity {
        LogIdentity {
            system: system.to_string(),
            timestamp: 1511912700.0,
        }
    }

    #[test]
    fn test_batch_record_json() {
        let record = BatchRecord::new(identity("spartan-novastor"), 0.2001953125, 0.208984375);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!([
                "spartan-novastor",
                1511912700.0,
                0.2001953125,
                0.208984375,
                {"metric_type": "histogram", "unit": "bytes"}
            ])
        );
        let text = serde_json::to_string(&record).unwrap();
        assert!(text.starts_with(r#"["spartan-novastor",1511912700.0,"#));
    }

    #[test]
    fn test_stream_record_json() {
        let record = StreamRecord::new(identity("hpc_networking"), 0.2841796875);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!([
                "hpc_networking",
                1511912700.0,
                0.2841796875,
                {"metric_type": "gauge", "unit": "bytes"}
            ])
        );
    }

    #[test]
    fn test_arity_differs_between_modes() {
        let batch: MetricRecord = BatchRecord::node_down(identity("a-b")).into();
        let stream: MetricRecord = StreamRecord::new(identity("label"), 0.0).into();
        assert_eq!(batch.arity(), 5);
        assert_eq!(stream.arity(), 4);
        for record in [batch, stream] {
            let Value::Array(items) = serde_json::to_value(&record).unwrap() else {
                panic!("record did not serialize as an array");
            };
            assert_eq!(items.len(), record.arity());
        }
    }

    #[test]
    fn test_node_down_is_zero() {
        let record = BatchRecord::node_down(identity("spartan-nci"));
        assert_eq!(record.receiver, 0.0);
        assert_eq!(record.sender, 0.0);
        assert_eq!(record.metadata.metric_type, MetricType::Histogram);
        assert_eq!(record.system, "spartan-nci");
    }
}
