//! Valid-job filtering and JSON persistence of extraction output.

use serde::Serialize;
use serde_json::{Value, ser::PrettyFormatter};
use std::fs;
use std::io;
use std::path::Path;

use super::types::JobRecord;

/// Raw output of the extraction step, before any filtering.
#[derive(Debug, Clone)]
pub enum RawExtraction {
    /// Already-decoded list of records.
    Records(Vec<Value>),
    /// JSON text as returned by the extraction strategy (or arbitrary text on failure).
    Text(String),
}

impl RawExtraction {
    /// Literal textual form of the input, used when structured persistence fails.
    pub fn to_raw_string(&self) -> String {
        match self {
            RawExtraction::Text(text) => text.clone(),
            RawExtraction::Records(records) => Value::Array(records.clone()).to_string(),
        }
    }
}

impl From<String> for RawExtraction {
    fn from(text: String) -> Self {
        RawExtraction::Text(text)
    }
}

impl From<Vec<Value>> for RawExtraction {
    fn from(records: Vec<Value>) -> Self {
        RawExtraction::Records(records)
    }
}

/// Result of [`write_valid_jobs`].
#[derive(Debug)]
pub enum PersistOutcome {
    /// Filtered records were written as pretty JSON.
    Written {
        /// Number of records written.
        count: usize,
    },
    /// Structured write failed; the raw input text was written instead.
    Fallback {
        /// Why the structured write failed.
        error: String,
    },
    /// Neither the structured nor the raw write succeeded.
    Failed {
        /// Why the final write failed.
        error: String,
    },
}

/// Return the records of `raw` that are valid jobs.
///
/// - Text that is not JSON becomes a single `{"raw_response": ...}` record.
/// - A JSON object (or other non-list value) is wrapped as a singleton without error filtering.
/// - Lists drop every record whose `error` marker is truthy, keeping order.
///
/// List entries that are not objects cannot be job records and are dropped with a warning.
pub fn filter_valid(raw: &RawExtraction) -> Vec<JobRecord> {
    match raw {
        RawExtraction::Records(records) => filter_list(records),
        RawExtraction::Text(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Array(records)) => filter_list(&records),
            Ok(value @ Value::Object(_)) => JobRecord::from_value(value)
                .map(|record| vec![record])
                .unwrap_or_else(|| vec![JobRecord::raw_response(text.clone())]),
            Ok(_) => vec![JobRecord::raw_response(text.clone())],
            Err(error) => {
                tracing::debug!(error = %error, "Extraction output is not JSON; keeping raw text");
                vec![JobRecord::raw_response(text.clone())]
            }
        },
    }
}

fn filter_list(records: &[Value]) -> Vec<JobRecord> {
    records
        .iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let Some(record) = JobRecord::from_value(value.clone()) else {
                tracing::warn!(index, "Dropping extraction entry that is not an object");
                return None;
            };
            if record.is_error() {
                tracing::debug!(index, "Excluding record flagged as error");
                None
            } else {
                Some(record)
            }
        })
        .collect()
}

/// Serialize records as UTF-8 JSON with four-space indentation, preserving non-ASCII text.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value.serialize(&mut serializer)?;
    Ok(buffer)
}

/// Filter `raw` and persist the valid records to `path`.
///
/// Failures never propagate: when the structured write fails, the literal text of the input is
/// written to the same path and the failure is logged.
pub fn write_valid_jobs(raw: &RawExtraction, path: &Path) -> PersistOutcome {
    persist_with(raw, path, |target, bytes| fs::write(target, bytes))
}

fn persist_with<W>(raw: &RawExtraction, path: &Path, mut write: W) -> PersistOutcome
where
    W: FnMut(&Path, &[u8]) -> io::Result<()>,
{
    let records = filter_valid(raw);
    let structured = to_pretty_json(&records)
        .map_err(io::Error::other)
        .and_then(|bytes| write(path, &bytes));

    let error = match structured {
        Ok(()) => {
            tracing::info!(
                count = records.len(),
                path = %path.display(),
                "Successfully wrote jobs"
            );
            return PersistOutcome::Written {
                count: records.len(),
            };
        }
        Err(error) => error,
    };

    tracing::error!(error = %error, path = %path.display(), "Error writing jobs JSON");
    match write(path, raw.to_raw_string().as_bytes()) {
        Ok(()) => PersistOutcome::Fallback {
            error: error.to_string(),
        },
        Err(fallback_error) => {
            tracing::error!(
                error = %fallback_error,
                path = %path.display(),
                "Raw fallback write failed"
            );
            PersistOutcome::Failed {
                error: fallback_error.to_string(),
            }
        }
    }
}
