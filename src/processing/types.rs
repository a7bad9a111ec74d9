//! Core data types and error definitions for the preprocessing pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while validating configuration or loading job records.
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// A field-priority entry named something outside the supported set.
    #[error("Invalid field '{field}' in priority list. Valid fields: {valid}")]
    InvalidField {
        /// Offending symbol as supplied by the caller.
        field: String,
        /// Comma separated list of accepted symbols.
        valid: String,
    },
    /// The field-priority list contained no entries.
    #[error("Field priority must name at least one field. Valid fields: {valid}")]
    EmptyPriority {
        /// Comma separated list of accepted symbols.
        valid: String,
    },
    /// The same field appeared more than once in the priority list.
    #[error("Field '{0}' appears more than once in the priority list")]
    DuplicateField(String),
    /// Input file does not exist.
    #[error("Could not find file: {}", path.display())]
    NotFound {
        /// Path that was requested.
        path: PathBuf,
    },
    /// Input file exists but is not a JSON array or object.
    #[error("Invalid JSON format in file: {} ({reason})", path.display())]
    InvalidFormat {
        /// Path that failed to parse.
        path: PathBuf,
        /// Parser diagnostic.
        reason: String,
    },
    /// Input file could not be read for a reason other than absence.
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Job-record fields that may participate in document assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobField {
    /// Free-text description of the role.
    JobDescription,
    /// Technologies requested by the employer.
    TechnologyStack,
    /// Company identity together with its location.
    CompanyLocation,
}

impl JobField {
    /// Every supported field, in default priority order.
    pub const ALL: [JobField; 3] = [
        JobField::JobDescription,
        JobField::TechnologyStack,
        JobField::CompanyLocation,
    ];

    /// Symbolic name accepted in priority lists.
    pub const fn symbol(self) -> &'static str {
        match self {
            JobField::JobDescription => "job_description",
            JobField::TechnologyStack => "technology_stack",
            JobField::CompanyLocation => "company_location",
        }
    }

    /// Key under which the field is stored in a persisted job record.
    pub const fn record_key(self) -> &'static str {
        match self {
            JobField::JobDescription => "job_description",
            JobField::TechnologyStack => "technology_stack",
            JobField::CompanyLocation => "company_name_and_location",
        }
    }

    fn valid_symbols() -> String {
        Self::ALL
            .iter()
            .map(|field| field.symbol())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for JobField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for JobField {
    type Err = PreprocessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "job_description" => Ok(Self::JobDescription),
            "technology_stack" => Ok(Self::TechnologyStack),
            "company_location" => Ok(Self::CompanyLocation),
            other => Err(PreprocessError::InvalidField {
                field: other.to_string(),
                valid: Self::valid_symbols(),
            }),
        }
    }
}

/// Ordered, non-empty set of fields used to assemble a document.
///
/// Earlier fields are placed first in the document and therefore carry more weight once the
/// text is embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPriority(Vec<JobField>);

impl FieldPriority {
    /// Build a priority from already-typed fields, rejecting empty or repeated entries.
    pub fn new(fields: Vec<JobField>) -> Result<Self, PreprocessError> {
        if fields.is_empty() {
            return Err(PreprocessError::EmptyPriority {
                valid: JobField::valid_symbols(),
            });
        }
        for (position, field) in fields.iter().enumerate() {
            if fields[..position].contains(field) {
                return Err(PreprocessError::DuplicateField(field.symbol().to_string()));
            }
        }
        Ok(Self(fields))
    }

    /// Parse symbolic field names such as `"technology_stack"`.
    pub fn parse<I, S>(symbols: I) -> Result<Self, PreprocessError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = symbols
            .into_iter()
            .map(|symbol| symbol.as_ref().parse())
            .collect::<Result<Vec<JobField>, _>>()?;
        Self::new(fields)
    }

    /// Fields in priority order.
    pub fn fields(&self) -> &[JobField] {
        &self.0
    }
}

impl Default for FieldPriority {
    fn default() -> Self {
        Self(JobField::ALL.to_vec())
    }
}

impl fmt::Display for FieldPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbols: Vec<&str> = self.0.iter().map(|field| field.symbol()).collect();
        write!(f, "[{}]", symbols.join(", "))
    }
}

impl FromStr for FieldPriority {
    type Err = PreprocessError;

    /// Parse a comma separated list, e.g. `company_location,job_description`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.split(',').filter(|part| !part.trim().is_empty()))
    }
}

/// One structured hiring entry produced by the extraction step.
///
/// Known fields are optional and treated as empty when absent. Any other keys (for example the
/// `index` and `tags` attached by the extraction strategy, or `raw_response`) are preserved so the
/// record survives a write/read cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Company identity and location.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub company_name_and_location: Option<String>,
    /// Requested technologies.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub technology_stack: Option<String>,
    /// Role description.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub job_description: Option<String>,
    /// How to apply. Persisted but not used for documents.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub application_details: Option<String>,
    /// Extraction failure marker, kept verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    /// Remaining keys.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    /// Whether the record carries a truthy `error` marker.
    pub fn is_error(&self) -> bool {
        self.error.as_ref().is_some_and(is_truthy)
    }

    /// Text stored for `field`, or an empty string when absent.
    pub fn field(&self, field: JobField) -> &str {
        let value = match field {
            JobField::JobDescription => &self.job_description,
            JobField::TechnologyStack => &self.technology_stack,
            JobField::CompanyLocation => &self.company_name_and_location,
        };
        value.as_deref().unwrap_or("")
    }

    /// Wrap an unparseable extraction reply so it can still be inspected on disk.
    pub fn raw_response(text: impl Into<String>) -> Self {
        let mut extra = Map::new();
        extra.insert("raw_response".into(), Value::String(text.into()));
        Self {
            extra,
            ..Self::default()
        }
    }

    /// Convert a JSON value into a record; only objects qualify.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are false.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_text))
}

fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.into_iter().filter_map(value_to_text).collect();
            Some(parts.join(", "))
        }
        Value::Object(_) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_priority_rejects_unknown_symbol() {
        let error = FieldPriority::parse(["job_description", "salary"]).unwrap_err();
        let message = error.to_string();
        assert!(message.contains("salary"));
        assert!(message.contains("job_description, technology_stack, company_location"));
    }

    #[test]
    fn field_priority_rejects_empty_and_duplicates() {
        assert!(matches!(
            FieldPriority::parse(Vec::<&str>::new()),
            Err(PreprocessError::EmptyPriority { .. })
        ));
        assert!(matches!(
            FieldPriority::parse(["technology_stack", "technology_stack"]),
            Err(PreprocessError::DuplicateField(field)) if field == "technology_stack"
        ));
    }

    #[test]
    fn field_priority_parses_comma_list() {
        let priority: FieldPriority = "company_location, job_description".parse().expect("valid");
        assert_eq!(
            priority.fields(),
            &[JobField::CompanyLocation, JobField::JobDescription]
        );
        assert_eq!(
            FieldPriority::default().to_string(),
            "[job_description, technology_stack, company_location]"
        );
    }

    #[test]
    fn company_location_maps_to_combined_key() {
        assert_eq!(
            JobField::CompanyLocation.record_key(),
            "company_name_and_location"
        );
    }

    #[test]
    fn record_loader_fills_defaults_and_keeps_extras() {
        let record = JobRecord::from_value(json!({
            "job_description": null,
            "technology_stack": ["Rust", "Go", 3],
            "index": 4,
            "error": false
        }))
        .expect("object record");

        assert_eq!(record.field(JobField::JobDescription), "");
        assert_eq!(record.field(JobField::TechnologyStack), "Rust, Go, 3");
        assert_eq!(record.field(JobField::CompanyLocation), "");
        assert_eq!(record.extra.get("index"), Some(&json!(4)));
        assert!(!record.is_error());
    }

    #[test]
    fn error_marker_uses_truthiness() {
        let flagged = |value: Value| {
            JobRecord::from_value(json!({ "error": value }))
                .expect("record")
                .is_error()
        };
        assert!(flagged(json!(true)));
        assert!(flagged(json!(1)));
        assert!(flagged(json!("timeout")));
        assert!(!flagged(json!(false)));
        assert!(!flagged(json!(0)));
        assert!(!flagged(json!(null)));
        assert!(!JobRecord::default().is_error());
    }

    #[test]
    fn non_objects_are_not_records() {
        assert!(JobRecord::from_value(json!("text")).is_none());
        assert!(JobRecord::from_value(json!([1, 2])).is_none());
    }
}
