//! Preprocessing pipeline turning persisted job records into search documents.

use rayon::prelude::*;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::Path;

use super::document::assemble_document;
use super::types::{FieldPriority, JobRecord, PreprocessError};

/// Observer for pipeline progress and data-quality anomalies.
///
/// The pipeline never logs through a global; it reports here instead so callers decide where
/// the events go. All methods default to no-ops.
pub trait PreprocessReporter: Send + Sync {
    /// Called once per run with the field order in use.
    fn priority_selected(&self, _priority: &FieldPriority) {}

    /// A record at `index` was excluded because of its error marker.
    fn record_excluded(&self, _index: usize) {}

    /// The entry at `index` was not a JSON object and could not be read as a job.
    fn entry_skipped(&self, _index: usize) {}

    /// The record at `index` produced an empty document.
    fn empty_document(&self, _index: usize) {}

    /// The run finished with `documents` documents out of `total_entries` loaded entries.
    fn completed(&self, _documents: usize, _total_entries: usize) {}
}

/// Reporter forwarding pipeline events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PreprocessReporter for TracingReporter {
    fn priority_selected(&self, priority: &FieldPriority) {
        tracing::info!(
            priority = %priority,
            "Using field priority order (earlier fields get higher weight in embedding)"
        );
    }

    fn record_excluded(&self, index: usize) {
        tracing::debug!(index, "Excluding job flagged as error");
    }

    fn entry_skipped(&self, index: usize) {
        tracing::warn!(index, "Job entry is not an object, skipping");
    }

    fn empty_document(&self, index: usize) {
        tracing::warn!(index, "Job resulted in empty document, skipping");
    }

    fn completed(&self, documents: usize, total_entries: usize) {
        tracing::info!(documents, total_entries, "Preprocessed job listings");
    }
}

/// Runs the preprocessing pipeline with a fixed field priority.
///
/// Construct once and reuse across files; the preprocessor holds no per-run state.
pub struct Preprocessor {
    priority: FieldPriority,
    reporter: Box<dyn PreprocessReporter>,
}

impl Preprocessor {
    /// Create a preprocessor that reports through [`TracingReporter`].
    pub fn new(priority: FieldPriority) -> Self {
        Self {
            priority,
            reporter: Box::new(TracingReporter),
        }
    }

    /// Replace the reporter receiving pipeline events.
    pub fn with_reporter(mut self, reporter: Box<dyn PreprocessReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Field order used for document assembly.
    pub fn priority(&self) -> &FieldPriority {
        &self.priority
    }

    /// Load `path` and return one document per valid, non-empty job record.
    pub fn preprocess(&self, path: &Path) -> Result<Vec<String>, PreprocessError> {
        let entries = load_entries(path)?;
        Ok(self.documents_from_entries(entries))
    }

    /// Produce documents for already-loaded records, applying the same filtering as files.
    pub fn preprocess_records(&self, records: &[JobRecord]) -> Vec<String> {
        self.reporter.priority_selected(&self.priority);
        let mut documents = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            if let Some(document) = self.document_for(index, record) {
                documents.push(document);
            }
        }
        self.reporter.completed(documents.len(), records.len());
        documents
    }

    /// Preprocess several files in parallel.
    ///
    /// Results are returned in the order of `paths`, and documents within each file keep the
    /// order of their records.
    pub fn preprocess_many<P>(&self, paths: &[P]) -> Vec<Result<Vec<String>, PreprocessError>>
    where
        P: AsRef<Path> + Sync,
    {
        paths
            .par_iter()
            .map(|path| self.preprocess(path.as_ref()))
            .collect()
    }

    fn documents_from_entries(&self, entries: Vec<Value>) -> Vec<String> {
        self.reporter.priority_selected(&self.priority);
        let total = entries.len();
        let mut documents = Vec::with_capacity(total);
        for (index, entry) in entries.into_iter().enumerate() {
            let Some(record) = JobRecord::from_value(entry) else {
                self.reporter.entry_skipped(index);
                continue;
            };
            if let Some(document) = self.document_for(index, &record) {
                documents.push(document);
            }
        }
        self.reporter.completed(documents.len(), total);
        documents
    }

    fn document_for(&self, index: usize, record: &JobRecord) -> Option<String> {
        if record.is_error() {
            self.reporter.record_excluded(index);
            return None;
        }
        let document = assemble_document(record, &self.priority);
        if document.is_empty() {
            self.reporter.empty_document(index);
            None
        } else {
            Some(document)
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(FieldPriority::default())
    }
}

/// Preprocess the job file at `path` for embedding.
///
/// `field_priority` names fields by symbol (`job_description`, `technology_stack`,
/// `company_location`); `None` selects the default order. Events are logged via `tracing`.
pub fn preprocess_job_data(
    path: impl AsRef<Path>,
    field_priority: Option<&[&str]>,
) -> Result<Vec<String>, PreprocessError> {
    let priority = match field_priority {
        Some(symbols) => FieldPriority::parse(symbols)?,
        None => FieldPriority::default(),
    };
    Preprocessor::new(priority).preprocess(path.as_ref())
}

fn load_entries(path: &Path) -> Result<Vec<Value>, PreprocessError> {
    let bytes = fs::read(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => PreprocessError::NotFound {
            path: path.to_path_buf(),
        },
        _ => PreprocessError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let value: Value =
        serde_json::from_slice(&bytes).map_err(|error| PreprocessError::InvalidFormat {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

    match value {
        Value::Array(entries) => Ok(entries),
        Value::Object(_) => Ok(vec![value]),
        _ => Err(PreprocessError::InvalidFormat {
            path: path.to_path_buf(),
            reason: "expected a JSON array or object".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::types::JobField;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Excluded(usize),
        Skipped(usize),
        Empty(usize),
        Completed(usize, usize),
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<Event>>>);

    impl Recorder {
        fn events(&self) -> Vec<Event> {
            self.0.lock().expect("lock").clone()
        }
    }

    impl PreprocessReporter for Recorder {
        fn record_excluded(&self, index: usize) {
            self.0.lock().expect("lock").push(Event::Excluded(index));
        }
        fn entry_skipped(&self, index: usize) {
            self.0.lock().expect("lock").push(Event::Skipped(index));
        }
        fn empty_document(&self, index: usize) {
            self.0.lock().expect("lock").push(Event::Empty(index));
        }
        fn completed(&self, documents: usize, total_entries: usize) {
            self.0
                .lock()
                .expect("lock")
                .push(Event::Completed(documents, total_entries));
        }
    }

    fn write_json(dir: &tempfile::TempDir, name: &str, value: &Value) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_vec(value).expect("encode")).expect("write");
        path
    }

    #[test]
    fn reports_every_dropped_position() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_json(
            &dir,
            "jobs.json",
            &json!([
                { "job_description": "Rust engineer" },
                { "job_description": "", "error": true },
                "not a job",
                { "technology_stack": "   " },
                { "company_name_and_location": "Acme, Remote" }
            ]),
        );
        let recorder = Recorder::default();
        let documents = Preprocessor::default()
            .with_reporter(Box::new(recorder.clone()))
            .preprocess(&path)
            .expect("preprocess");

        assert_eq!(documents, vec!["Rust engineer", "Acme, Remote"]);
        assert_eq!(
            recorder.events(),
            vec![
                Event::Excluded(1),
                Event::Skipped(2),
                Event::Empty(3),
                Event::Completed(2, 5),
            ]
        );
    }

    #[test]
    fn single_object_file_is_one_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_json(&dir, "one.json", &json!({ "job_description": "Solo" }));
        let documents = Preprocessor::default().preprocess(&path).expect("preprocess");
        assert_eq!(documents, vec!["Solo"]);
    }

    #[test]
    fn scalar_file_is_a_format_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_json(&dir, "scalar.json", &json!(42));
        let error = Preprocessor::default().preprocess(&path).unwrap_err();
        assert!(matches!(error, PreprocessError::InvalidFormat { .. }));
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.json");
        let error = Preprocessor::default().preprocess(&path).unwrap_err();
        assert!(matches!(error, PreprocessError::NotFound { .. }));
        assert!(error.to_string().contains("absent.json"));
    }

    #[test]
    fn invalid_priority_symbol_fails_before_reading() {
        let error = preprocess_job_data("does-not-matter.json", Some(&["salary"][..])).unwrap_err();
        assert!(matches!(error, PreprocessError::InvalidField { .. }));
    }

    #[test]
    fn in_memory_records_follow_priority() {
        let records = vec![JobRecord {
            job_description: Some("Write code".into()),
            company_name_and_location: Some("Acme (Berlin)".into()),
            ..JobRecord::default()
        }];
        let priority =
            FieldPriority::new(vec![JobField::CompanyLocation, JobField::JobDescription])
                .expect("valid");
        let documents = Preprocessor::new(priority).preprocess_records(&records);
        assert_eq!(documents, vec!["Acme (Berlin) Write code"]);
    }

    #[test]
    fn many_files_keep_input_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths: Vec<_> = (0..8)
            .map(|n| {
                write_json(
                    &dir,
                    &format!("jobs-{n}.json"),
                    &json!([
                        { "job_description": format!("file {n} first") },
                        { "job_description": format!("file {n} second") }
                    ]),
                )
            })
            .collect();

        let results = Preprocessor::default().preprocess_many(&paths);
        assert_eq!(results.len(), 8);
        for (n, result) in results.into_iter().enumerate() {
            assert_eq!(
                result.expect("documents"),
                vec![format!("file {n} first"), format!("file {n} second")]
            );
        }
    }
}
