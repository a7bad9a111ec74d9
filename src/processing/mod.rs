//! Job-record pipeline: valid-job filtering, text cleaning, and document assembly.

pub mod document;
pub mod filter;
pub mod sanitize;
mod service;
pub mod types;

pub use document::assemble_document;
pub use filter::{PersistOutcome, RawExtraction, filter_valid, write_valid_jobs};
pub use sanitize::clean_text;
pub use service::{PreprocessReporter, Preprocessor, TracingReporter, preprocess_job_data};
pub use types::{FieldPriority, JobField, JobRecord, PreprocessError};
