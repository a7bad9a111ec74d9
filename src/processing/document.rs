//! Document assembly from individual job records.

use super::sanitize::clean_text;
use super::types::{FieldPriority, JobRecord};

/// Build a single search document from `record`.
///
/// Each prioritized field is cleaned with [`clean_text`]; non-empty results are joined with a
/// single space in priority order. Returns an empty string when nothing survives cleaning,
/// which callers treat as "skip this record".
pub fn assemble_document(record: &JobRecord, priority: &FieldPriority) -> String {
    priority
        .fields()
        .iter()
        .map(|field| clean_text(Some(record.field(*field))))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::types::JobField;

    fn record() -> JobRecord {
        JobRecord {
            company_name_and_location: Some("Acme, NYC".into()),
            technology_stack: Some("Go, Rust".into()),
            job_description: Some("Apply at https://x.co now".into()),
            ..JobRecord::default()
        }
    }

    #[test]
    fn default_priority_orders_description_stack_location() {
        let document = assemble_document(&record(), &FieldPriority::default());
        assert_eq!(document, "Apply at now Go, Rust Acme, NYC");
    }

    #[test]
    fn custom_priority_controls_order() {
        let priority = FieldPriority::new(vec![
            JobField::TechnologyStack,
            JobField::JobDescription,
        ])
        .expect("valid");
        assert_eq!(assemble_document(&record(), &priority), "Go, Rust Apply at now");
    }

    #[test]
    fn skips_fields_that_clean_to_nothing() {
        let record = JobRecord {
            technology_stack: Some("  https://stack.io  ".into()),
            job_description: Some("Backend role".into()),
            ..JobRecord::default()
        };
        assert_eq!(
            assemble_document(&record, &FieldPriority::default()),
            "Backend role"
        );
    }

    #[test]
    fn empty_when_no_prioritized_field_has_text() {
        let record = JobRecord {
            job_description: Some("Only a description".into()),
            ..JobRecord::default()
        };
        let priority = FieldPriority::new(vec![JobField::CompanyLocation]).expect("valid");
        assert_eq!(assemble_document(&record, &priority), "");
    }
}
