use clap::ValueEnum;
use serde_json::Value;

use crate::schema::{JobPostings, OpenAIModelFee, WhoIsHiring, json_schema};

const WHO_IS_HIRING_INSTRUCTION: &str = "From the crawled content, extract job posting information including:
- company_name_and_location: Name of the company that is hiring along with the location
- job_description: Description of the job role and requirements
- technology_stack: Technology stack of the desired candidate the company is looking for
- application_details: How to apply for the job
Return the data in the exact JSON schema format specified.";

const MODEL_FEE_INSTRUCTION: &str = "From the crawled content, extract OpenAI model information including:
- model_name: The exact name of the OpenAI model
- input_fee: The cost per input token
- output_fee: The cost per output token
Return the data in the exact JSON schema format specified.";

const POSTINGS_INSTRUCTION: &str = "Extract job postings from HackerNews hiring content.

For each job posting, find:
1. Company name (required)
2. Position/role title (required)
3. Location (if mentioned)
4. Technologies mentioned
5. Contact information

Be precise and extract only what is clearly mentioned.";

/// What to extract, and from which configured page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractionTask {
    /// OpenAI pricing table from `TARGET_URL`.
    #[value(name = "model-fees")]
    ModelFees,
    /// Hiring posts from `TARGET_URL_JOBS`.
    #[value(name = "jobs-remote")]
    RemoteJobs,
    /// Hiring posts from `TARGET_URL_JOBS_LOCAL`.
    #[value(name = "jobs-local")]
    LocalJobs,
    /// Compact postings (company, position, technologies) from `TARGET_URL_JOBS`.
    #[value(name = "postings")]
    Postings,
}

impl ExtractionTask {
    /// Environment variable holding the page to crawl.
    pub fn url_variable(self) -> &'static str {
        match self {
            ExtractionTask::ModelFees => "TARGET_URL",
            ExtractionTask::RemoteJobs | ExtractionTask::Postings => "TARGET_URL_JOBS",
            ExtractionTask::LocalJobs => "TARGET_URL_JOBS_LOCAL",
        }
    }

    /// JSON schema of one extracted record.
    pub fn schema(self) -> Value {
        match self {
            ExtractionTask::ModelFees => json_schema::<OpenAIModelFee>(),
            ExtractionTask::RemoteJobs | ExtractionTask::LocalJobs => json_schema::<WhoIsHiring>(),
            ExtractionTask::Postings => json_schema::<JobPostings>(),
        }
    }

    /// Natural-language instruction sent with every chunk.
    pub fn instruction(self) -> &'static str {
        match self {
            ExtractionTask::ModelFees => MODEL_FEE_INSTRUCTION,
            ExtractionTask::RemoteJobs | ExtractionTask::LocalJobs => WHO_IS_HIRING_INSTRUCTION,
            ExtractionTask::Postings => POSTINGS_INSTRUCTION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cli_names() {
        assert_eq!(
            ExtractionTask::from_str("jobs-local", false),
            Ok(ExtractionTask::LocalJobs)
        );
        assert_eq!(
            ExtractionTask::from_str("model-fees", false),
            Ok(ExtractionTask::ModelFees)
        );
        assert!(ExtractionTask::from_str("jobs", false).is_err());
    }

    #[test]
    fn job_tasks_share_schema_but_not_url() {
        assert_eq!(ExtractionTask::RemoteJobs.schema(), ExtractionTask::LocalJobs.schema());
        assert_ne!(
            ExtractionTask::RemoteJobs.url_variable(),
            ExtractionTask::LocalJobs.url_variable()
        );
        assert!(ExtractionTask::ModelFees.schema()["properties"]["input_fee"].is_object());
    }
}
