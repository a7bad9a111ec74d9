//! Record shapes the LLM is asked to fill, exported as JSON schemas.

use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One hiring post from a "Who is Hiring" thread.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WhoIsHiring {
    /// Name of the Company along with posting details who is hiring
    pub company_name_and_location: String,
    /// Technology stack in array that the company requires
    pub technology_stack: String,
    /// Description of the job in detailed manner
    pub job_description: String,
    /// Details about how to apply
    pub application_details: String,
}

/// Pricing for one OpenAI model.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OpenAIModelFee {
    /// Name of the OpenAI model.
    pub model_name: String,
    /// Fee for input token for the OpenAI model.
    pub input_fee: String,
    /// Fee for output token for the OpenAI model.
    pub output_fee: String,
}

/// Basic job posting.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobPosting {
    /// Company name
    pub company: String,
    /// Job position/title
    pub position: String,
    /// Job location (remote, city, etc.)
    pub location: Option<String>,
    /// Technologies, programming languages, frameworks mentioned
    pub technologies: Vec<String>,
    /// Contact email or application instructions
    pub contact_info: Option<String>,
}

/// Container for multiple job postings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobPostings {
    /// List of job postings
    pub jobs: Vec<JobPosting>,
}

/// JSON schema for `T` as a plain JSON value.
pub fn json_schema<T: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn who_is_hiring_schema_lists_all_fields_as_required() {
        let schema = json_schema::<WhoIsHiring>();
        let properties = schema["properties"].as_object().expect("properties");
        for key in [
            "company_name_and_location",
            "technology_stack",
            "job_description",
            "application_details",
        ] {
            assert!(properties.contains_key(key), "missing {key}");
        }
        let required = schema["required"].as_array().expect("required");
        assert_eq!(required.len(), 4);
        assert_eq!(
            properties["job_description"]["description"],
            "Description of the job in detailed manner"
        );
    }

    #[test]
    fn optional_posting_fields_are_not_required() {
        let schema = json_schema::<JobPosting>();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .expect("required")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"company"));
        assert!(!required.contains(&"location"));
        assert!(!required.contains(&"contact_info"));
    }
}
