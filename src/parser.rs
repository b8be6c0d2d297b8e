use serde::Serialize;

pub const NOT_FOUND: &str = "Not found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedFields {
    pub company: String,
    pub title: String,
}

impl Default for ExtractedFields {
    fn default() -> Self {
        Self {
            company: NOT_FOUND.to_string(),
            title: NOT_FOUND.to_string(),
        }
    }
}

/// Pulls "Company Name" and "Job Title" out of the model's reply.
/// Unrecognised lines are ignored and a later match overwrites an earlier one.
pub fn parse_fields(text: &str) -> ExtractedFields {
    let mut fields = ExtractedFields::default();

    for line in text.lines() {
        if line.contains("Company Name") {
            fields.company = value_after_colon(line);
        } else if line.contains("Job Title") {
            fields.title = value_after_colon(line);
        }
    }

    fields
}

fn value_after_colon(line: &str) -> String {
    line.split_once(':')
        .map(|(_, value)| value.trim().to_string())
        .unwrap_or_default()
}
