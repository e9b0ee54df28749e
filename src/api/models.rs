use serde::{Deserialize, Serialize};

pub const ROOT_MESSAGE: &str = "GPT-2 Text Generation API is running!";

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    #[serde(default = "default_max_length")]
    pub max_length: i64,
}

fn default_max_length() -> i64 {
    100
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerationResponse {
    pub generated_text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RootResponse {
    pub message: String,
}

/// Body of a 422 reply, one entry per rejected field.
#[derive(Debug, Deserialize, Serialize)]
pub struct ValidationErrorResponse {
    pub detail: Vec<ValidationErrorDetail>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ValidationErrorDetail {
    pub loc: Vec<String>,
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}
