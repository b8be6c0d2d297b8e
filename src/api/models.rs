use serde::{Deserialize, Serialize};

use crate::controller::Phase;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub url: String,
    #[serde(default)]
    pub company: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub phase: Phase,
}
