use serde::{Deserialize, Serialize};

/// Structured output of one inference: an SMS-sized message and ordered steps.
///
/// Always fully populated; see [`ResponseAssembler`](super::ResponseAssembler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub sms_draft: String,
    pub guidance_steps: Vec<String>,
}
