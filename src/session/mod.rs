mod session;
mod types;

pub use session::{Fragments, InferenceSession};
pub use types::{AppendOutcome, Fragment, Modality, PromptRequest, SamplingConfig};
