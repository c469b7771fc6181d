mod assembler;
mod types;

pub use assembler::{
    ResponseAssembler, DEFAULT_GUIDANCE_STEPS, DEFAULT_SMS_DRAFT, FALLBACK_GUIDANCE_STEPS, SMS_CHAR_BUDGET,
};
pub use types::InferenceResult;
