use aidy::response::{ResponseAssembler, DEFAULT_GUIDANCE_STEPS, FALLBACK_GUIDANCE_STEPS, SMS_CHAR_BUDGET};

#[test]
fn parses_a_typical_model_reply() {
    let raw = "SMS Draft: Elderly man collapsed at 12 Oak St, breathing but unresponsive.\n\n\
               Guidance Steps:\n\
               1. Check that the area is safe\n\
               2. Place him in the recovery position\n   and keep his airway open\n\
               3. Stay on the line with the dispatcher\n";

    let result = ResponseAssembler::parse(raw);

    assert_eq!(result.sms_draft, "Elderly man collapsed at 12 Oak St, breathing but unresponsive.");
    assert_eq!(
        result.guidance_steps,
        vec![
            "Check that the area is safe",
            "Place him in the recovery position and keep his airway open",
            "Stay on the line with the dispatcher",
        ]
    );
}

#[test]
fn unlabeled_reply_is_packed_into_sms_budget() {
    let raw = "word ".repeat(100);

    let result = ResponseAssembler::parse(&raw);

    assert!(result.sms_draft.chars().count() <= SMS_CHAR_BUDGET);
    assert!(result.sms_draft.starts_with("word word"));
    assert_eq!(result.guidance_steps, FALLBACK_GUIDANCE_STEPS.to_vec());
}

#[test]
fn labels_without_steps_fall_back_to_defaults() {
    let result = ResponseAssembler::parse("SMS Draft: Smoke in the kitchen\nGuidance:\n");

    assert_eq!(result.sms_draft, "Smoke in the kitchen");
    assert_eq!(result.guidance_steps, DEFAULT_GUIDANCE_STEPS.to_vec());
}

#[test]
fn empty_output_is_still_fully_populated() {
    let result = ResponseAssembler::parse("");

    assert!(!result.sms_draft.is_empty());
    assert!(!result.guidance_steps.is_empty());
}

#[test]
fn result_serializes_with_camel_case_keys() {
    let result = ResponseAssembler::parse("SMS: Need help\nSteps:\n1. Breathe");
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["smsDraft"], "Need help");
    assert_eq!(json["guidanceSteps"][0], "Breathe");
}
