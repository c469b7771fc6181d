use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::types::InferenceResult;

/// Character budget for the short message in the unlabeled fallback
pub const SMS_CHAR_BUDGET: usize = 160;

/// Substituted when nothing usable could be extracted for the message
pub const DEFAULT_SMS_DRAFT: &str =
    "EMERGENCY! I need immediate assistance at my location. Please send help.";

/// Substituted when no guidance steps could be extracted
pub const DEFAULT_GUIDANCE_STEPS: [&str; 3] = [
    "Stay calm and move somewhere safe if you can",
    "Call your local emergency number",
    "Follow the dispatcher's instructions until help arrives",
];

/// Guidance used when the output carries no recognizable labels at all
pub const FALLBACK_GUIDANCE_STEPS: [&str; 3] = [
    "Assess the situation carefully",
    "Ensure your own safety first",
    "Call emergency services at 911",
];

// Optional markdown decoration (`**`, `##`, `- `) is tolerated around labels
static SMS_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[#>*_-]+\s*)?(?:sms\s+draft|sms|short\s+message|message)\s*[*_]*\s*:\s*[*_]*\s*(.*)$")
        .expect("valid SMS label pattern")
});

static GUIDANCE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[#>*_-]+\s*)?(?:guidance\s+steps|guidance|steps)\s*[*_]*\s*:\s*[*_]*\s*(.*)$")
        .expect("valid guidance label pattern")
});

static NUMBERED_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*[*_]*\s*(\d+)\s*[.):\-]\s*(.*)$").expect("valid numbered line pattern")
});

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Sms,
    Guidance,
}

/// Turns raw model output into an [`InferenceResult`].
pub struct ResponseAssembler;

impl ResponseAssembler {
    /// Parses raw model text. Total: every input yields a non-empty message and
    /// a non-empty step list.
    pub fn parse(raw: &str) -> InferenceResult {
        let (mut sms_draft, mut guidance_steps) = match Self::parse_labeled(raw) {
            Some(parsed) => parsed,
            None => {
                debug!("No labels found in model output, using fallback packing");
                (
                    Self::pack_words(raw, SMS_CHAR_BUDGET),
                    FALLBACK_GUIDANCE_STEPS.iter().map(|s| s.to_string()).collect(),
                )
            }
        };

        if sms_draft.trim().is_empty() {
            sms_draft = DEFAULT_SMS_DRAFT.to_string();
        }
        guidance_steps.retain(|step| !step.trim().is_empty());
        if guidance_steps.is_empty() {
            guidance_steps = DEFAULT_GUIDANCE_STEPS.iter().map(|s| s.to_string()).collect();
        }

        InferenceResult { sms_draft, guidance_steps }
    }

    /// Line scan for the labeled sections. `None` when neither label occurs.
    fn parse_labeled(raw: &str) -> Option<(String, Vec<String>)> {
        let mut section = Section::None;
        let mut found_label = false;
        let mut sms_parts: Vec<String> = Vec::new();
        let mut steps: Vec<String> = Vec::new();

        for line in raw.lines() {
            if let Some(caps) = GUIDANCE_LABEL.captures(line) {
                found_label = true;
                section = Section::Guidance;
                let rest = caps.get(1).map_or("", |m| m.as_str());
                Self::push_step_line(rest, &mut steps);
                continue;
            }
            if let Some(caps) = SMS_LABEL.captures(line) {
                found_label = true;
                section = Section::Sms;
                let rest = clean(caps.get(1).map_or("", |m| m.as_str()));
                if !rest.is_empty() {
                    sms_parts.push(rest);
                }
                continue;
            }

            match section {
                Section::Sms => {
                    let text = clean(line);
                    if text.is_empty() {
                        // The message ends at the first blank line once it has content
                        if !sms_parts.is_empty() {
                            section = Section::None;
                        }
                    } else {
                        sms_parts.push(text);
                    }
                }
                Section::Guidance => Self::push_step_line(line, &mut steps),
                Section::None => {}
            }
        }

        if !found_label {
            return None;
        }
        Some((sms_parts.join(" "), steps))
    }

    /// Numbered lines open a step; other non-blank lines continue the previous one.
    fn push_step_line(line: &str, steps: &mut Vec<String>) {
        if let Some(caps) = NUMBERED_LINE.captures(line) {
            let content = clean(caps.get(2).map_or("", |m| m.as_str()));
            if !content.is_empty() {
                steps.push(content);
            }
            return;
        }
        let text = clean(line);
        if text.is_empty() {
            return;
        }
        if let Some(last) = steps.last_mut() {
            last.push(' ');
            last.push_str(&text);
        }
    }

    /// Greedily packs whitespace-delimited words into at most `budget` characters.
    pub fn pack_words(raw: &str, budget: usize) -> String {
        let mut packed = String::new();
        let mut used = 0;

        for word in raw.split_whitespace() {
            let len = word.chars().count();
            if packed.is_empty() {
                if len > budget {
                    return word.chars().take(budget).collect();
                }
                packed.push_str(word);
                used = len;
            } else if used + 1 + len <= budget {
                packed.push(' ');
                packed.push_str(word);
                used += 1 + len;
            } else {
                break;
            }
        }
        packed
    }
}

/// Trims whitespace and stray markdown emphasis from a line.
fn clean(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .trim_matches('"')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labeled_output() {
        let result = ResponseAssembler::parse("SMS Draft: Help now\nGuidance Steps:\n1. Call 911\n2. Stay calm");
        assert_eq!(result.sms_draft, "Help now");
        assert_eq!(result.guidance_steps, vec!["Call 911", "Stay calm"]);
    }

    #[test]
    fn test_markdown_labels_and_separators() {
        let raw = "**SMS Draft:** \"Car crash on Route 9, two injured.\"\n\n## Guidance Steps:\n1) Turn on hazard lights\n2: Check for injuries\n3 - Keep injured people still";
        let result = ResponseAssembler::parse(raw);
        assert_eq!(result.sms_draft, "Car crash on Route 9, two injured.");
        assert_eq!(
            result.guidance_steps,
            vec!["Turn on hazard lights", "Check for injuries", "Keep injured people still"]
        );
    }

    #[test]
    fn test_message_continues_until_blank_line() {
        let raw = "SMS:\nFire in the kitchen,\nsmoke spreading.\n\nSome commentary.\nSteps:\n1. Get out";
        let result = ResponseAssembler::parse(raw);
        assert_eq!(result.sms_draft, "Fire in the kitchen, smoke spreading.");
        assert_eq!(result.guidance_steps, vec!["Get out"]);
    }

    #[test]
    fn test_wrapped_step_lines_are_joined() {
        let raw = "Guidance Steps:\n1. Apply firm pressure\n   to the wound\n2. Elevate the limb";
        let result = ResponseAssembler::parse(raw);
        assert_eq!(result.guidance_steps, vec!["Apply firm pressure to the wound", "Elevate the limb"]);
        assert_eq!(result.sms_draft, DEFAULT_SMS_DRAFT);
    }

    #[test]
    fn test_only_message_label_gets_default_steps() {
        let result = ResponseAssembler::parse("Short message: Need an ambulance");
        assert_eq!(result.sms_draft, "Need an ambulance");
        assert_eq!(result.guidance_steps.len(), DEFAULT_GUIDANCE_STEPS.len());
    }

    #[test]
    fn test_unlabeled_text_falls_back() {
        let result = ResponseAssembler::parse("just some rambling text without structure");
        assert_eq!(result.sms_draft, "just some rambling text without structure");
        assert_eq!(result.guidance_steps, FALLBACK_GUIDANCE_STEPS.to_vec());
    }

    #[test]
    fn test_fallback_respects_character_budget() {
        let raw = "word ".repeat(100);
        let result = ResponseAssembler::parse(&raw);
        assert!(result.sms_draft.chars().count() <= SMS_CHAR_BUDGET);
        assert!(result.sms_draft.starts_with("word word"));

        let long_word = "x".repeat(400);
        assert_eq!(ResponseAssembler::pack_words(&long_word, SMS_CHAR_BUDGET).len(), SMS_CHAR_BUDGET);
    }

    #[test]
    fn test_empty_input_uses_defaults() {
        for raw in ["", "   \n\t ", "SMS Draft:\nGuidance Steps:\n"] {
            let result = ResponseAssembler::parse(raw);
            assert!(!result.sms_draft.is_empty());
            assert!(!result.guidance_steps.is_empty());
        }
        assert_eq!(ResponseAssembler::parse("").sms_draft, DEFAULT_SMS_DRAFT);
    }

    #[test]
    fn test_serializes_with_camel_case_keys() {
        let result = ResponseAssembler::parse("SMS Draft: Help now\nGuidance Steps:\n1. Call 911");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["smsDraft"], "Help now");
        assert_eq!(json["guidanceSteps"][0], "Call 911");
    }
}
