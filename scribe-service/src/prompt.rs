// Prompt text sent to the chat models
use chrono::Local;

pub const CURRENT_DATE_TIME_PLACEHOLDER: &str = "{current_date_time}";

/// Audio longer than this gets a summarised transcript from Gemini.
pub const SUMMARIZE_AFTER_MS: u64 = 3 * 60 * 1000;

pub const DEFAULT_EXTRACTION_PROMPT: &str = "\
You are given a clinical encounter as typed notes and/or a transcript of dictated audio. \
Extract the relevant data and fill the requested form fields.

Rules:
1. Only use information that is actually present in the encounter. Do not guess or assume context.
2. Write coded entries in readable terms, for example \"A32Q Brain Hemorrhage\" becomes \"Brain Hemorrhage\".
3. Translate non-English content to English before filling fields.
4. Fields that the encounter does not mention stay null. You do not have to fill every field.

Notes:
- Use `note` only for context that cannot be expressed in `value`.
- \"SpO2 is 20%, it had spiked to 50% an hour ago\" gives value \"20%\" and note \"Spiked to 50% an hour ago\".
- \"SpO2 is 20%\" gives value \"20%\" and a null note.

Current date and time: {current_date_time}";

const TRANSCRIBE_INSTRUCTION: &str = "\
Transcribe the attached audio of a clinical encounter. Translate any non-English speech to English. \
Return only the transcript text. If the audio contains no speech, return an empty response.";

const SUMMARIZE_INSTRUCTION: &str = "\
Write a short summarised transcription of the attached audio of a clinical encounter in English, \
keeping every clinical finding, value and instruction. Return only the text. \
If the audio contains no speech, return an empty response.";

/// System prompt for the extraction call.
///
/// A host override replaces the built-in text; the placeholder is filled in
/// either way.
pub fn system_prompt(override_prompt: Option<&str>) -> String {
    let template = override_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT);
    let now = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    template.replace(CURRENT_DATE_TIME_PLACEHOLDER, &now)
}

pub fn transcription_instruction(summarize: bool) -> &'static str {
    if summarize {
        SUMMARIZE_INSTRUCTION
    } else {
        TRANSCRIBE_INSTRUCTION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_filled() {
        let prompt = system_prompt(None);
        assert!(!prompt.contains(CURRENT_DATE_TIME_PLACEHOLDER));
        assert!(prompt.contains("Current date and time: 20"));
    }

    #[test]
    fn test_override_replaces_default() {
        let prompt = system_prompt(Some("Fill the triage form. Now: {current_date_time}"));
        assert!(prompt.starts_with("Fill the triage form. Now: "));
        assert!(!prompt.contains("Rules:"));

        assert!(system_prompt(Some("  ")).contains("Rules:"));
    }
}
