//! Prompt templates for vision-model image descriptions.
//!
//! Every prompt lives here so that changing the wording for one language
//! touches exactly one place, and so tests can inspect the templates without
//! calling a model. Callers can override the template via
//! [`crate::config::ExtractionConfig::description_prompt`].

use crate::config::Language;

/// English description prompt. Also the fallback for unsupported languages.
pub const ENGLISH_PROMPT: &str = "Describe this image in detail.";

/// Arabic description prompt.
pub const ARABIC_PROMPT: &str = "صف هذه الصورة بالتفصيل.";

/// Spanish description prompt.
pub const SPANISH_PROMPT: &str = "Describe esta imagen en detalle.";

/// The description prompt for `language`.
pub fn description_prompt(language: Language) -> &'static str {
    match language {
        Language::English => ENGLISH_PROMPT,
        Language::Arabic => ARABIC_PROMPT,
        Language::Spanish => SPANISH_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_language_has_a_distinct_prompt() {
        let prompts = [
            description_prompt(Language::English),
            description_prompt(Language::Arabic),
            description_prompt(Language::Spanish),
        ];
        assert_eq!(prompts[0], ENGLISH_PROMPT);
        assert_ne!(prompts[0], prompts[1]);
        assert_ne!(prompts[1], prompts[2]);
    }

    #[test]
    fn unsupported_language_uses_english_prompt() {
        assert_eq!(description_prompt(Language::parse("French")), ENGLISH_PROMPT);
    }
}
