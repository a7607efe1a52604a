//! Multilingual agent: classroom text translation.

use serde::{Deserialize, Serialize};

use super::{activity, lenient, require_text, Agent, AgentKind, GeneratedContent, Validate, ValidationError};
use crate::activity::NewActivity;
use crate::gemini::Prompt;
use crate::pipeline::DEMO_NOTE;

const MAX_TEXT_CHARS: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    pub text: String,
    pub from_language: String,
    pub to_language: String,
}

impl Validate for TranslationRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("text", &self.text)?;
        require_text("fromLanguage", &self.from_language)?;
        require_text("toLanguage", &self.to_language)?;
        if self.text.chars().count() > MAX_TEXT_CHARS {
            return Err(ValidationError::new(
                "text",
                format!("longer than {} characters", MAX_TEXT_CHARS),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    #[serde(default, deserialize_with = "lenient")]
    pub original_text: String,
    pub translated_text: String,
    #[serde(default, deserialize_with = "lenient")]
    pub from_language: String,
    #[serde(default, deserialize_with = "lenient")]
    pub to_language: String,
    #[serde(default, deserialize_with = "lenient")]
    pub cultural_notes: String,
    #[serde(default, deserialize_with = "lenient")]
    pub pronunciation_guide: String,
    #[serde(default, deserialize_with = "lenient")]
    pub alternative_translations: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub contextual_usage: String,
    #[serde(default, deserialize_with = "lenient")]
    pub difficulty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GeneratedContent for Translation {
    fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Translator;

impl Agent for Translator {
    type Request = TranslationRequest;
    type Output = Translation;

    const KIND: AgentKind = AgentKind::Translation;

    fn build_prompt(&self, r: &TranslationRequest) -> Prompt {
        let text = format!(
            r#"Translate the text below from {from} to {to} for use in an Indian school.

Requirements:
1. Keep the educational meaning intact
2. Adapt cultural references so Indian students recognise them
3. Keep technical terms where translating them would confuse
4. Add a pronunciation guide if it helps
5. Mention any cultural adaptation you made

Text: "{source}"

Respond with JSON only, exactly in this shape:
{{
  "originalText": "the original text",
  "translatedText": "the translation",
  "fromLanguage": "{from}",
  "toLanguage": "{to}",
  "culturalNotes": "adaptation notes",
  "pronunciationGuide": "pronunciation help",
  "alternativeTranslations": ["other ways to say it"],
  "contextualUsage": "when to use this in class",
  "difficulty": "difficulty level for students"
}}"#,
            from = r.from_language,
            to = r.to_language,
            source = r.text,
        );

        Prompt::new(text, 0.3, 1024)
    }

    fn fallback(&self, r: &TranslationRequest) -> Translation {
        Translation {
            original_text: r.text.clone(),
            translated_text: format!(
                "[TRANSLATED FROM {} TO {}] {}",
                r.from_language.to_uppercase(),
                r.to_language.to_uppercase(),
                r.text
            ),
            from_language: r.from_language.clone(),
            to_language: r.to_language.clone(),
            cultural_notes: String::new(),
            pronunciation_guide: String::new(),
            alternative_translations: Vec::new(),
            contextual_usage: String::new(),
            difficulty: String::new(),
            note: Some(DEMO_NOTE.to_string()),
        }
    }

    fn echo(&self, r: &TranslationRequest, output: &mut Translation) {
        output.original_text = r.text.clone();
        output.from_language = r.from_language.clone();
        output.to_language = r.to_language.clone();
    }

    fn activity(&self, r: &TranslationRequest) -> NewActivity {
        let preview: String = r.text.chars().take(60).collect();
        activity(
            Self::KIND,
            format!("Translation: {} to {}", r.from_language, r.to_language),
            preview,
        )
    }
}
