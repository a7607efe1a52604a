//! Teaching aid agent: worksheets, flashcards and short activity stories.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::flashcards::{is_visual_topic, topic_flashcards, Flashcard};
use super::{
    activity, lenient, require_grade, require_text, Agent, AgentKind, GeneratedContent, Validate,
    ValidationError,
};
use crate::activity::NewActivity;
use crate::gemini::Prompt;
use crate::pipeline::DEMO_NOTE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AidType {
    Worksheet,
    Flashcard,
    Story,
}

impl fmt::Display for AidType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AidType::Worksheet => "worksheet",
            AidType::Flashcard => "flashcard",
            AidType::Story => "story",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingAidRequest {
    pub subject: String,
    pub grade: u32,
    pub topic: String,
    pub language: String,
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(rename = "type")]
    pub aid_type: AidType,
}

impl Validate for TeachingAidRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("subject", &self.subject)?;
        require_text("topic", &self.topic)?;
        require_text("language", &self.language)?;
        require_grade("grade", self.grade)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeachingAid {
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient")]
    pub instructions: String,
    #[serde(default, deserialize_with = "lenient")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cultural_context: String,
    #[serde(default, deserialize_with = "lenient")]
    pub assessment_criteria: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub variations: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub time_required: String,
    #[serde(default, deserialize_with = "lenient")]
    pub visual_elements: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub extensions: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub local_connections: String,
    #[serde(default, deserialize_with = "lenient")]
    pub flashcards: Vec<Flashcard>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GeneratedContent for TeachingAid {
    fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TeachingAids;

impl Agent for TeachingAids {
    type Request = TeachingAidRequest;
    type Output = TeachingAid;

    const KIND: AgentKind = AgentKind::TeachingAid;

    fn build_prompt(&self, r: &TeachingAidRequest) -> Prompt {
        let materials = r.materials.join(", ");
        let text = format!(
            r#"Create a {kind} for an Indian rural multi-grade classroom.

Subject: {subject}
Grade: {grade}
Topic: {topic}
Language: {language}
Available materials: {materials}

Requirements:
1. Use Indian names, examples, festivals and food
2. Work in a low-resource classroom with only the listed materials
3. Engage seeing, hearing and doing
4. Use a Hindi/English mix only where it helps understanding
5. Describe any visual elements the teacher should draw
6. Connect to everyday rural life

Respond with JSON only, exactly in this shape:
{{
  "title": "title of the teaching aid",
  "description": "what this teaches",
  "content": "the full content with examples",
  "instructions": "step-by-step instructions for the teacher",
  "materials": ["materials used, from the available list"],
  "culturalContext": "links to Indian culture and daily life",
  "assessmentCriteria": ["criteria"],
  "variations": ["variations for different learners"],
  "timeRequired": "estimated time",
  "visualElements": ["visual elements to include"],
  "extensions": ["follow-up activities"],
  "localConnections": "local festivals, traditions and places"
}}"#,
            kind = r.aid_type,
            subject = r.subject,
            grade = r.grade,
            topic = r.topic,
            language = r.language,
            materials = materials,
        );

        Prompt::new(text, 0.8, 3000)
    }

    fn fallback(&self, r: &TeachingAidRequest) -> TeachingAid {
        let materials = r.materials.join(", ");
        let (title, content, flashcards) = match r.aid_type {
            AidType::Flashcard => (
                format!("{} Image Flashcards - {}", r.subject, r.topic),
                format!("Picture flashcard set for {} using familiar objects", r.topic),
                topic_flashcards(&r.subject, &r.topic),
            ),
            other => (
                format!("{} {} - {}", r.subject, other, r.topic),
                format!("Sample {} content for {} in {}", other, r.topic, r.language),
                Vec::new(),
            ),
        };

        TeachingAid {
            title,
            description: format!("Demo {} for grade {}", r.aid_type, r.grade),
            content,
            instructions: format!(
                "Step-by-step instructions for using {} to teach {}",
                materials, r.topic
            ),
            materials: r.materials.clone(),
            cultural_context: "Sample cultural context for Indian students".to_string(),
            assessment_criteria: Vec::new(),
            variations: Vec::new(),
            time_required: String::new(),
            visual_elements: Vec::new(),
            extensions: Vec::new(),
            local_connections: String::new(),
            flashcards,
            note: Some(DEMO_NOTE.to_string()),
        }
    }

    fn echo(&self, r: &TeachingAidRequest, output: &mut TeachingAid) {
        output.materials = r.materials.clone();
    }

    fn enrich_live(&self, r: &TeachingAidRequest, output: &mut TeachingAid) {
        if r.aid_type == AidType::Flashcard && is_visual_topic(&r.topic) {
            output.flashcards = topic_flashcards(&r.subject, &r.topic);
        }
    }

    fn activity(&self, r: &TeachingAidRequest) -> NewActivity {
        activity(
            Self::KIND,
            format!("Teaching aid: {}", r.topic),
            format!("{} for {} grade {}", r.aid_type, r.subject, r.grade),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::top_level_keys;

    fn shapes(aid_type: AidType) -> TeachingAidRequest {
        TeachingAidRequest {
            subject: "Mathematics".to_string(),
            grade: 2,
            topic: "Shapes".to_string(),
            language: "hindi".to_string(),
            materials: vec!["chalk".to_string(), "blackboard".to_string()],
            aid_type,
        }
    }

    #[test]
    fn test_type_is_validated_by_decoding() {
        let bad = serde_json::from_value::<TeachingAidRequest>(serde_json::json!({
            "subject": "Maths", "grade": 2, "topic": "Shapes",
            "language": "hindi", "materials": [], "type": "poster"
        }));
        assert!(bad.is_err());
    }

    #[test]
    fn test_flashcard_fallback_has_cards() {
        let aid = TeachingAids.fallback(&shapes(AidType::Flashcard));
        assert_eq!(aid.flashcards.len(), 3);
        assert_eq!(aid.title, "Mathematics Image Flashcards - Shapes");
    }

    #[test]
    fn test_worksheet_fallback_keeps_empty_flashcards_key() {
        let v = serde_json::to_value(TeachingAids.fallback(&shapes(AidType::Worksheet))).unwrap();
        assert_eq!(v["flashcards"], serde_json::json!([]));
        assert_eq!(v["title"], "Mathematics worksheet - Shapes");
        assert_eq!(v["materials"], serde_json::json!(["chalk", "blackboard"]));
    }

    #[test]
    fn test_live_flashcards_enriched_for_visual_topics() {
        let mut live: TeachingAid = serde_json::from_value(serde_json::json!({
            "title": "Shapes around the village",
            "content": "Look for circles at the well..."
        }))
        .unwrap();
        TeachingAids.enrich_live(&shapes(AidType::Flashcard), &mut live);
        assert_eq!(live.flashcards.len(), 3);

        let live_keys = top_level_keys(&serde_json::to_value(&live).unwrap());
        let fallback_keys =
            top_level_keys(&serde_json::to_value(TeachingAids.fallback(&shapes(AidType::Flashcard))).unwrap());
        assert_eq!(live_keys, fallback_keys);
    }

    #[test]
    fn test_worksheet_not_enriched() {
        let mut live: TeachingAid = serde_json::from_value(serde_json::json!({
            "title": "Shapes",
            "content": "..."
        }))
        .unwrap();
        TeachingAids.enrich_live(&shapes(AidType::Worksheet), &mut live);
        assert!(live.flashcards.is_empty());
    }

    #[test]
    fn test_prompt_parameters() {
        let p = TeachingAids.build_prompt(&shapes(AidType::Worksheet));
        assert!(p.text.starts_with("Create a worksheet"));
        assert!(p.text.contains("Available materials: chalk, blackboard"));
        assert_eq!(p.temperature, 0.8);
        assert_eq!(p.max_output_tokens, 3000);
    }

    #[test]
    fn test_fallback_is_deterministic() {
        for aid_type in [AidType::Flashcard, AidType::Worksheet, AidType::Story] {
            let a = serde_json::to_string(&TeachingAids.fallback(&shapes(aid_type))).unwrap();
            let b = serde_json::to_string(&TeachingAids.fallback(&shapes(aid_type))).unwrap();
            assert_eq!(a, b, "{} fallback differs between calls", aid_type);
        }
    }
}
