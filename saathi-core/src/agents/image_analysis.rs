//! Image analysis agent: teaching ideas from a classroom photo.

use serde::{Deserialize, Serialize};

use super::{activity, lenient, require_text, Agent, AgentKind, GeneratedContent, Validate, ValidationError};
use crate::activity::NewActivity;
use crate::gemini::{InlineImage, Prompt};
use crate::pipeline::DEMO_NOTE;

const PROMPT: &str = r#"Look at this image and suggest how a teacher in an Indian school could use it.

Requirements:
1. Identify the visible objects, people and scenes
2. Suggest concepts that could be taught from it
3. Give questions at three difficulty levels
4. Relate it to Indian culture and daily life
5. Suggest hands-on activities

Respond with JSON only, exactly in this shape:
{
  "description": "what the image shows",
  "elements": ["key elements"],
  "educationalConcepts": ["concepts to teach"],
  "gradeLevel": "suggested grades",
  "subjectAreas": ["related subjects"],
  "discussionQuestions": {
    "beginner": ["questions for younger students"],
    "intermediate": ["questions for middle grades"],
    "advanced": ["questions for older students"]
  },
  "activities": ["hands-on activities"],
  "culturalContext": "relevance to Indian students",
  "vocabularyWords": ["new words"],
  "realWorldConnections": ["links to daily life"],
  "assessmentIdeas": ["ways to check understanding"],
  "materialsSuggested": ["materials for related activities"]
}"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysisRequest {
    /// Raw base64 or a `data:image/...;base64,` URL.
    #[serde(alias = "image_data")]
    pub image_data: String,
}

impl Validate for ImageAnalysisRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("imageData", &self.image_data)?;
        if InlineImage::from_upload(&self.image_data).data.is_empty() {
            return Err(ValidationError::new("imageData", "data URL has no payload"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeveledQuestions {
    #[serde(default, deserialize_with = "lenient")]
    pub beginner: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub intermediate: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub advanced: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub description: String,
    #[serde(default, deserialize_with = "lenient")]
    pub elements: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub educational_concepts: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub grade_level: String,
    #[serde(default, deserialize_with = "lenient")]
    pub subject_areas: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub discussion_questions: LeveledQuestions,
    #[serde(default, deserialize_with = "lenient")]
    pub activities: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cultural_context: String,
    #[serde(default, deserialize_with = "lenient")]
    pub vocabulary_words: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub real_world_connections: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub assessment_ideas: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub materials_suggested: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GeneratedContent for ImageAnalysis {
    fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAnalyst;

impl Agent for ImageAnalyst {
    type Request = ImageAnalysisRequest;
    type Output = ImageAnalysis;

    const KIND: AgentKind = AgentKind::ImageAnalysis;

    fn build_prompt(&self, r: &ImageAnalysisRequest) -> Prompt {
        Prompt::new(PROMPT, 0.4, 2048).with_image(InlineImage::from_upload(&r.image_data))
    }

    fn fallback(&self, _r: &ImageAnalysisRequest) -> ImageAnalysis {
        ImageAnalysis {
            description: "Image analysis is unavailable right now".to_string(),
            elements: Vec::new(),
            educational_concepts: Vec::new(),
            grade_level: String::new(),
            subject_areas: Vec::new(),
            discussion_questions: LeveledQuestions {
                beginner: vec!["What do you see in this picture?".to_string()],
                intermediate: vec!["Where might you find this in your village or town?".to_string()],
                advanced: vec!["What question would you ask about this picture?".to_string()],
            },
            activities: vec!["Draw and label what you see".to_string()],
            cultural_context: String::new(),
            vocabulary_words: Vec::new(),
            real_world_connections: Vec::new(),
            assessment_ideas: Vec::new(),
            materials_suggested: Vec::new(),
            note: Some(DEMO_NOTE.to_string()),
        }
    }

    fn activity(&self, r: &ImageAnalysisRequest) -> NewActivity {
        let image = InlineImage::from_upload(&r.image_data);
        activity(
            Self::KIND,
            "Image analysis".to_string(),
            format!("{} image, {} base64 chars", image.mime_type, image.data.len()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::top_level_keys;

    fn upload() -> ImageAnalysisRequest {
        ImageAnalysisRequest {
            image_data: "data:image/png;base64,iVBORw0KGgo=".to_string(),
        }
    }

    #[test]
    fn test_prompt_carries_image() {
        let p = ImageAnalyst.build_prompt(&upload());
        let image = p.image.expect("image attached");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "iVBORw0KGgo=");
        assert!(p.text.contains("\"discussionQuestions\""));
    }

    #[test]
    fn test_shape_matches_live() {
        let live: ImageAnalysis = serde_json::from_value(serde_json::json!({
            "description": "A market stall with vegetables",
            "discussionQuestions": { "beginner": ["Count the tomatoes"] }
        }))
        .unwrap();
        let live_keys = top_level_keys(&serde_json::to_value(live).unwrap());
        let fallback_keys = top_level_keys(&serde_json::to_value(ImageAnalyst.fallback(&upload())).unwrap());
        assert_eq!(live_keys, fallback_keys);
    }

    #[test]
    fn test_snake_case_alias_accepted() {
        let r: ImageAnalysisRequest =
            serde_json::from_value(serde_json::json!({ "image_data": "AAAA" })).unwrap();
        assert_eq!(r.image_data, "AAAA");
    }

    #[test]
    fn test_empty_data_url_rejected() {
        let r = ImageAnalysisRequest {
            image_data: "data:image/png;base64,".to_string(),
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = serde_json::to_string(&ImageAnalyst.fallback(&upload())).unwrap();
        let b = serde_json::to_string(&ImageAnalyst.fallback(&upload())).unwrap();
        assert_eq!(a, b);
    }
}
