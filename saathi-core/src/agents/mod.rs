//! Content-generation agents.
//!
//! An agent is a prompt template, a fallback template and an echo rule for one
//! content type. The shared orchestration lives in [`crate::pipeline::Generator`].

pub mod assessment;
pub mod flashcards;
pub mod image_analysis;
pub mod lesson_plan;
pub mod story;
pub mod teaching_aid;
pub mod translation;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::activity::NewActivity;
use crate::gemini::Prompt;

pub use assessment::Assessments;
pub use image_analysis::ImageAnalyst;
pub use lesson_plan::LessonPlans;
pub use story::Storyteller;
pub use teaching_aid::TeachingAids;
pub use translation::Translator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentKind {
    TeachingAid,
    LessonPlan,
    Assessment,
    Translation,
    Story,
    ImageAnalysis,
}

impl AgentKind {
    pub const ALL: [AgentKind; 6] = [
        AgentKind::TeachingAid,
        AgentKind::LessonPlan,
        AgentKind::Assessment,
        AgentKind::Translation,
        AgentKind::Story,
        AgentKind::ImageAnalysis,
    ];

    /// Path segment under `/api/agents/`.
    pub fn slug(self) -> &'static str {
        match self {
            AgentKind::TeachingAid => "teaching-aids",
            AgentKind::LessonPlan => "lesson-plan",
            AgentKind::Assessment => "assessment",
            AgentKind::Translation => "multilingual",
            AgentKind::Story => "storyteller",
            AgentKind::ImageAnalysis => "image-analysis",
        }
    }

    /// Value stored in `activities.type`.
    pub fn activity_type(self) -> &'static str {
        match self {
            AgentKind::TeachingAid => "teaching_aid",
            AgentKind::LessonPlan => "lesson_plan",
            AgentKind::Assessment => "assessment",
            AgentKind::Translation => "translation",
            AgentKind::Story => "story",
            AgentKind::ImageAnalysis => "image_analysis",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Semantic checks that serde's structural decoding cannot express.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Output types share a `note` slot that only fallback content fills.
pub trait GeneratedContent: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn set_note(&mut self, note: Option<String>);
}

pub trait Agent: Send + Sync + 'static {
    type Request: DeserializeOwned + Validate + Send + Sync + 'static;
    type Output: GeneratedContent;

    const KIND: AgentKind;

    fn build_prompt(&self, request: &Self::Request) -> Prompt;

    /// Deterministic templated output. Performs no I/O and cannot fail.
    fn fallback(&self, request: &Self::Request) -> Self::Output;

    /// Re-attach request fields that must reach the caller verbatim.
    fn echo(&self, _request: &Self::Request, _output: &mut Self::Output) {}

    /// Post-process a successfully parsed live reply.
    fn enrich_live(&self, _request: &Self::Request, _output: &mut Self::Output) {}

    /// Audit record written after the agent runs.
    fn activity(&self, request: &Self::Request) -> NewActivity;
}

// ============================================================================
// Shared helpers
// ============================================================================

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

pub(crate) fn require_grade(field: &'static str, grade: u32) -> Result<(), ValidationError> {
    if !(1..=12).contains(&grade) {
        return Err(ValidationError::new(field, format!("grade {} is outside 1-12", grade)));
    }
    Ok(())
}

pub(crate) fn require_grades(field: &'static str, grades: &[u32]) -> Result<(), ValidationError> {
    if grades.is_empty() {
        return Err(ValidationError::new(field, "at least one grade is required"));
    }
    grades.iter().try_for_each(|g| require_grade(field, *g))
}

/// Treat an explicit `null` from the model like a missing field.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `[3, 4, 5]` -> `"3-4-5"`
pub(crate) fn join_grades(grades: &[u32]) -> String {
    grades.iter().map(u32::to_string).collect::<Vec<_>>().join("-")
}

pub(crate) fn activity(kind: AgentKind, title: String, description: String) -> NewActivity {
    NewActivity {
        activity_type: kind.activity_type().to_string(),
        title,
        description,
        agent_type: kind.slug().to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_grades() {
        assert_eq!(join_grades(&[3, 4, 5]), "3-4-5");
        assert_eq!(join_grades(&[7]), "7");
    }

    #[test]
    fn test_grade_bounds() {
        assert!(require_grade("grade", 0).is_err());
        assert!(require_grade("grade", 13).is_err());
        assert!(require_grade("grade", 1).is_ok());
        assert!(require_grades("grades", &[]).is_err());
        assert!(require_grades("grades", &[2, 14]).is_err());
    }

    #[test]
    fn test_lenient_maps_null_to_default() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(default, deserialize_with = "lenient")]
            items: Vec<String>,
            #[serde(default, deserialize_with = "lenient")]
            label: String,
        }

        let p: Probe = serde_json::from_str(r#"{"items": null}"#).unwrap();
        assert!(p.items.is_empty());
        assert!(p.label.is_empty());
    }

    #[test]
    fn test_slugs_are_unique() {
        let slugs: std::collections::HashSet<_> = AgentKind::ALL.iter().map(|k| k.slug()).collect();
        assert_eq!(slugs.len(), AgentKind::ALL.len());
    }
}
