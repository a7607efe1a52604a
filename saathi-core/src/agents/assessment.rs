//! Assessment agent: question sets with answers and explanations.

use serde::{Deserialize, Serialize};

use super::{activity, lenient, require_grade, require_text, Agent, AgentKind, GeneratedContent, Validate, ValidationError};
use crate::activity::NewActivity;
use crate::gemini::Prompt;
use crate::pipeline::DEMO_NOTE;

pub const MAX_QUESTIONS: u32 = 50;
pub const MULTIPLE_CHOICE: &str = "multiple-choice";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRequest {
    pub subject: String,
    pub grade: u32,
    pub topic: String,
    pub language: String,
    pub question_count: u32,
}

impl Validate for AssessmentRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("subject", &self.subject)?;
        require_text("topic", &self.topic)?;
        require_text("language", &self.language)?;
        require_grade("grade", self.grade)?;
        if self.question_count == 0 || self.question_count > MAX_QUESTIONS {
            return Err(ValidationError::new(
                "questionCount",
                format!("must be between 1 and {}", MAX_QUESTIONS),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub question: String,
    /// `multiple-choice`, `short-answer`, `verbal` or `practical`.
    #[serde(rename = "type")]
    pub question_type: String,
    #[serde(default, deserialize_with = "lenient")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub correct_answer: String,
    #[serde(default, deserialize_with = "lenient")]
    pub explanation: String,
    #[serde(default, deserialize_with = "lenient")]
    pub cultural_context: String,
    #[serde(default, deserialize_with = "lenient")]
    pub visual_aids: String,
    #[serde(default, deserialize_with = "lenient")]
    pub grading_criteria: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub title: String,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    pub questions: Vec<Question>,
    #[serde(default, deserialize_with = "lenient")]
    pub instructions: String,
    #[serde(default, deserialize_with = "lenient")]
    pub time_required: String,
    #[serde(default, deserialize_with = "lenient")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub adaptations: String,
    #[serde(default, deserialize_with = "lenient")]
    pub scoring_guide: String,
    #[serde(default, deserialize_with = "lenient")]
    pub follow_up_activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GeneratedContent for Assessment {
    fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Assessments;

impl Agent for Assessments {
    type Request = AssessmentRequest;
    type Output = Assessment;

    const KIND: AgentKind = AgentKind::Assessment;

    fn build_prompt(&self, r: &AssessmentRequest) -> Prompt {
        let text = format!(
            r#"Write {count} assessment questions for {subject}, grade {grade}, on the topic "{topic}". Write them in {language}.

The students are in Indian classrooms, often rural and multi-grade. Mix written and verbal components and allow for different learning styles.

Requirements:
1. Use Indian names, festivals, food and everyday situations in the questions
2. Mix question types: multiple-choice, short-answer, verbal, practical
3. Use a Hindi/English mix only where it helps understanding
4. Add visual or hands-on questions where possible
5. Every question needs an explanation students can learn from

Respond with JSON only, exactly in this shape:
{{
  "title": "assessment title",
  "description": "one-line description",
  "questions": [
    {{
      "question": "question text",
      "type": "multiple-choice|short-answer|verbal|practical",
      "options": ["option 1", "option 2", "option 3", "option 4"],
      "correctAnswer": "the correct answer",
      "explanation": "why this answer is correct",
      "culturalContext": "real-world or Indian context",
      "visualAids": "visual aids needed, if any",
      "gradingCriteria": "how to mark the answer"
    }}
  ],
  "instructions": "how to conduct the assessment",
  "timeRequired": "estimated time",
  "materials": ["materials needed"],
  "adaptations": "changes for different learning needs",
  "scoringGuide": "how to score and interpret results",
  "followUpActivities": ["activities based on the results"]
}}

The "questions" array must contain exactly {count} entries."#,
            count = r.question_count,
            subject = r.subject,
            grade = r.grade,
            topic = r.topic,
            language = r.language,
        );

        Prompt::new(text, 0.7, 2048)
    }

    fn fallback(&self, r: &AssessmentRequest) -> Assessment {
        let questions = (1..=r.question_count)
            .map(|i| Question {
                question: format!("Sample question {} about {}", i, r.topic),
                question_type: MULTIPLE_CHOICE.to_string(),
                options: ["Option A", "Option B", "Option C", "Option D"]
                    .iter()
                    .map(|o| o.to_string())
                    .collect(),
                correct_answer: "Option A".to_string(),
                explanation: "Sample explanation for correct answer".to_string(),
                cultural_context: String::new(),
                visual_aids: String::new(),
                grading_criteria: "One mark for the correct option".to_string(),
            })
            .collect();

        Assessment {
            title: format!("{} Assessment - {}", r.subject, r.topic),
            description: format!("Practice assessment on {} for grade {}", r.topic, r.grade),
            questions,
            instructions: "Instructions for conducting the assessment".to_string(),
            time_required: format!("{} minutes", r.question_count * 2),
            materials: Vec::new(),
            adaptations: "Read questions aloud for students who need support".to_string(),
            scoring_guide: format!(
                "One mark per correct answer, {} marks in total",
                r.question_count
            ),
            follow_up_activities: vec!["Review incorrect answers together".to_string()],
            note: Some(DEMO_NOTE.to_string()),
        }
    }

    fn activity(&self, r: &AssessmentRequest) -> NewActivity {
        activity(
            Self::KIND,
            format!("Assessment: {}", r.topic),
            format!("{} questions for {} grade {}", r.question_count, r.subject, r.grade),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::top_level_keys;

    fn fractions() -> AssessmentRequest {
        AssessmentRequest {
            subject: "Mathematics".to_string(),
            grade: 5,
            topic: "Fractions".to_string(),
            language: "english".to_string(),
            question_count: 5,
        }
    }

    #[test]
    fn test_request_uses_camel_case() {
        let r: AssessmentRequest = serde_json::from_value(serde_json::json!({
            "subject": "Mathematics",
            "grade": 5,
            "topic": "Fractions",
            "language": "english",
            "questionCount": 5
        }))
        .unwrap();
        assert_eq!(r.question_count, 5);
    }

    #[test]
    fn test_fallback_matches_demo_scenario() {
        let v = serde_json::to_value(Assessments.fallback(&fractions())).unwrap();

        let questions = v["questions"].as_array().unwrap();
        assert_eq!(questions.len(), 5);
        for q in questions {
            assert!(q["question"].as_str().unwrap().contains("Fractions"));
            assert_eq!(q["type"], "multiple-choice");
            assert_eq!(q["options"].as_array().unwrap().len(), 4);
            assert!(q["correctAnswer"].is_string());
            assert!(q["explanation"].is_string());
        }
        assert!(v["note"].as_str().unwrap().contains("Demo content"));
    }

    #[test]
    fn test_fallback_is_deterministic() {
        let a = serde_json::to_string(&Assessments.fallback(&fractions())).unwrap();
        let b = serde_json::to_string(&Assessments.fallback(&fractions())).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_live_and_fallback_share_shape() {
        let live: Assessment = serde_json::from_value(serde_json::json!({
            "title": "Fractions",
            "questions": [{ "question": "Half of 8?", "type": "short-answer" }]
        }))
        .unwrap();

        let live_keys = top_level_keys(&serde_json::to_value(live).unwrap());
        let fallback_keys = top_level_keys(&serde_json::to_value(Assessments.fallback(&fractions())).unwrap());
        assert_eq!(live_keys, fallback_keys);
    }

    #[test]
    fn test_prompt_embeds_request_fields() {
        let p = Assessments.build_prompt(&fractions());
        assert!(p.text.contains("5 assessment questions"));
        assert!(p.text.contains("Mathematics"));
        assert!(p.text.contains("grade 5"));
        assert!(p.text.contains("\"Fractions\""));
        assert!(p.text.contains("english"));
        assert!(p.text.contains("\"correctAnswer\""));
        assert_eq!(p.max_output_tokens, 2048);
        assert_eq!(p, Assessments.build_prompt(&fractions()));
    }

    #[test]
    fn test_validation() {
        assert!(fractions().validate().is_ok());

        let mut r = fractions();
        r.question_count = 0;
        assert_eq!(r.validate().unwrap_err().field, "questionCount");

        let mut r = fractions();
        r.question_count = MAX_QUESTIONS + 1;
        assert!(r.validate().is_err());

        let mut r = fractions();
        r.topic = "  ".to_string();
        assert_eq!(r.validate().unwrap_err().field, "topic");
    }
}
