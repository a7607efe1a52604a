//! Lesson plan agent for multi-grade classrooms.

use serde::{Deserialize, Serialize};

use super::{
    activity, join_grades, lenient, require_grades, require_text, Agent, AgentKind,
    GeneratedContent, Validate, ValidationError,
};
use crate::activity::NewActivity;
use crate::gemini::Prompt;
use crate::pipeline::DEMO_NOTE;

const INTRO_MINUTES: u32 = 5;
const WRAP_UP_MINUTES: u32 = 10;
const MAX_TIME_LIMIT: u32 = 480;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlanRequest {
    pub subject: String,
    pub grades: Vec<u32>,
    /// Lesson length in minutes.
    pub time_limit: u32,
    pub topic: String,
    pub language: String,
    #[serde(default)]
    pub materials: Vec<String>,
}

impl Validate for LessonPlanRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("subject", &self.subject)?;
        require_text("topic", &self.topic)?;
        require_text("language", &self.language)?;
        require_grades("grades", &self.grades)?;
        if self.time_limit == 0 || self.time_limit > MAX_TIME_LIMIT {
            return Err(ValidationError::new(
                "timeLimit",
                format!("must be between 1 and {} minutes", MAX_TIME_LIMIT),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub activity: String,
    pub duration: u32,
    #[serde(default, deserialize_with = "lenient")]
    pub grades: Vec<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: String,
    #[serde(default, deserialize_with = "lenient")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub instructions: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonPlan {
    pub title: String,
    pub objective: String,
    pub time_breakdown: Vec<TimeBlock>,
    #[serde(default, deserialize_with = "lenient")]
    pub materials: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub instructions: String,
    #[serde(default, deserialize_with = "lenient")]
    pub adaptations: String,
    #[serde(default, deserialize_with = "lenient")]
    pub assessment_strategies: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cultural_connections: String,
    #[serde(default, deserialize_with = "lenient")]
    pub extensions: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub safety_considerations: String,
    #[serde(default, deserialize_with = "lenient")]
    pub inclusivity_notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GeneratedContent for LessonPlan {
    fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

/// Intro, main activity, wrap-up. Lessons shorter than intro plus wrap-up get a
/// zero-length main block rather than a negative one.
fn default_breakdown(r: &LessonPlanRequest) -> Vec<TimeBlock> {
    let main = r.time_limit.saturating_sub(INTRO_MINUTES + WRAP_UP_MINUTES);
    [
        ("Introduction", INTRO_MINUTES, format!("Introduce {} with a familiar example", r.topic)),
        ("Main Activity", main, format!("Grade-wise group work on {}", r.topic)),
        ("Wrap-up", WRAP_UP_MINUTES, "Recap and quick oral questions".to_string()),
    ]
    .into_iter()
    .map(|(name, duration, description)| TimeBlock {
        activity: name.to_string(),
        duration,
        grades: r.grades.clone(),
        description,
        materials: Vec::new(),
        instructions: String::new(),
    })
    .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LessonPlans;

impl Agent for LessonPlans {
    type Request = LessonPlanRequest;
    type Output = LessonPlan;

    const KIND: AgentKind = AgentKind::LessonPlan;

    fn build_prompt(&self, r: &LessonPlanRequest) -> Prompt {
        let text = format!(
            r#"Plan a {minutes}-minute {subject} lesson on "{topic}" for a multi-grade class covering grades {grades}. Teach in {language}. Available materials: {materials}.

Students of different ages learn together in one room, so every activity needs a variant for each grade.

Requirements:
1. Use Indian names, festivals, food and rural life as examples
2. Use only the listed materials, creatively
3. Include seeing, hearing and doing
4. Use a Hindi/English mix only where it helps understanding
5. Differentiate activities per grade
6. Durations in timeBreakdown must add up to {minutes} minutes

Respond with JSON only, exactly in this shape:
{{
  "title": "lesson title",
  "objective": "learning objectives",
  "timeBreakdown": [
    {{
      "activity": "activity name",
      "duration": 10,
      "grades": [3, 4],
      "description": "what happens",
      "materials": ["materials for this activity"],
      "instructions": "step-by-step instructions"
    }}
  ],
  "materials": ["all materials needed"],
  "instructions": "overall teaching instructions",
  "adaptations": "how to adapt for grades and learning styles",
  "assessmentStrategies": ["ways to check understanding"],
  "culturalConnections": "Indian cultural and real-world links",
  "extensions": ["follow-up activities or homework"],
  "safetyConsiderations": "safety notes",
  "inclusivityNotes": "support for students with different needs"
}}"#,
            minutes = r.time_limit,
            subject = r.subject,
            topic = r.topic,
            grades = join_grades(&r.grades),
            language = r.language,
            materials = r.materials.join(", "),
        );

        Prompt::new(text, 0.7, 2048)
    }

    fn fallback(&self, r: &LessonPlanRequest) -> LessonPlan {
        LessonPlan {
            title: format!("{} Lesson Plan - {}", r.subject, r.topic),
            objective: format!(
                "Students will learn about {} through hands-on activities",
                r.topic
            ),
            time_breakdown: default_breakdown(r),
            materials: r.materials.clone(),
            instructions: "Detailed instructions for multi-grade teaching".to_string(),
            adaptations: "Activities can be adapted for different skill levels".to_string(),
            assessment_strategies: vec!["Oral questions during wrap-up".to_string()],
            cultural_connections: String::new(),
            extensions: Vec::new(),
            safety_considerations: String::new(),
            inclusivity_notes: String::new(),
            note: Some(DEMO_NOTE.to_string()),
        }
    }

    fn echo(&self, r: &LessonPlanRequest, output: &mut LessonPlan) {
        output.materials = r.materials.clone();
    }

    fn activity(&self, r: &LessonPlanRequest) -> NewActivity {
        activity(
            Self::KIND,
            format!("Lesson plan: {}", r.topic),
            format!(
                "{} for grades {}, {} minutes",
                r.subject,
                join_grades(&r.grades),
                r.time_limit
            ),
        )
    }
}
