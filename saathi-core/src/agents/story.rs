//! Storyteller agent: moral stories with classroom activities.

use serde::{Deserialize, Serialize};

use super::{
    activity, join_grades, lenient, require_grades, require_text, Agent, AgentKind,
    GeneratedContent, Validate, ValidationError,
};
use crate::activity::NewActivity;
use crate::gemini::Prompt;
use crate::pipeline::DEMO_NOTE;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRequest {
    pub theme: String,
    pub grades: Vec<u32>,
    pub language: String,
    pub moral: String,
    #[serde(default)]
    pub characters: Vec<String>,
}

impl Validate for StoryRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        require_text("theme", &self.theme)?;
        require_text("language", &self.language)?;
        require_text("moral", &self.moral)?;
        require_grades("grades", &self.grades)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub title: String,
    pub content: String,
    #[serde(default, deserialize_with = "lenient")]
    pub moral: String,
    #[serde(default, deserialize_with = "lenient")]
    pub characters: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub setting: String,
    #[serde(default, deserialize_with = "lenient")]
    pub key_events: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub vocabulary_words: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub discussion_questions: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub activities: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cultural_context: String,
    #[serde(default, deserialize_with = "lenient")]
    pub reading_level: String,
    #[serde(default, deserialize_with = "lenient")]
    pub time_to_read: String,
    #[serde(default, deserialize_with = "lenient")]
    pub extension_activities: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cross_curricular_connections: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub parent_engagement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl GeneratedContent for Story {
    fn set_note(&mut self, note: Option<String>) {
        self.note = note;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Storyteller;

impl Agent for Storyteller {
    type Request = StoryRequest;
    type Output = Story;

    const KIND: AgentKind = AgentKind::Story;

    fn build_prompt(&self, r: &StoryRequest) -> Prompt {
        let text = format!(
            r#"Write an educational story for grades {grades} in {language} about {theme}.

Characters: {characters}
Moral: {moral}

Set it somewhere Indian children will recognise.

Requirements:
1. Indian names, festivals, food and traditions
2. Language and ideas suited to the grades
3. The moral should come out of the plot, not a lecture
4. Include moments where the class can join in
5. Finish with discussion points and activities

Respond with JSON only, exactly in this shape:
{{
  "title": "story title",
  "content": "full story text with dialogue",
  "moral": "{moral}",
  "characters": ["character names"],
  "setting": "where the story happens",
  "keyEvents": ["main events"],
  "vocabularyWords": ["new words"],
  "discussionQuestions": ["questions for the class"],
  "activities": ["follow-up activities"],
  "culturalContext": "Indian cultural elements used",
  "readingLevel": "reading level",
  "timeToRead": "estimated reading time",
  "extensionActivities": ["creative projects"],
  "crossCurricularConnections": ["links to other subjects"],
  "parentEngagement": "how parents can help at home"
}}"#,
            grades = join_grades(&r.grades),
            language = r.language,
            theme = r.theme,
            characters = r.characters.join(", "),
            moral = r.moral,
        );

        Prompt::new(text, 0.8, 3072)
    }

    fn fallback(&self, r: &StoryRequest) -> Story {
        Story {
            title: format!("Story about {}", r.theme),
            content: format!(
                "A sample story about {} with characters {} that teaches the moral: {}",
                r.theme,
                r.characters.join(", "),
                r.moral
            ),
            moral: r.moral.clone(),
            characters: r.characters.clone(),
            setting: String::new(),
            key_events: Vec::new(),
            vocabulary_words: Vec::new(),
            discussion_questions: Vec::new(),
            activities: vec![
                "Discussion questions".to_string(),
                "Role-play activity".to_string(),
                "Art activity".to_string(),
            ],
            cultural_context: String::new(),
            reading_level: format!("Grades {}", join_grades(&r.grades)),
            time_to_read: String::new(),
            extension_activities: Vec::new(),
            cross_curricular_connections: Vec::new(),
            parent_engagement: String::new(),
            note: Some(DEMO_NOTE.to_string()),
        }
    }

    fn echo(&self, r: &StoryRequest, output: &mut Story) {
        output.moral = r.moral.clone();
        output.characters = r.characters.clone();
    }

    fn activity(&self, r: &StoryRequest) -> NewActivity {
        activity(
            Self::KIND,
            format!("Story: {}", r.theme),
            format!("Grades {} in {}", join_grades(&r.grades), r.language),
        )
    }
}
