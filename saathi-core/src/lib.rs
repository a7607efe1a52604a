pub mod activity;
pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod evaluation;
pub mod gemini;
pub mod parse;
pub mod pipeline;

pub use activity::{
    record_best_effort, ActivityError, ActivityRecord, ActivitySink, MemoryActivityLog, NewActivity,
    PgActivityLog,
};
pub use agents::{
    Agent, AgentKind, Assessments, ImageAnalyst, LessonPlans, Storyteller, TeachingAids,
    Translator,
};
pub use config::SaathiConfig;
pub use error::SaathiError;
pub use evaluation::{EvaluationError, EvaluationRequest, WorksheetEvaluator};
pub use gemini::{ApiKey, GeminiClient, GenerationClient, GenerationClientError, InlineImage, Prompt};
pub use parse::{parse_response, ParseFailure};
pub use pipeline::{Generation, GenerationError, Generator, DEMO_NOTE};
