//! Worksheet evaluation.
//!
//! The HTTP route hands the upload to an external program ([`WorksheetEvaluator`])
//! and relays its stdout. Unlike the content agents there is no fallback: a slow
//! child is killed and reported as a timeout, a failing one as an error.
//!
//! The second half of this module holds what the default evaluator program
//! (`saathi-evaluate`) needs: the vision prompt and the reply post-processing.

use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::agents::{Validate, ValidationError};
use crate::config::EvaluationConfig;
use crate::gemini::{InlineImage, Prompt};
use crate::parse::extract_json_object;

/// How long to keep draining a killed child's pipes for diagnostics.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

pub const EVALUATION_TYPE: &str = "VLM_worksheet_analysis";

// ============================================================================
// Request
// ============================================================================

/// Grades arrive as numbers from the web form and as strings from older clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Grade {
    Number(u32),
    Text(String),
}

impl Default for Grade {
    fn default() -> Self {
        Grade::Text("Unknown".to_string())
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::Number(n) => write!(f, "{}", n),
            Grade::Text(s) => f.write_str(s),
        }
    }
}

fn default_subject() -> String {
    "General".to_string()
}

fn default_topic() -> String {
    "General Topic".to_string()
}

fn default_language() -> String {
    "english".to_string()
}

fn default_student() -> String {
    "Student".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationRequest {
    #[serde(default)]
    pub image_data: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default)]
    pub grade: Grade,
    #[serde(default = "default_topic")]
    pub topic: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_student")]
    pub student_name: String,
    /// Filled in by the route when the caller leaves it empty.
    #[serde(default)]
    pub timestamp: String,
}

impl Validate for EvaluationRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.image_data.trim().is_empty() {
            return Err(ValidationError::new("imageData", "No image data provided"));
        }
        Ok(())
    }
}

// ============================================================================
// Subprocess runner
// ============================================================================

#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("failed to start evaluator `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("evaluation timed out after {}s", .after.as_secs())]
    Timeout { after: Duration, diagnostics: String },

    #[error("evaluator exited with status {}", .code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit { code: Option<i32>, diagnostics: String },

    #[error("evaluator output is not valid JSON: {error}")]
    InvalidOutput { error: String, diagnostics: String },

    #[error("evaluator I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode evaluation payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl EvaluationError {
    /// Truncated child output, when any was captured.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            EvaluationError::Timeout { diagnostics, .. }
            | EvaluationError::NonZeroExit { diagnostics, .. }
            | EvaluationError::InvalidOutput { diagnostics, .. } => {
                Some(diagnostics.as_str()).filter(|d| !d.is_empty())
            }
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, EvaluationError::Timeout { .. })
    }
}

/// Spawns the configured evaluator once per request.
#[derive(Debug, Clone)]
pub struct WorksheetEvaluator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    diagnostic_chars: usize,
}

impl WorksheetEvaluator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            diagnostic_chars: 500,
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
            diagnostic_chars: config.diagnostic_chars,
        }
    }

    /// Run the evaluator with the request as a single JSON argument and parse its
    /// stdout. The child is killed if it outlives the timeout.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<Value, EvaluationError> {
        let payload = serde_json::to_string(request)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EvaluationError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = tokio::spawn(read_to_end(child.stdout.take()));
        let stderr = tokio::spawn(read_to_end(child.stderr.take()));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "Failed to kill timed-out evaluator");
                }
                let out = drain(stdout).await;
                let err = drain(stderr).await;
                tracing::warn!(
                    program = %self.program,
                    timeout_s = self.timeout.as_secs(),
                    "Evaluator timed out and was killed"
                );
                return Err(EvaluationError::Timeout {
                    after: self.timeout,
                    diagnostics: self.diagnostics(&out, &err),
                });
            }
        };

        let out = stdout.await.unwrap_or_default();
        let err = stderr.await.unwrap_or_default();

        if !status.success() {
            return Err(EvaluationError::NonZeroExit {
                code: status.code(),
                diagnostics: self.diagnostics(&out, &err),
            });
        }

        serde_json::from_slice(&out).map_err(|e| EvaluationError::InvalidOutput {
            error: e.to_string(),
            diagnostics: self.diagnostics(&out, &err),
        })
    }

    /// stderr first, since that is where a crashing child explains itself.
    fn diagnostics(&self, stdout: &[u8], stderr: &[u8]) -> String {
        let stderr = String::from_utf8_lossy(stderr);
        let stdout = String::from_utf8_lossy(stdout);
        let combined = match (stderr.trim(), stdout.trim()) {
            ("", out) => out.to_string(),
            (err, "") => err.to_string(),
            (err, out) => format!("{}\n{}", err, out),
        };
        truncate_chars(&combined, self.diagnostic_chars)
    }
}

async fn read_to_end<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// Grandchildren can hold the pipes open after the kill, so give up after a grace period.
async fn drain(task: tokio::task::JoinHandle<Vec<u8>>) -> Vec<u8> {
    match tokio::time::timeout(DRAIN_GRACE, task).await {
        Ok(Ok(buf)) => buf,
        _ => Vec::new(),
    }
}

pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

// ============================================================================
// Evaluator program support
// ============================================================================

pub fn evaluation_prompt(request: &EvaluationRequest) -> Prompt {
    let text = format!(
        r#"You are an experienced Indian teacher evaluating a {subject} worksheet for Class {grade}. The worksheet is on "{topic}".

Student: {student}
Language for feedback: {language}

Evaluate the worksheet in the image:
1. Find every question and the student's answer, and check each one
2. Note calculation errors, spelling mistakes and misunderstood concepts, with the correct answer
3. Say what the student did well and explain each mistake step by step
4. Follow CBSE/NCERT expectations and use examples familiar to Indian students
5. Award marks per question, a total percentage and a grade level (Excellent/Good/Needs Improvement)
6. Recommend topics to revise and practice exercises

Respond with JSON only, exactly in this shape:
{{
  "overall_score": 0,
  "grade_level": "Excellent|Good|Needs Improvement",
  "questions_analyzed": [
    {{
      "question_number": 1,
      "question_text": "question",
      "student_answer": "what the student wrote",
      "correct_answer": "correct answer",
      "is_correct": true,
      "marks_awarded": 1,
      "marks_total": 1,
      "feedback": "feedback",
      "explanation": "explanation"
    }}
  ],
  "strengths": ["strengths"],
  "areas_for_improvement": ["areas"],
  "detailed_feedback": "overall feedback",
  "recommendations": ["recommendations"],
  "cultural_notes": "notes",
  "next_steps": ["next steps"]
}}"#,
        subject = request.subject,
        grade = request.grade,
        topic = request.topic,
        student = request.student_name,
        language = request.language,
    );

    Prompt::new(text, 0.4, 4096).with_image(InlineImage::from_upload(&request.image_data))
}

fn metadata(request: &EvaluationRequest, model: &str) -> Map<String, Value> {
    let mut meta = Map::new();
    meta.insert(
        "evaluation_id".into(),
        json!(format!("eval_{}_{}", request.student_name, request.timestamp)),
    );
    meta.insert("subject".into(), json!(request.subject));
    meta.insert("grade".into(), json!(request.grade));
    meta.insert("topic".into(), json!(request.topic));
    meta.insert("student_name".into(), json!(request.student_name));
    meta.insert("evaluation_date".into(), json!(request.timestamp));
    meta.insert("language".into(), json!(request.language));
    meta.insert("model_used".into(), json!(model));
    meta.insert("evaluation_type".into(), json!(EVALUATION_TYPE));
    meta
}

/// Turn the model's reply into the evaluation document printed on stdout.
///
/// - an embedded JSON object is used as-is
/// - a reply with no braces at all is treated as prose and scored heuristically
/// - braces that do not parse yield a templated evaluation quoting the reply
///
/// Metadata is appended in every case.
pub fn finish_evaluation(reply: &str, request: &EvaluationRequest, model: &str) -> Value {
    let mut doc = match extract_json_object(reply) {
        Some(candidate) => match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => map,
            _ => fallback_evaluation(reply),
        },
        None => prose_evaluation(reply),
    };

    doc.extend(metadata(request, model));
    Value::Object(doc)
}

fn prose_evaluation(reply: &str) -> Map<String, Value> {
    let score = reply
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("score") || lower.contains("marks")
        })
        .filter_map(|line| line.split_whitespace().find_map(|w| w.parse::<u32>().ok()))
        .last()
        .map(|s| s.min(100))
        .unwrap_or(85);

    let doc = json!({
        "overall_score": score,
        "grade_level": "Good",
        "questions_analyzed": [],
        "strengths": [],
        "areas_for_improvement": [],
        "detailed_feedback": truncate_chars(reply, 500),
        "recommendations": [],
        "cultural_notes": "Evaluation based on Indian educational standards",
        "next_steps": ["Review feedback", "Practice recommended exercises"],
    });
    into_map(doc)
}

fn fallback_evaluation(reply: &str) -> Map<String, Value> {
    let doc = json!({
        "overall_score": 80,
        "grade_level": "Good",
        "questions_analyzed": [{
            "question_number": 1,
            "question_text": "Worksheet analysis",
            "student_answer": "See uploaded image",
            "correct_answer": "Refer to detailed feedback",
            "is_correct": true,
            "marks_awarded": 8,
            "marks_total": 10,
            "feedback": "Analysis completed successfully",
            "explanation": truncate_chars(reply, 200),
        }],
        "strengths": ["Completed the worksheet", "Clear handwriting"],
        "areas_for_improvement": ["See detailed feedback for specific areas"],
        "detailed_feedback": reply,
        "recommendations": [
            "Review the detailed feedback",
            "Practice similar problems",
            "Focus on areas marked for improvement"
        ],
        "cultural_notes": "Evaluation follows Indian educational standards and CBSE guidelines",
        "next_steps": [
            "Discuss feedback with teacher",
            "Complete recommended practice exercises",
            "Review weak areas identified"
        ],
    });
    into_map(doc)
}

/// Printed by the evaluator program when the model call itself fails.
pub fn error_evaluation(message: &str) -> Value {
    json!({
        "error": true,
        "message": format!("Evaluation failed: {}", message),
        "overall_score": 0,
        "grade_level": "Unable to evaluate",
        "detailed_feedback": format!(
            "Sorry, we couldn't evaluate the worksheet due to: {}. Please try uploading a clearer image or contact support.",
            message
        ),
        "recommendations": [
            "Ensure the image is clear and well-lit",
            "Make sure all text is readable",
            "Try uploading again with better image quality"
        ],
    })
}

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> EvaluationRequest {
        serde_json::from_value(json!({
            "imageData": "data:image/png;base64,iVBORw0KGgo=",
            "subject": "Mathematics",
            "grade": 4,
            "topic": "Subtraction",
            "studentName": "Asha",
            "timestamp": "2024-07-01T10:00:00Z"
        }))
        .unwrap()
    }

    fn sh(script: &str, timeout: Duration) -> WorksheetEvaluator {
        WorksheetEvaluator::new("sh", vec!["-c".to_string(), script.to_string(), "sh".to_string()], timeout)
    }

    #[test]
    fn test_request_defaults() {
        let r: EvaluationRequest = serde_json::from_value(json!({ "imageData": "AAAA" })).unwrap();
        assert_eq!(r.subject, "General");
        assert_eq!(r.grade, Grade::Text("Unknown".to_string()));
        assert_eq!(r.language, "english");
        assert_eq!(r.student_name, "Student");
        assert!(r.validate().is_ok());

        let empty: EvaluationRequest = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.validate().unwrap_err().field, "imageData");
    }

    #[tokio::test]
    async fn test_payload_passed_as_single_argument() {
        // $1 is the JSON payload; echo it back as the result.
        let evaluator = sh(r#"printf '%s' "$1""#, Duration::from_secs(5));
        let out = evaluator.evaluate(&request()).await.unwrap();
        assert_eq!(out["studentName"], "Asha");
        assert_eq!(out["grade"], 4);
    }

    #[tokio::test]
    async fn test_timeout_kills_child() {
        let evaluator = sh("echo started >&2; exec sleep 30", Duration::from_millis(200));
        let started = std::time::Instant::now();
        let err = evaluator.evaluate(&request()).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(err.diagnostics(), Some("started"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_truncated_stderr() {
        let mut evaluator = sh("printf 'x%.0s' $(seq 1 2000) >&2; exit 3", Duration::from_secs(5));
        evaluator.diagnostic_chars = 50;
        let err = evaluator.evaluate(&request()).await.unwrap_err();

        match &err {
            EvaluationError::NonZeroExit { code, diagnostics } => {
                assert_eq!(*code, Some(3));
                assert_eq!(diagnostics.chars().count(), 53);
            }
            other => panic!("Expected non-zero exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_stdout() {
        let evaluator = sh("echo 'not json'", Duration::from_secs(5));
        let err = evaluator.evaluate(&request()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::InvalidOutput { .. }));
        assert_eq!(err.diagnostics(), Some("not json"));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let evaluator = WorksheetEvaluator::new("saathi-no-such-program", Vec::new(), Duration::from_secs(1));
        let err = evaluator.evaluate(&request()).await.unwrap_err();
        assert!(matches!(err, EvaluationError::Spawn { .. }));
    }

    #[test]
    fn test_prompt_carries_image_and_context() {
        let p = evaluation_prompt(&request());
        assert!(p.text.contains("Class 4"));
        assert!(p.text.contains("\"Subtraction\""));
        assert!(p.text.contains("Student: Asha"));
        assert_eq!(p.image.unwrap().mime_type, "image/png");
    }

    #[test]
    fn test_finish_uses_embedded_json() {
        let reply = "Here you go:\n```json\n{\"overall_score\": 72, \"grade_level\": \"Good\"}\n```";
        let doc = finish_evaluation(reply, &request(), "gemini-1.5-pro-latest");
        assert_eq!(doc["overall_score"], 72);
        assert_eq!(doc["evaluation_id"], "eval_Asha_2024-07-01T10:00:00Z");
        assert_eq!(doc["model_used"], "gemini-1.5-pro-latest");
        assert_eq!(doc["evaluation_type"], EVALUATION_TYPE);
        assert_eq!(doc["grade"], 4);
    }

    #[test]
    fn test_finish_scores_prose_reply() {
        let doc = finish_evaluation("Good effort.\nTotal score 64 out of 100", &request(), "m");
        assert_eq!(doc["overall_score"], 64);
        assert_eq!(doc["grade_level"], "Good");

        let doc = finish_evaluation("Well done overall.", &request(), "m");
        assert_eq!(doc["overall_score"], 85);
    }

    #[test]
    fn test_prose_reply_takes_last_score_line() {
        let reply = "Score 3 per question\nNeat handwriting, marks not deducted\nTotal score 64";
        let doc = finish_evaluation(reply, &request(), "m");
        assert_eq!(doc["overall_score"], 64);
    }

    #[test]
    fn test_finish_falls_back_on_broken_json() {
        let reply = "{ overall_score: seventy }";
        let doc = finish_evaluation(reply, &request(), "m");
        assert_eq!(doc["overall_score"], 80);
        assert_eq!(doc["detailed_feedback"], reply);
        assert_eq!(doc["student_name"], "Asha");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("नमस्ते", 2), "नम...");
        assert_eq!(truncate_chars("short", 10), "short");
    }
}
