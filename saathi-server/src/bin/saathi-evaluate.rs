//! Default worksheet evaluator.
//!
//! Spawned by the server with the request as one JSON argument. Prints the
//! evaluation document on stdout and exits non-zero when no evaluation could
//! be produced. Logs go to stderr so stdout stays pure JSON.

use std::process::ExitCode;

use clap::Parser;
use saathi_core::agents::Validate;
use saathi_core::config::GeminiConfig;
use saathi_core::evaluation::{error_evaluation, evaluation_prompt, finish_evaluation, EvaluationRequest};
use saathi_core::{GeminiClient, GenerationClient, SaathiConfig};
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Evaluate a student worksheet photo with Gemini vision")]
struct Args {
    /// Read Gemini settings from this config file instead of the defaults
    #[arg(short, long)]
    config: Option<String>,

    /// JSON payload: imageData, subject, grade, topic, language, studentName, timestamp
    payload: Option<String>,
}

fn emit(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!("{}", value),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let Some(payload) = args.payload else {
        emit(&json!({ "error": "No input data provided" }));
        return ExitCode::FAILURE;
    };

    let request: EvaluationRequest = match serde_json::from_str(&payload) {
        Ok(r) => r,
        Err(e) => {
            emit(&json!({ "error": format!("Invalid input data: {}", e) }));
            return ExitCode::FAILURE;
        }
    };

    if request.validate().is_err() {
        emit(&json!({ "error": "No image data provided" }));
        return ExitCode::FAILURE;
    }

    let gemini = match args.config {
        Some(path) => match SaathiConfig::load(&path) {
            Ok(c) => c.gemini,
            Err(e) => {
                emit(&error_evaluation(&e.to_string()));
                return ExitCode::FAILURE;
            }
        },
        None => GeminiConfig::default(),
    };

    let Some(client) = GeminiClient::from_config(&gemini) else {
        emit(&error_evaluation("no valid Gemini API key configured"));
        return ExitCode::FAILURE;
    };

    tracing::info!(topic = %request.topic, model = client.model(), "Evaluating worksheet");

    match client.generate(&evaluation_prompt(&request)).await {
        Ok(reply) => {
            emit(&finish_evaluation(&reply, &request, client.model()));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gemini call failed");
            emit(&error_evaluation(&e.to_string()));
            ExitCode::FAILURE
        }
    }
}
