//! saathi-cli: command-line client for the Saathi HTTP API
//!
//! # Subcommands
//! - `status`: show server health
//! - `generate <agent> --body <json|@file>`: run an agent and print its JSON
//! - `activities [-n <limit>]`: list recent activity records

use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
const DEFAULT_LIMIT: u32 = 20;
const DEGRADED_HEADER: &str = "x-saathi-degraded";

/// Agent name -> route.
const AGENTS: &[(&str, &str)] = &[
    ("teaching-aids", "/api/agents/teaching-aids/generate"),
    ("lesson-plan", "/api/agents/lesson-plan/generate"),
    ("assessment", "/api/agents/assessment/generate"),
    ("multilingual", "/api/agents/multilingual/generate"),
    ("storyteller", "/api/agents/storyteller/generate"),
    ("image-analysis", "/api/agents/image-analysis/analyze"),
    ("evaluation", "/api/agents/evaluation/analyze"),
];

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "saathi-cli", version, about = "Saathi classroom content generator CLI")]
struct Cli {
    /// Saathi HTTP server URL (overrides SAATHI_HTTP_URL env var)
    #[arg(long, env = "SAATHI_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show Saathi server status
    Status,

    /// Run an agent with a JSON request body
    Generate {
        /// teaching-aids, lesson-plan, assessment, multilingual, storyteller,
        /// image-analysis or evaluation
        agent: String,

        /// Request body as inline JSON, or @path to read it from a file
        #[arg(short, long)]
        body: String,
    },

    /// List recent activity records
    Activities {
        /// Maximum number of records to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,
    },
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivitiesResponse {
    pub activities: Vec<Activity>,
    pub count: usize,
}

// ============================================================================
// Helpers
// ============================================================================

pub fn agent_route(agent: &str) -> Option<&'static str> {
    AGENTS.iter().find(|(name, _)| *name == agent).map(|(_, route)| *route)
}

/// Parse `--body`: inline JSON, or `@path` for a file.
pub fn load_body(arg: &str) -> anyhow::Result<serde_json::Value> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("request body is not valid JSON")
}

/// One line per record: `2024-07-01 10:00  assessment      Assessment: Fractions`.
pub fn format_activity(a: &Activity) -> String {
    let when: String = a.created_at.chars().take(16).collect::<String>().replace('T', " ");
    format!("{}  {:<15} {}", when, a.activity_type, a.title)
}

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_status(server: &str) -> anyhow::Result<()> {
    let url = format!("{}/health", server);
    let resp = match client(10)?.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("saathi-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        eprintln!("saathi-cli: server unhealthy (HTTP {})", resp.status());
        std::process::exit(1);
    }

    let body: serde_json::Value = resp.json().unwrap_or_default();
    let database = &body["database"];
    println!("Saathi server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
    println!("Gemini:        {}", if body["gemini_configured"] == true { "configured" } else { "demo mode" });
    println!(
        "Database:      {}",
        database["version"]
            .as_str()
            .or_else(|| database["error"].as_str())
            .unwrap_or("?")
    );
    if let Some(agents) = body["agents"].as_array() {
        let names: Vec<&str> = agents.iter().filter_map(|a| a.as_str()).collect();
        println!("Agents:        {}", names.join(", "));
    }

    Ok(())
}

fn do_generate(server: &str, agent: &str, body: &str) -> anyhow::Result<()> {
    let Some(route) = agent_route(agent) else {
        let known: Vec<&str> = AGENTS.iter().map(|(name, _)| *name).collect();
        bail!("unknown agent '{}' (expected one of: {})", agent, known.join(", "));
    };
    let payload = load_body(body)?;

    let url = format!("{}{}", server, route);
    let resp = match client(180)?.post(&url).json(&payload).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("saathi-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    if let Some(reason) = resp.headers().get(DEGRADED_HEADER).and_then(|v| v.to_str().ok()) {
        eprintln!("saathi-cli: demo content returned ({})", reason);
    }
    let text = resp.text().unwrap_or_default();

    if !status.is_success() {
        eprintln!("saathi-cli: server returned {}: {}", status, text);
        std::process::exit(1);
    }

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

fn do_activities(server: &str, limit: u32) -> anyhow::Result<()> {
    let url = format!("{}/api/activities?limit={}", server, limit);
    let resp = match client(10)?.get(&url).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("saathi-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("saathi-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    let list: ActivitiesResponse = resp.json().context("failed to parse activities response")?;
    if list.count == 0 {
        eprintln!("No activities recorded yet");
        return Ok(());
    }
    for a in &list.activities {
        println!("{}", format_activity(a));
        if !a.description.is_empty() {
            println!("                   {}", a.description);
        }
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::Generate { agent, body } => do_generate(&server, &agent, &body),
        Commands::Activities { limit } => do_activities(&server, limit),
    };

    if let Err(e) = result {
        eprintln!("saathi-cli: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_routes() {
        assert_eq!(agent_route("assessment"), Some("/api/agents/assessment/generate"));
        assert_eq!(agent_route("image-analysis"), Some("/api/agents/image-analysis/analyze"));
        assert_eq!(agent_route("evaluation"), Some("/api/agents/evaluation/analyze"));
        assert_eq!(agent_route("poster"), None);
    }

    #[test]
    fn test_load_body_inline_and_file() {
        let inline = load_body(r#"{"topic": "Fractions"}"#).unwrap();
        assert_eq!(inline["topic"], "Fractions");

        let path = std::env::temp_dir().join(format!("saathi-cli-body-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"questionCount": 5}"#).unwrap();
        let from_file = load_body(&format!("@{}", path.display())).unwrap();
        assert_eq!(from_file["questionCount"], 5);
        std::fs::remove_file(&path).ok();

        assert!(load_body("{oops").is_err());
        assert!(load_body("@/nonexistent/saathi-body.json").is_err());
    }

    #[test]
    fn test_activities_response_parses_server_shape() {
        let json = r#"{
            "activities": [{
                "id": "7b5c24ab-1234-5678-9abc-def012345678",
                "type": "assessment",
                "title": "Assessment: Fractions",
                "description": "5 questions for Mathematics grade 5",
                "agentType": "assessment",
                "createdAt": "2024-07-01T10:00:00.123Z"
            }],
            "count": 1
        }"#;
        let parsed: ActivitiesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.count, 1);
        assert_eq!(
            format_activity(&parsed.activities[0]),
            "2024-07-01 10:00  assessment      Assessment: Fractions"
        );
    }
}
