//! Judge0 Execution Client
//!
//! Talks to a Judge0-compatible HTTP API. Source and stdin are sent
//! base64-encoded so arbitrary bytes survive the JSON round trip. Judge0 is
//! asked to wait for the result; if it answers while the submission is still
//! queued we fall back to polling by token.

use crate::client::{ClientError, ExecutionClient};
use crate::config::LanguageConfigManager;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use verdict_common::config::Config;
use verdict_common::types::{Language, RawExecutionResult};

const RESULT_FIELDS: &str = "stdout,stderr,compile_output,message,time,memory,status,exit_code,token";

// Judge0 status ids
const STATUS_PROCESSING: u32 = 2;
const STATUS_ACCEPTED: u32 = 3;
const STATUS_WRONG_ANSWER: u32 = 4;
const STATUS_COMPILATION_ERROR: u32 = 6;
const STATUS_INTERNAL_ERROR: u32 = 13;
const STATUS_EXEC_FORMAT_ERROR: u32 = 14;

#[derive(Debug, Serialize)]
struct SubmissionRequest {
    source_code: String,
    language_id: u32,
    stdin: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmissionStatus {
    id: u32,
    #[serde(default)]
    description: String,
}

/// Judge0 reports `time` as a decimal string of seconds
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Text(String),
    Number(f64),
}

impl Seconds {
    fn as_millis(&self) -> Option<f64> {
        let secs = match self {
            Seconds::Text(s) => s.trim().parse::<f64>().ok()?,
            Seconds::Number(n) => *n,
        };
        Some(secs * 1000.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SubmissionResponse {
    token: Option<String>,
    stdout: Option<String>,
    stderr: Option<String>,
    compile_output: Option<String>,
    message: Option<String>,
    time: Option<Seconds>,
    memory: Option<u64>,
    exit_code: Option<i32>,
    status: Option<SubmissionStatus>,
}

impl SubmissionResponse {
    fn is_pending(&self) -> bool {
        self.status.as_ref().map_or(true, |s| s.id <= STATUS_PROCESSING)
    }
}

fn decode_field(field: Option<&str>) -> Result<String, ClientError> {
    let Some(encoded) = field else {
        return Ok(String::new());
    };
    // Judge0 wraps base64 output at 60 columns
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ClientError::Decode(format!("invalid base64: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn into_raw(response: SubmissionResponse) -> Result<RawExecutionResult, ClientError> {
    let status = response
        .status
        .clone()
        .ok_or_else(|| ClientError::Decode("response has no status".to_string()))?;

    let stdout = decode_field(response.stdout.as_deref())?;
    let mut stderr = decode_field(response.stderr.as_deref())?;
    let compile_output = decode_field(response.compile_output.as_deref())?;
    let message = decode_field(response.message.as_deref())?;

    if matches!(status.id, STATUS_INTERNAL_ERROR | STATUS_EXEC_FORMAT_ERROR) {
        let detail = if message.is_empty() { status.description } else { message };
        return Err(ClientError::Backend(detail));
    }

    let compile_error = (status.id == STATUS_COMPILATION_ERROR).then(|| {
        if compile_output.trim().is_empty() {
            status.description.clone()
        } else {
            compile_output
        }
    });

    let exit_code = match status.id {
        STATUS_ACCEPTED => 0,
        STATUS_WRONG_ANSWER => response.exit_code.unwrap_or(0),
        _ => response.exit_code.filter(|code| *code != 0).unwrap_or(1),
    };

    // Time limit and runtime error statuses may come back with empty stderr
    if exit_code != 0 && compile_error.is_none() && stderr.trim().is_empty() {
        stderr = status.description.clone();
    }

    Ok(RawExecutionResult {
        stdout,
        stderr,
        compile_error,
        time_ms: response.time.as_ref().and_then(Seconds::as_millis),
        memory_kb: response.memory,
        exit_code,
    })
}

pub struct Judge0Client {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    api_host: Option<String>,
    poll_attempts: u32,
    poll_interval: Duration,
    languages: LanguageConfigManager,
}

impl Judge0Client {
    pub fn new(config: &Config, languages: LanguageConfigManager) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.execution_timeout)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.judge0_url.trim_end_matches('/').to_string(),
            api_key: config.judge0_api_key.clone(),
            api_host: config.judge0_api_host.clone(),
            poll_attempts: config.judge0_poll_attempts,
            poll_interval: Duration::from_secs(1),
            languages,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = match &self.api_key {
            Some(key) => request.header("X-RapidAPI-Key", key),
            None => request,
        };
        match &self.api_host {
            Some(host) => request.header("X-RapidAPI-Host", host),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<SubmissionResponse, ClientError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status: status.as_u16(), body });
        }

        response
            .json::<SubmissionResponse>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn poll(&self, token: &str) -> Result<SubmissionResponse, ClientError> {
        let url = format!(
            "{}/submissions/{}?base64_encoded=true&fields={}",
            self.base_url, token, RESULT_FIELDS
        );

        for attempt in 1..=self.poll_attempts {
            tokio::time::sleep(self.poll_interval * attempt).await;

            let response = self.send(self.http.get(&url)).await?;
            if !response.is_pending() {
                return Ok(response);
            }
            debug!(token = token, attempt = attempt, "Submission still processing");
        }

        warn!(token = token, attempts = self.poll_attempts, "Gave up polling submission");
        Err(ClientError::Timeout { attempts: self.poll_attempts })
    }
}

#[async_trait]
impl ExecutionClient for Judge0Client {
    async fn execute(
        &self,
        language: Language,
        code: &str,
        stdin: &str,
    ) -> Result<RawExecutionResult, ClientError> {
        let body = SubmissionRequest {
            source_code: general_purpose::STANDARD.encode(code),
            language_id: self.languages.judge0_id(&language),
            stdin: general_purpose::STANDARD.encode(stdin),
        };

        let url = format!(
            "{}/submissions?base64_encoded=true&wait=true&fields={}",
            self.base_url, RESULT_FIELDS
        );
        let mut response = self.send(self.http.post(&url).json(&body)).await?;

        if response.is_pending() {
            let token = response
                .token
                .clone()
                .ok_or_else(|| ClientError::Decode("pending submission without token".to_string()))?;
            response = self.poll(&token).await?;
        }

        into_raw(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(s: &str) -> String {
        general_purpose::STANDARD.encode(s)
    }

    fn parse(value: serde_json::Value) -> SubmissionResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_accepted_submission() {
        let raw = into_raw(parse(json!({
            "stdout": encode("42\n"),
            "stderr": null,
            "compile_output": null,
            "time": "0.012",
            "memory": 3412,
            "exit_code": null,
            "status": { "id": 3, "description": "Accepted" }
        })))
        .unwrap();

        assert_eq!(raw.stdout, "42\n");
        assert_eq!(raw.stderr, "");
        assert_eq!(raw.exit_code, 0);
        assert_eq!(raw.memory_kb, Some(3412));
        assert!((raw.time_ms.unwrap() - 12.0).abs() < 1e-9);
        assert!(raw.compile_error.is_none());
    }

    #[test]
    fn test_compile_error_populates_compile_error() {
        let raw = into_raw(parse(json!({
            "compile_output": encode("Main.java:3: error: ';' expected"),
            "status": { "id": 6, "description": "Compilation Error" }
        })))
        .unwrap();

        assert_eq!(raw.compile_error.as_deref(), Some("Main.java:3: error: ';' expected"));
        assert_eq!(raw.stderr, "");
    }

    #[test]
    fn test_runtime_error_without_stderr_uses_description() {
        let raw = into_raw(parse(json!({
            "stdout": encode("partial"),
            "status": { "id": 11, "description": "Runtime Error (NZEC)" },
            "exit_code": 1
        })))
        .unwrap();

        assert_eq!(raw.exit_code, 1);
        assert_eq!(raw.stderr, "Runtime Error (NZEC)");
        assert!(raw.time_ms.is_none());
    }

    #[test]
    fn test_time_limit_exceeded_is_nonzero_exit() {
        let raw = into_raw(parse(json!({
            "status": { "id": 5, "description": "Time Limit Exceeded" },
            "time": 5.0
        })))
        .unwrap();

        assert_eq!(raw.exit_code, 1);
        assert_eq!(raw.stderr, "Time Limit Exceeded");
        assert_eq!(raw.time_ms, Some(5000.0));
    }

    #[test]
    fn test_internal_error_is_backend_failure() {
        let result = into_raw(parse(json!({
            "message": encode("No space left on device"),
            "status": { "id": 13, "description": "Internal Error" }
        })));

        match result {
            Err(ClientError::Backend(detail)) => assert_eq!(detail, "No space left on device"),
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_wrapped_base64_is_decoded() {
        let long = "x".repeat(100);
        let encoded = encode(&long);
        let wrapped = format!("{}\n{}\n", &encoded[..60], &encoded[60..]);

        assert_eq!(decode_field(Some(&wrapped)).unwrap(), long);
        assert!(decode_field(Some("***")).is_err());
    }

    #[test]
    fn test_pending_detection() {
        assert!(parse(json!({ "token": "abc" })).is_pending());
        assert!(parse(json!({ "status": { "id": 1, "description": "In Queue" } })).is_pending());
        assert!(!parse(json!({ "status": { "id": 3, "description": "Accepted" } })).is_pending());
    }

    #[tokio::test]
    #[ignore] // Requires a reachable Judge0 instance (JUDGE0_URL)
    async fn test_live_python_echo() {
        let config = Config::from_env();
        let client = Judge0Client::new(&config, LanguageConfigManager::default()).unwrap();

        let raw = client
            .execute(Language::Python, "print(input()[::-1])", "abc")
            .await
            .unwrap();

        assert_eq!(raw.stdout.trim(), "cba");
        assert_eq!(raw.exit_code, 0);
    }
}
