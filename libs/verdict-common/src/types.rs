use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Java,
    Python,
    Cpp,
    C,
    Javascript,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::Java,
        Language::Python,
        Language::Cpp,
        Language::C,
        Language::Javascript,
    ];
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Java => "java",
            Language::Python => "python",
            Language::Cpp => "cpp",
            Language::C => "c",
            Language::Javascript => "javascript",
        };
        f.write_str(name)
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "java" => Ok(Language::Java),
            "python" | "python3" => Ok(Language::Python),
            "cpp" | "c++" => Ok(Language::Cpp),
            "c" => Ok(Language::C),
            "javascript" | "js" => Ok(Language::Javascript),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Which pool of test cases a pass runs against.
///
/// `Run` is exploratory and uses the visible cases; `Submit` is
/// authoritative and uses the hidden ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Run,
    Submit,
}

impl Mode {
    /// Whether a record with the given `hidden` flag belongs to this mode's pool
    pub fn selects(&self, hidden: bool) -> bool {
        match self {
            Mode::Run => !hidden,
            Mode::Submit => hidden,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Run => f.write_str("run"),
            Mode::Submit => f.write_str("submit"),
        }
    }
}

/// Author-defined test case as stored upstream.
///
/// `input` may encode several atomic cases (see the expander); `output`
/// holds the expected outputs, one per line, aligned with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseRecord {
    pub id: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// One logical input/expected-output pair derived from a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicCase {
    pub atomic_id: String,
    pub origin_id: String,
    pub ordinal: usize,
    pub input: String,
    pub expected_output: String,
    pub hidden: bool,
}

/// What the execution backend reports for a single process invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub compile_error: Option<String>,
    pub time_ms: Option<f64>,
    pub memory_kb: Option<u64>,
    pub exit_code: i32,
}

impl RawExecutionResult {
    pub fn is_runtime_failure(&self) -> bool {
        !self.stderr.is_empty() || self.exit_code != 0
    }
}

/// Graded outcome of one atomic case.
///
/// Serialized in camelCase since this is also the persisted snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseResult {
    pub atomic_id: String,
    pub origin_id: String,
    pub ordinal: usize,
    pub hidden: bool,
    pub passed: bool,
    #[serde(default)]
    pub input: String,
    pub actual_output: String,
    pub expected_output: String,
    #[serde(default)]
    pub error: String,
    /// `None` when no timing was measured; written as 0 on the wire
    #[serde(default, with = "time_ms_wire")]
    pub time_ms: Option<f64>,
    #[serde(default)]
    pub memory_kb: u64,
    #[serde(default)]
    pub is_submission: bool,
}

impl CaseResult {
    /// A failing result that never reached comparison (compile or transport failure)
    pub fn failed(case: &AtomicCase, error: impl Into<String>, is_submission: bool) -> Self {
        Self {
            atomic_id: case.atomic_id.clone(),
            origin_id: case.origin_id.clone(),
            ordinal: case.ordinal,
            hidden: case.hidden,
            passed: false,
            input: case.input.clone(),
            actual_output: String::new(),
            expected_output: case.expected_output.trim().to_string(),
            error: error.into(),
            time_ms: None,
            memory_kb: 0,
            is_submission,
        }
    }

    /// Display value for time; absent measurements render as zero
    pub fn display_time_ms(&self) -> f64 {
        self.time_ms.unwrap_or(0.0)
    }
}

/// `timeMs` is always a number on the wire. Absent time is written as 0,
/// and 0 or null read back as absent so it stays out of averages.
mod time_ms_wire {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.unwrap_or(0.0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        Ok(value.filter(|ms| *ms > 0.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub passed_count: usize,
    pub total_count: usize,
    pub avg_time_ms: f64,
    pub avg_memory_kb: f64,
    /// 1-based positions in the result list
    pub failed_ordinals: Vec<usize>,
}

impl ResultSummary {
    pub fn all_passed(&self) -> bool {
        self.total_count > 0 && self.passed_count == self.total_count
    }
}

/// State persisted across an intentional reload after a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub code: String,
    pub language: Language,
    pub mode: Mode,
    pub results: Vec<CaseResult>,
    pub timestamp: i64,
}

impl Snapshot {
    pub fn new(code: impl Into<String>, language: Language, mode: Mode, results: Vec<CaseResult>) -> Self {
        Self {
            code: code.into(),
            language,
            mode,
            results,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Only submissions are ever snapshotted, so restored results are
    /// authoritative regardless of how they were tagged when saved.
    pub fn into_restored(mut self) -> Self {
        self.results = self
            .results
            .into_iter()
            .map(|r| CaseResult { is_submission: true, ..r })
            .collect();
        self
    }
}
