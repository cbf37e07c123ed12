//! Case Expander - Record to Atomic Cases
//!
//! A stored test case may pack several logical cases into one input blob:
//!
//! ```text
//! 3        <- case count
//! 4 5      <- input of case 0
//! 1 1      <- input of case 1
//! 9 0      <- input of case 2
//! ```
//!
//! with the expected outputs one per line in `output`. Anything whose first
//! line is not a bare non-negative integer is a single ordinary case.
//!
//! The count detection is a heuristic: an ordinary case whose input really
//! starts with a lone integer line is indistinguishable from a packed one.

use serde::Serialize;
use tracing::warn;
use verdict_common::types::{AtomicCase, TestCaseRecord};

/// Reported when a packed record declares more cases than it carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub record_id: String,
    pub declared: usize,
    pub available: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub cases: Vec<AtomicCase>,
    pub shortfall: Option<Shortfall>,
}

pub fn atomic_id(record_id: &str, ordinal: usize) -> String {
    format!("{}#{}", record_id, ordinal)
}

/// Parse the case-count header. `None` means "not a packed record".
fn case_count(first_line: &str) -> Option<usize> {
    let trimmed = first_line.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse().ok()
}

/// Expand a record, reporting a truncated packed record instead of failing
pub fn expand_with_report(record: &TestCaseRecord) -> Expansion {
    if record.input.is_empty() {
        return Expansion { cases: Vec::new(), shortfall: None };
    }

    let mut input_lines = record.input.lines();
    let first_line = input_lines.next().unwrap_or("");

    let Some(declared) = case_count(first_line) else {
        let case = AtomicCase {
            atomic_id: atomic_id(&record.id, 0),
            origin_id: record.id.clone(),
            ordinal: 0,
            input: record.input.clone(),
            expected_output: record.output.clone(),
            hidden: record.hidden,
        };
        return Expansion { cases: vec![case], shortfall: None };
    };

    let inputs: Vec<&str> = input_lines.take(declared).collect();
    let outputs: Vec<&str> = record.output.lines().collect();

    let shortfall = (inputs.len() < declared).then(|| Shortfall {
        record_id: record.id.clone(),
        declared,
        available: inputs.len(),
    });

    let cases = inputs
        .iter()
        .enumerate()
        .map(|(ordinal, input)| AtomicCase {
            atomic_id: atomic_id(&record.id, ordinal),
            origin_id: record.id.clone(),
            ordinal,
            input: (*input).to_string(),
            expected_output: outputs.get(ordinal).copied().unwrap_or("").to_string(),
            hidden: record.hidden,
        })
        .collect();

    Expansion { cases, shortfall }
}

/// Expand a record into its atomic cases, in order
pub fn expand(record: &TestCaseRecord) -> Vec<AtomicCase> {
    let expansion = expand_with_report(record);
    if let Some(shortfall) = &expansion.shortfall {
        warn!(
            record_id = %shortfall.record_id,
            declared = shortfall.declared,
            available = shortfall.available,
            "Packed test case declares more inputs than it provides; truncating"
        );
    }
    expansion.cases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, input: &str, output: &str) -> TestCaseRecord {
        TestCaseRecord {
            id: id.to_string(),
            input: input.to_string(),
            output: output.to_string(),
            hidden: false,
            explanation: None,
        }
    }

    #[test]
    fn test_packed_record_splits_inputs_and_outputs() {
        let cases = expand(&record("r1", "2\nfoo\nbar", "A\nB"));

        assert_eq!(cases.len(), 2);
        assert_eq!(cases[0].input, "foo");
        assert_eq!(cases[0].expected_output, "A");
        assert_eq!(cases[1].input, "bar");
        assert_eq!(cases[1].expected_output, "B");
        assert_eq!(cases[1].atomic_id, "r1#1");
        assert_eq!(cases[1].origin_id, "r1");
        assert_eq!(cases[1].ordinal, 1);
    }

    #[test]
    fn test_non_numeric_header_is_single_case() {
        let r = record("r2", "hello world\n3", "HELLO WORLD");
        let cases = expand(&r);

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, r.input);
        assert_eq!(cases[0].expected_output, r.output);
        assert_eq!(cases[0].atomic_id, "r2#0");
    }

    #[test]
    fn test_negative_or_signed_header_is_single_case() {
        assert_eq!(expand(&record("a", "-2\nx\ny", "1\n2")).len(), 1);
        assert_eq!(expand(&record("b", "+2\nx\ny", "1\n2")).len(), 1);
        assert_eq!(expand(&record("c", "2.5\nx\ny", "1\n2")).len(), 1);
    }

    #[test]
    fn test_empty_input_yields_no_cases() {
        assert!(expand(&record("e", "", "anything")).is_empty());
    }

    #[test]
    fn test_zero_count_yields_no_cases() {
        let expansion = expand_with_report(&record("z", "0\nfoo", "A"));
        assert!(expansion.cases.is_empty());
        assert!(expansion.shortfall.is_none());
    }

    #[test]
    fn test_short_packed_record_is_truncated_and_reported() {
        let expansion = expand_with_report(&record("s", "4\na\nb", "1\n2\n3\n4"));

        assert_eq!(expansion.cases.len(), 2);
        assert_eq!(
            expansion.shortfall,
            Some(Shortfall { record_id: "s".to_string(), declared: 4, available: 2 })
        );
    }

    #[test]
    fn test_bare_integer_input_is_read_as_header() {
        // A lone number cannot be told apart from a case count
        let expansion = expand_with_report(&record("n", "5", "120"));

        assert!(expansion.cases.is_empty());
        assert_eq!(
            expansion.shortfall,
            Some(Shortfall { record_id: "n".to_string(), declared: 5, available: 0 })
        );
    }

    #[test]
    fn test_missing_expected_lines_default_to_empty() {
        let cases = expand(&record("m", "3\na\nb\nc", "only-one"));

        assert_eq!(cases[0].expected_output, "only-one");
        assert_eq!(cases[1].expected_output, "");
        assert_eq!(cases[2].expected_output, "");
    }

    #[test]
    fn test_crlf_lines_are_split_cleanly() {
        let cases = expand(&record("w", "2\r\nfoo\r\nbar\r\n", "A\r\nB\r\n"));

        assert_eq!(cases[0].input, "foo");
        assert_eq!(cases[1].expected_output, "B");
    }

    #[test]
    fn test_extra_lines_beyond_count_are_ignored() {
        let cases = expand(&record("x", "1\nfirst\nsecond", "A\nB"));

        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].input, "first");
        assert_eq!(cases[0].expected_output, "A");
    }

    #[test]
    fn test_hidden_flag_is_inherited() {
        let mut r = record("h", "2\na\nb", "1\n2");
        r.hidden = true;
        assert!(expand(&r).iter().all(|c| c.hidden));
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let r = record("d", "3\n1 2\n3 4\n5 6", "3\n7\n11");
        assert_eq!(expand(&r), expand(&r));
    }
}
