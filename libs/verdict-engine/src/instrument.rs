//! Timing Instrumentation
//!
//! Question boilerplate carries two comment markers around the region whose
//! running time should be reported. Before dispatch each marker is replaced
//! with a probe statement; the end probe prints the elapsed milliseconds as
//! a tagged last line of stdout, which `split_timing_line` later removes.
//! The tag keeps a numeric answer from being taken for timing when the end
//! probe never runs.
//!
//! Every probe is a single line, so line numbers in compiler diagnostics
//! still match the submitted source.

use verdict_common::types::Language;

/// Prefix of the line the end probe prints
pub const TIMING_TAG: &str = "__verdict_ms=";

/// Marker pair and probe statements for one language
#[derive(Debug, Clone, Copy)]
pub struct ProbeRule {
    pub start_marker: &'static str,
    pub end_marker: &'static str,
    pub start_probe: &'static str,
    pub end_probe: &'static str,
}

const JAVA: ProbeRule = ProbeRule {
    start_marker: "/*RUNTIME CALC START*/",
    end_marker: "/*RUNTIME CALC END*/",
    start_probe: "long __verdictStart = System.nanoTime();",
    end_probe: "System.out.println(); System.out.println(\"__verdict_ms=\" + (System.nanoTime() - __verdictStart) / 1e6);",
};

const PYTHON: ProbeRule = ProbeRule {
    start_marker: "\"\"\"RUNTIME CALC START\"\"\"",
    end_marker: "\"\"\"RUNTIME CALC END\"\"\"",
    start_probe: "import time as __verdict_time; __verdict_start = __verdict_time.perf_counter()",
    end_probe: "print(); print(\"__verdict_ms=\" + str((__verdict_time.perf_counter() - __verdict_start) * 1000))",
};

// Relies on the boilerplate including <chrono> and <iostream>.
const CPP: ProbeRule = ProbeRule {
    start_marker: "/*RUNTIME CALC START*/",
    end_marker: "/*RUNTIME CALC END*/",
    start_probe: "auto __verdict_start = std::chrono::high_resolution_clock::now();",
    end_probe: "std::cout << std::endl << \"__verdict_ms=\" << std::chrono::duration_cast<std::chrono::microseconds>(std::chrono::high_resolution_clock::now() - __verdict_start).count() / 1000.0 << std::endl;",
};

pub fn probe_rule(language: Language) -> Option<&'static ProbeRule> {
    match language {
        Language::Java => Some(&JAVA),
        Language::Python => Some(&PYTHON),
        Language::Cpp => Some(&CPP),
        Language::C | Language::Javascript => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrumented {
    pub code: String,
    /// True when both probes were inserted, i.e. stdout will end with a timing line
    pub probes_inserted: bool,
}

/// Replace the first start marker and the first end marker after it.
///
/// A start marker with no end marker still gets its probe (a dead variable
/// is harmless). An end marker with no start before it is left alone, since
/// its probe would reference an undeclared variable.
pub fn instrument_with_report(source: &str, language: Language) -> Instrumented {
    let unchanged = || Instrumented {
        code: source.to_string(),
        probes_inserted: false,
    };

    let Some(rule) = probe_rule(language) else {
        return unchanged();
    };
    let Some(start) = source.find(rule.start_marker) else {
        return unchanged();
    };

    let after_start = start + rule.start_marker.len();
    let end = source[after_start..]
        .find(rule.end_marker)
        .map(|offset| after_start + offset);

    let mut code = String::with_capacity(source.len() + 256);
    code.push_str(&source[..start]);
    code.push_str(rule.start_probe);

    match end {
        Some(end) => {
            code.push_str(&source[after_start..end]);
            code.push_str(rule.end_probe);
            code.push_str(&source[end + rule.end_marker.len()..]);
        }
        None => code.push_str(&source[after_start..]),
    }

    Instrumented {
        code,
        probes_inserted: end.is_some(),
    }
}

/// Insert timing probes at the language's markers; returns the input
/// unchanged when the language has no rule or the markers are absent.
pub fn instrument(source: &str, language: Language) -> String {
    instrument_with_report(source, language).code
}

/// Split a trailing timing line off instrumented stdout.
///
/// Returns the remaining output and the parsed milliseconds. Only a last
/// non-blank line carrying `TIMING_TAG` is taken; anything else, a bare
/// number included, is returned untouched.
pub fn split_timing_line(stdout: &str) -> (String, Option<f64>) {
    let trimmed = stdout.trim_end();
    let (rest, last) = match trimmed.rfind('\n') {
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    };

    let Some(value) = last.trim().strip_prefix(TIMING_TAG) else {
        return (stdout.to_string(), None);
    };

    match value.trim().parse::<f64>() {
        Ok(ms) if ms.is_finite() => (rest.trim_end_matches(['\r', '\n']).to_string(), Some(ms)),
        _ => (stdout.to_string(), None),
    }
}
