//! Solution region extraction and merging.
//!
//! Boilerplate may delimit the part the learner edits with
//! `SOLUTION START` / `SOLUTION END` comments. This is best-effort text
//! matching, not parsing; callers go through `RegionCodec` so a syntax-aware
//! implementation can replace it without touching the orchestrator.

use regex::Regex;
use std::sync::OnceLock;
use verdict_common::types::Language;

pub trait RegionCodec: Send + Sync {
    /// Text between the region markers, if both are present
    fn extract_region(&self, source: &str, language: Language) -> Option<String>;

    /// Replace the region body in `boilerplate` with `region`.
    /// Boilerplate without markers is returned unchanged.
    fn merge_region(&self, boilerplate: &str, region: &str, language: Language) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerRegionCodec;

fn comment_prefix(language: Language) -> &'static str {
    match language {
        Language::Python => "#",
        Language::Java | Language::Cpp | Language::C | Language::Javascript => "//",
    }
}

fn build_pattern(prefix: &str) -> Option<Regex> {
    let pattern = format!(
        r"(?s)([ \t]*{p}[ \t]*SOLUTION START[^\n]*\n)(.*?)([ \t]*{p}[ \t]*SOLUTION END)",
        p = regex::escape(prefix)
    );
    Regex::new(&pattern).ok()
}

/// Captures: 1 = start marker line (with newline), 2 = body, 3 = end marker line.
/// Compiled once per comment prefix.
fn region_pattern(language: Language) -> Option<&'static Regex> {
    static HASH: OnceLock<Option<Regex>> = OnceLock::new();
    static SLASHES: OnceLock<Option<Regex>> = OnceLock::new();

    let prefix = comment_prefix(language);
    let cell = if prefix == "#" { &HASH } else { &SLASHES };
    cell.get_or_init(|| build_pattern(prefix)).as_ref()
}

impl RegionCodec for MarkerRegionCodec {
    fn extract_region(&self, source: &str, language: Language) -> Option<String> {
        region_pattern(language)?
            .captures(source)
            .and_then(|caps| caps.get(2))
            .map(|body| body.as_str().to_string())
    }

    fn merge_region(&self, boilerplate: &str, region: &str, language: Language) -> String {
        let Some(caps) = region_pattern(language).and_then(|p| p.captures(boilerplate)) else {
            return boilerplate.to_string();
        };
        let (Some(start), Some(end)) = (caps.get(1), caps.get(3)) else {
            return boilerplate.to_string();
        };

        let mut merged = String::with_capacity(boilerplate.len() + region.len());
        merged.push_str(&boilerplate[..start.end()]);
        merged.push_str(region);
        if !region.is_empty() && !region.ends_with('\n') {
            merged.push('\n');
        }
        merged.push_str(&boilerplate[end.start()..]);
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JAVA_BOILERPLATE: &str = "public class Main {\n    // SOLUTION START\n    // Your code here\n    // SOLUTION END\n}\n";

    #[test]
    fn test_extract_region() {
        let codec = MarkerRegionCodec;
        assert_eq!(
            codec.extract_region(JAVA_BOILERPLATE, Language::Java).as_deref(),
            Some("    // Your code here\n")
        );
    }

    #[test]
    fn test_merge_region_replaces_body_only() {
        let codec = MarkerRegionCodec;
        let merged = codec.merge_region(
            JAVA_BOILERPLATE,
            "    static int add(int a, int b) { return a + b; }",
            Language::Java,
        );

        assert_eq!(
            merged,
            "public class Main {\n    // SOLUTION START\n    static int add(int a, int b) { return a + b; }\n    // SOLUTION END\n}\n"
        );
    }

    #[test]
    fn test_merge_then_extract_returns_region() {
        let codec = MarkerRegionCodec;
        let merged = codec.merge_region(JAVA_BOILERPLATE, "    int x = 1;\n", Language::Java);
        assert_eq!(
            codec.extract_region(&merged, Language::Java).as_deref(),
            Some("    int x = 1;\n")
        );
    }

    #[test]
    fn test_python_uses_hash_comments() {
        let codec = MarkerRegionCodec;
        let boilerplate = "# SOLUTION START\npass\n# SOLUTION END\nprint(solve())\n";

        assert_eq!(codec.extract_region(boilerplate, Language::Python).as_deref(), Some("pass\n"));
        assert!(codec.extract_region(boilerplate, Language::Java).is_none());
    }

    #[test]
    fn test_pattern_is_compiled_once_per_prefix() {
        let java = region_pattern(Language::Java).unwrap();
        let cpp = region_pattern(Language::Cpp).unwrap();
        let python = region_pattern(Language::Python).unwrap();

        assert!(std::ptr::eq(java, cpp));
        assert!(std::ptr::eq(java, region_pattern(Language::Java).unwrap()));
        assert!(!std::ptr::eq(java, python));
    }

    #[test]
    fn test_missing_markers() {
        let codec = MarkerRegionCodec;
        let source = "int main() { return 0; }\n";

        assert!(codec.extract_region(source, Language::Cpp).is_none());
        assert_eq!(codec.merge_region(source, "ignored", Language::Cpp), source);
    }
}
