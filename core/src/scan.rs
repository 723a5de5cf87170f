//! Uppercase-run diagnostic scan.
//!
//! A deliberately naive lexical pass: every word-boundary-delimited run of
//! two or more uppercase ASCII letters becomes a warning, capped by
//! [`Settings::max_number_of_problems`]. The scan knows nothing about
//! string literals, comments, or identifiers.

use std::sync::OnceLock;

use regex::Regex;

use crate::settings::Settings;

/// Source tag attached to every finding.
pub const SOURCE: &str = "warden";

/// Severity level for a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl Severity {
    /// Protocol numeric severity (1=Error, 2=Warning, 3=Info, 4=Hint).
    #[must_use]
    pub fn to_lsp(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
            Self::Hint => "hint",
        }
    }
}

/// Advisory note attached to a finding, pointing back at the same span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelatedHint {
    start: usize,
    end: usize,
    message: &'static str,
}

impl RelatedHint {
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub fn message(&self) -> &'static str {
        self.message
    }
}

/// A single finding produced by [`scan`].
///
/// Spans are byte offsets into the scanned text; the protocol adapter
/// converts them to positions against the owning document. Findings are
/// built fresh per scan and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    start: usize,
    end: usize,
    severity: Severity,
    message: String,
    related: Vec<RelatedHint>,
}

impl Finding {
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Source tag; the same for every finding this scanner produces.
    #[must_use]
    pub fn source(&self) -> &'static str {
        SOURCE
    }

    /// Advisory notes, present only when the scan was asked to attach them.
    #[must_use]
    pub fn related(&self) -> &[RelatedHint] {
        &self.related
    }
}

static UPPERCASE_RUN: OnceLock<Regex> = OnceLock::new();

fn uppercase_run() -> &'static Regex {
    UPPERCASE_RUN.get_or_init(|| Regex::new(r"\b[A-Z]{2,}\b").expect("valid uppercase-run regex"))
}

/// Scan `text` for uppercase runs, in document order, capped by
/// [`Settings::max_number_of_problems`]. `attach_related` adds the two
/// fixed advisory notes for hosts that can display related information.
#[must_use]
pub fn scan(text: &str, settings: Settings, attach_related: bool) -> Vec<Finding> {
    uppercase_run()
        .find_iter(text)
        .take(settings.max_number_of_problems as usize)
        .map(|m| {
            let related = if attach_related {
                vec![
                    RelatedHint {
                        start: m.start(),
                        end: m.end(),
                        message: "Spelling matters",
                    },
                    RelatedHint {
                        start: m.start(),
                        end: m.end(),
                        message: "Particularly for names",
                    },
                ]
            } else {
                Vec::new()
            };
            Finding {
                start: m.start(),
                end: m.end(),
                severity: Severity::Warning,
                message: format!("{} is all uppercase.", m.as_str()),
                related,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limit(n: u32) -> Settings {
        Settings {
            max_number_of_problems: n,
        }
    }

    // ── Severity ───────────────────────────────────────────────────────

    #[test]
    fn test_severity_lsp_codes() {
        assert_eq!(Severity::Error.to_lsp(), 1);
        assert_eq!(Severity::Warning.to_lsp(), 2);
        assert_eq!(Severity::Information.to_lsp(), 3);
        assert_eq!(Severity::Hint.to_lsp(), 4);
    }

    #[test]
    fn test_severity_label() {
        assert_eq!(Severity::Warning.label(), "warning");
        assert_eq!(Severity::Error.label(), "error");
    }

    // ── Match definition ───────────────────────────────────────────────

    #[test]
    fn test_single_uppercase_letter_is_not_matched() {
        let findings = scan("let X = FOO", Settings::default(), false);
        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.start(), 8);
        assert_eq!(finding.end(), 11);
        assert_eq!(finding.message(), "FOO is all uppercase.");
        assert_eq!(finding.severity(), Severity::Warning);
        assert_eq!(finding.source(), "warden");
    }

    #[test]
    fn test_mixed_case_run_is_not_matched() {
        // no word boundary splits "ABc", so the run fails the {2,} rule
        assert!(scan("ABc", Settings::default(), false).is_empty());
        assert!(scan("xAB", Settings::default(), false).is_empty());
    }

    #[test]
    fn test_underscore_joins_words() {
        // '_' is a word character, so "AB_CD" has no inner boundaries
        assert!(scan("AB_CD", Settings::default(), false).is_empty());
    }

    #[test]
    fn test_runs_split_by_punctuation() {
        let findings = scan("HTTP/TLS", Settings::default(), false);
        let messages: Vec<&str> = findings.iter().map(Finding::message).collect();
        assert_eq!(
            messages,
            vec!["HTTP is all uppercase.", "TLS is all uppercase."]
        );
    }

    #[test]
    fn test_findings_are_ordered_and_non_overlapping() {
        let findings = scan("AA bb CC dd EE", Settings::default(), false);
        let spans: Vec<(usize, usize)> = findings.iter().map(|f| (f.start(), f.end())).collect();
        assert_eq!(spans, vec![(0, 2), (6, 8), (12, 14)]);
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
    }

    // ── Cap behavior ───────────────────────────────────────────────────

    #[test]
    fn test_cap_limits_findings() {
        let findings = scan("AA BB CC", limit(2), false);
        let messages: Vec<&str> = findings.iter().map(Finding::message).collect();
        assert_eq!(
            messages,
            vec!["AA is all uppercase.", "BB is all uppercase."]
        );
    }

    #[test]
    fn test_cap_of_zero_yields_nothing() {
        assert!(scan("AA BB CC", limit(0), false).is_empty());
    }

    #[test]
    fn test_count_is_min_of_matches_and_cap() {
        let text = "AA BB CC DD";
        for cap in 0..6 {
            let findings = scan(text, limit(cap), false);
            assert_eq!(findings.len(), (cap as usize).min(4));
        }
    }

    #[test]
    fn test_scan_is_idempotent() {
        let text = "rule CHECK { input.VALUE }";
        let first = scan(text, Settings::default(), true);
        let second = scan(text, Settings::default(), true);
        assert_eq!(first, second);
    }

    // ── Related hints ──────────────────────────────────────────────────

    #[test]
    fn test_related_hints_attached_on_request() {
        let findings = scan("FOO", Settings::default(), true);
        let related = findings[0].related();
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].message(), "Spelling matters");
        assert_eq!(related[1].message(), "Particularly for names");
        // both point at the finding's own span
        for hint in related {
            assert_eq!((hint.start(), hint.end()), (0, 3));
        }
    }

    #[test]
    fn test_related_hints_absent_by_default() {
        let findings = scan("FOO", Settings::default(), false);
        assert!(findings[0].related().is_empty());
    }
}
