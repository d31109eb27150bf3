//! Review text parsing.

use super::types::{ReviewSignal, ReviewVerdict, SignalMatch, SignalSource};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static DECISION_TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<decision>\s*(accept|reject)\s*</decision>").unwrap()
});

// Directive lines may carry markdown prefixes: bullets, quotes, headings, bold.
static DIRECTIVE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\s>#*\-]*(?:\*\*)?(status|decision|verdict)(?:\*\*)?\s*:\s*(?:\*\*)?\s*([a-z][a-z_\-]*).*$")
        .unwrap()
});

static BULLET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*]\s+(ACCEPT|REJECT)\b.*$").unwrap());

// A line naming both outcomes (an unfilled `ACCEPT | REJECT` template) decides nothing positive.
static BOTH_CHOICES_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\baccept(?:ed)?\b.*\breject(?:ed)?\b|\breject(?:ed)?\b.*\baccept(?:ed)?\b").unwrap()
});

static NEGATIVE_PHRASE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bdo not mark\b.{0,80}?\bas\s+(?:complete|completed|done)\b|\bremains in[ _\-]progress\b|\bnot accepted\b",
    )
    .unwrap()
});

const POSITIVE_VALUES: &[&str] = &["accept", "accepted", "approve", "approved", "done"];

const NEGATIVE_VALUES: &[&str] = &[
    "reject",
    "rejected",
    "deny",
    "denied",
    "in_progress",
    "in-progress",
    "todo",
    "partial",
    "review",
    "blocked",
];

/// Parser for acceptance signals in review text.
///
/// With `verbose`, every grammar match is traced at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReviewParser {
    verbose: bool,
}

impl ReviewParser {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Parse `text` into a verdict. Negative matches take precedence.
    pub fn parse(&self, text: &str) -> ReviewVerdict {
        let mut found: Vec<(usize, SignalMatch)> = Vec::new();

        for cap in DECISION_TAG_REGEX.captures_iter(text) {
            let (Some(whole), Some(value)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let signal = if value.as_str().eq_ignore_ascii_case("accept") {
                ReviewSignal::Positive
            } else {
                ReviewSignal::Negative
            };
            found.push((whole.start(), matched(signal, SignalSource::DecisionTag, whole.as_str())));
        }

        for cap in DIRECTIVE_REGEX.captures_iter(text) {
            let (Some(whole), Some(value)) = (cap.get(0), cap.get(2)) else {
                continue;
            };
            let Some(signal) = classify_value(value.as_str()) else {
                continue;
            };
            let signal = unless_both_choices(signal, whole.as_str());
            found.push((whole.start(), matched(signal, SignalSource::Directive, whole.as_str())));
        }

        for cap in BULLET_REGEX.captures_iter(text) {
            let (Some(whole), Some(value)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let signal = if value.as_str() == "ACCEPT" {
                ReviewSignal::Positive
            } else {
                ReviewSignal::Negative
            };
            let signal = unless_both_choices(signal, whole.as_str());
            found.push((whole.start(), matched(signal, SignalSource::Bullet, whole.as_str())));
        }

        for m in NEGATIVE_PHRASE_REGEX.find_iter(text) {
            found.push((
                m.start(),
                matched(ReviewSignal::Negative, SignalSource::Phrase, m.as_str()),
            ));
        }

        found.sort_by_key(|(start, _)| *start);
        let matches: Vec<SignalMatch> = found.into_iter().map(|(_, m)| m).collect();

        let signal = if matches.iter().any(|m| m.signal == ReviewSignal::Negative) {
            ReviewSignal::Negative
        } else if matches.iter().any(|m| m.signal == ReviewSignal::Positive) {
            ReviewSignal::Positive
        } else {
            ReviewSignal::Absent
        };

        if self.verbose {
            for m in &matches {
                debug!(signal = %m.signal, source = ?m.source, text = %m.text, "review signal match");
            }
        }
        debug!(%signal, matches = matches.len(), "parsed review");

        ReviewVerdict { signal, matches }
    }
}

/// Convenience function to parse review text without creating a parser.
pub fn parse_review(text: &str) -> ReviewVerdict {
    ReviewParser::new(false).parse(text)
}

fn classify_value(value: &str) -> Option<ReviewSignal> {
    let value = value.to_ascii_lowercase();
    if POSITIVE_VALUES.contains(&value.as_str()) {
        Some(ReviewSignal::Positive)
    } else if NEGATIVE_VALUES.contains(&value.as_str()) {
        Some(ReviewSignal::Negative)
    } else {
        None
    }
}

fn unless_both_choices(signal: ReviewSignal, line: &str) -> ReviewSignal {
    if BOTH_CHOICES_REGEX.is_match(line) {
        ReviewSignal::Negative
    } else {
        signal
    }
}

fn matched(signal: ReviewSignal, source: SignalSource, text: &str) -> SignalMatch {
    SignalMatch {
        signal,
        source,
        text: text.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_tag() {
        assert_eq!(
            parse_review("Looks good.\n<decision>ACCEPT</decision>").signal,
            ReviewSignal::Positive
        );
        assert_eq!(
            parse_review("<decision> reject </decision>").signal,
            ReviewSignal::Negative
        );
    }

    #[test]
    fn test_status_directive() {
        assert_eq!(parse_review("STATUS: done\nAll checks pass.").signal, ReviewSignal::Positive);
        assert_eq!(
            parse_review("STATUS: in_progress\nMissing tests.").signal,
            ReviewSignal::Negative
        );
    }

    #[test]
    fn test_directive_with_markdown_prefix() {
        assert_eq!(parse_review("## Decision: Approved").signal, ReviewSignal::Positive);
        assert_eq!(parse_review("- **Verdict:** rejected").signal, ReviewSignal::Negative);
        assert_eq!(parse_review("> Verdict: in-progress").signal, ReviewSignal::Negative);
    }

    #[test]
    fn test_unknown_directive_value_is_ignored() {
        assert_eq!(parse_review("Status: pending").signal, ReviewSignal::Absent);
    }

    #[test]
    fn test_uppercase_bullets_only() {
        assert_eq!(parse_review("Decision list:\n- ACCEPT").signal, ReviewSignal::Positive);
        assert_eq!(parse_review("* REJECT\n").signal, ReviewSignal::Negative);
        assert_eq!(parse_review("- accept the risk").signal, ReviewSignal::Absent);
    }

    #[test]
    fn test_unfilled_template_line_is_negative() {
        let verdict = parse_review("### Decision\n- ACCEPT | REJECT and short justification\n");
        assert_eq!(verdict.signal, ReviewSignal::Negative);
        assert_eq!(verdict.matches[0].source, SignalSource::Bullet);

        assert_eq!(
            parse_review("Decision: accept or reject").signal,
            ReviewSignal::Negative
        );
        assert_eq!(
            parse_review("- REJECT / ACCEPT\n<decision>ACCEPT</decision>").signal,
            ReviewSignal::Negative
        );
    }

    #[test]
    fn test_bullet_with_justification_keeps_signal() {
        let verdict = parse_review("- ACCEPT: endpoints and tests are in place\n");
        assert_eq!(verdict.signal, ReviewSignal::Positive);
        assert_eq!(verdict.matches[0].text, "- ACCEPT: endpoints and tests are in place");
    }

    #[test]
    fn test_negative_phrases() {
        for text in [
            "Do not mark WBS-001 as complete until the migration lands.",
            "The task remains in progress.",
            "This work is not accepted.",
            "do not mark this as done",
        ] {
            assert_eq!(parse_review(text).signal, ReviewSignal::Negative, "{text}");
        }
    }

    #[test]
    fn test_negative_wins_over_positive() {
        let verdict = parse_review("STATUS: done\nHowever the task remains in progress.");
        assert_eq!(verdict.signal, ReviewSignal::Negative);
        assert_eq!(verdict.matches.len(), 2);
        assert_eq!(verdict.deciding_match().unwrap().source, SignalSource::Phrase);
    }

    #[test]
    fn test_silence_is_absent() {
        let verdict = parse_review("Reviewed the diff. Code is tidy and the tests look fine.");
        assert_eq!(verdict.signal, ReviewSignal::Absent);
        assert!(verdict.matches.is_empty());
        assert_eq!(parse_review("").signal, ReviewSignal::Absent);
    }

    #[test]
    fn test_prose_mentioning_accept_is_absent() {
        assert_eq!(
            parse_review("We should accept this once tests are added").signal,
            ReviewSignal::Absent
        );
    }

    #[test]
    fn test_matches_are_in_text_order() {
        let verdict = parse_review("- ACCEPT\n<decision>ACCEPT</decision>\nVerdict: approve");
        let sources: Vec<_> = verdict.matches.iter().map(|m| m.source).collect();
        assert_eq!(
            sources,
            vec![SignalSource::Bullet, SignalSource::DecisionTag, SignalSource::Directive]
        );
        assert_eq!(verdict.signal, ReviewSignal::Positive);
    }
}
