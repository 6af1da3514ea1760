//! Verdict normalization.
//!
//! Reduces the judge's free-text answer to a [`Ternary`] decision. Reasoning
//! spans (`<think>...</think>`) are stripped before classification; the raw
//! answer is kept untouched for the audit output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Token opening an answer that says the pair is fine.
pub const NEGATIVE_TOKEN: &str = "NO";
/// Token opening an answer that says the pair is wrong.
pub const AFFIRMATIVE_TOKEN: &str = "YES";
/// Appended to the audit text of answers that are neither YES nor NO.
pub const UNPARSEABLE_MARKER: &str = "(answer is not YES or NO)";

static REASONING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("reasoning regex is valid"));

/// Three-way reduction of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ternary {
    /// The judge says the pair is a mistranslation.
    Affirmative,
    /// The judge says the pair is fine.
    Negative,
    /// The answer could not be classified.
    Unparseable,
}

impl Ternary {
    /// Whether this decision counts as an error flag when bucketing outcomes.
    /// Unparseable answers are folded into the positive side.
    pub fn flags_error(self) -> bool {
        !matches!(self, Self::Negative)
    }
}

/// A judge answer and its normalized decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Answer exactly as returned by the judge.
    pub raw: String,
    /// Answer with reasoning spans removed, used for classification.
    pub clean: String,
    pub ternary: Ternary,
}

impl Verdict {
    /// Text written to the audit sink's result line.
    pub fn audit_text(&self) -> String {
        match self.ternary {
            Ternary::Unparseable => format!("{} {}", self.raw, UNPARSEABLE_MARKER),
            _ => self.raw.clone(),
        }
    }
}

/// Normalize a raw judge answer.
pub fn normalize(raw: &str) -> Verdict {
    let clean = strip_reasoning(raw);
    let ternary = if starts_with_ignore_case(&clean, NEGATIVE_TOKEN) {
        Ternary::Negative
    } else if starts_with_ignore_case(&clean, AFFIRMATIVE_TOKEN) {
        Ternary::Affirmative
    } else {
        Ternary::Unparseable
    };

    Verdict {
        raw: raw.to_string(),
        clean,
        ternary,
    }
}

/// Remove delimited reasoning spans and trim the remainder.
pub fn strip_reasoning(raw: &str) -> String {
    REASONING_RE.replace_all(raw, "").trim().to_string()
}

fn starts_with_ignore_case(text: &str, token: &str) -> bool {
    text.get(..token.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reasoning_span_is_stripped() {
        let verdict = normalize("<think>deciding...</think>YES, this is wrong");
        assert_eq!(verdict.ternary, Ternary::Affirmative);
        assert_eq!(verdict.clean, "YES, this is wrong");
        assert_eq!(verdict.raw, "<think>deciding...</think>YES, this is wrong");
    }

    #[test]
    fn test_multiline_reasoning_span() {
        let verdict = normalize("<think>\nThe target is French.\nSo it's wrong.\n</think>\n\nYes.");
        assert_eq!(verdict.ternary, Ternary::Affirmative);
        assert_eq!(verdict.clean, "Yes.");
    }

    #[test]
    fn test_negative_is_case_insensitive() {
        assert_eq!(normalize("NO, looks fine").ternary, Ternary::Negative);
        assert_eq!(normalize("no").ternary, Ternary::Negative);
        assert_eq!(normalize("  No.").ternary, Ternary::Negative);
    }

    #[test]
    fn test_affirmative() {
        assert_eq!(normalize("YES correct").ternary, Ternary::Affirmative);
        assert_eq!(normalize("yes").ternary, Ternary::Affirmative);
    }

    #[test]
    fn test_unparseable_gets_marker() {
        let verdict = normalize("The translation seems accurate.");
        assert_eq!(verdict.ternary, Ternary::Unparseable);
        assert!(verdict.ternary.flags_error());
        assert_eq!(
            verdict.audit_text(),
            "The translation seems accurate. (answer is not YES or NO)"
        );
    }

    #[test]
    fn test_unterminated_reasoning_is_unparseable() {
        let verdict = normalize("<think>still thinking");
        assert_eq!(verdict.ternary, Ternary::Unparseable);
        assert_eq!(verdict.clean, "<think>still thinking");
    }

    #[test]
    fn test_empty_answer_is_unparseable() {
        assert_eq!(normalize("").ternary, Ternary::Unparseable);
    }

    #[test]
    fn test_multibyte_prefix_does_not_panic() {
        assert_eq!(normalize("Ñ").ternary, Ternary::Unparseable);
        assert_eq!(normalize("Sí").ternary, Ternary::Unparseable);
    }

    #[test]
    fn test_audit_text_keeps_raw_answer() {
        let verdict = normalize("<think>x</think>NO");
        assert_eq!(verdict.audit_text(), "<think>x</think>NO");
        assert!(!verdict.ternary.flags_error());
    }
}
