//! Review signal types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An explicit acceptance signal found in review text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewSignal {
    Positive,
    Negative,
    /// No explicit decision; never read as acceptance.
    Absent,
}

impl ReviewSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Absent => "absent",
        }
    }
}

impl fmt::Display for ReviewSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule of the review grammar produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    DecisionTag,
    Directive,
    Bullet,
    Phrase,
}

/// One grammar match inside the review text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalMatch {
    pub signal: ReviewSignal,
    pub source: SignalSource,
    /// The matched text, trimmed
    pub text: String,
}

/// Result of parsing a review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub signal: ReviewSignal,
    /// Every match found, in text order
    pub matches: Vec<SignalMatch>,
}

impl ReviewVerdict {
    pub fn absent() -> Self {
        Self {
            signal: ReviewSignal::Absent,
            matches: Vec::new(),
        }
    }

    /// The match that decided the verdict, if any.
    pub fn deciding_match(&self) -> Option<&SignalMatch> {
        self.matches.iter().find(|m| m.signal == self.signal)
    }
}
