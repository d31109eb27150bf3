//! Acceptance signals in free-form review text.
//!
//! The grammar, case-insensitive unless noted:
//!
//! - `<decision>ACCEPT</decision>` / `<decision>REJECT</decision>`
//! - directive lines `STATUS:`, `Decision:` or `Verdict:` followed by a value
//!   (accept, accepted, approve, approved, done; or reject, rejected, deny,
//!   denied, in_progress, todo, partial, review, blocked)
//! - uppercase bullets `- ACCEPT` / `- REJECT` (case-sensitive)
//! - the phrases "do not mark ... as complete", "remains in progress" and
//!   "not accepted", all negative
//!
//! Any negative match wins. No match at all is `Absent`.

mod parser;
mod types;

pub use parser::{ReviewParser, parse_review};
pub use types::{ReviewSignal, ReviewVerdict, SignalMatch, SignalSource};
