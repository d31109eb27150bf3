//! Append-only audit trail of acceptance-gate decisions.

mod logger;

pub use logger::DecisionLog;

use crate::gates::Decision;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One line of the decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub decision: Decision,
}

impl DecisionRecord {
    pub fn new(decision: Decision) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            decision,
        }
    }
}
