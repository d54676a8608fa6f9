use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::time::now_sgt;

/// Tri-state status for a stateful sub-flow. `None` means "not active".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    InProgress,
    Done,
}

/// A slot value tagged with its validation state (spec §9: replaces the
/// source's ad-hoc "sometimes a string, sometimes a dict" union).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotValue {
    pub value: String,
    pub valid: bool,
}

impl SlotValue {
    pub fn pending(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            valid: false,
        }
    }

    pub fn validated(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            valid: true,
        }
    }
}

/// Ephemeral working record for comparison/summary slot-filling.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingSlot {
    pub product: Option<Product>,
    #[serde(default)]
    pub tiers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<FixedOffset>,
    pub user: String,
    pub assistant: String,
}

/// Which sub-flow last ran to completion — used only for bookkeeping, not
/// read by routing logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastCompleted {
    Recommendation,
    Comparison,
    Summary,
}

/// A completed comparison/summary, kept in a capped log for parity with the
/// source's post-completion bookkeeping (spec §3 [SUPPLEMENT]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedEntry {
    pub product: String,
    pub tiers: Vec<String>,
    pub completed: bool,
}

pub const MAX_HISTORY_ENTRIES: usize = 5;
pub const MAX_COMPLETED_LOG_ENTRIES: usize = 10;
pub const HISTORY_ASSISTANT_TRUNCATE_CHARS: usize = 100;
pub const MESSAGE_LENGTH_CAP: usize = 4096;

/// The full per-session document (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,

    pub product: Option<Product>,

    #[serde(default)]
    pub slots: HashMap<String, SlotValue>,

    pub recommendation_status: Option<FlowStatus>,
    pub comparison_status: Option<FlowStatus>,
    pub summary_status: Option<FlowStatus>,

    pub comparison_slot: Option<WorkingSlot>,
    pub summary_slot: Option<WorkingSlot>,

    #[serde(default)]
    pub comparison_history: Vec<CompletedEntry>,
    #[serde(default)]
    pub summary_history: Vec<CompletedEntry>,

    pub last_question: Option<String>,

    pub last_info_prod_q: bool,
    pub last_info_user_msg: Option<String>,

    pub fu_query: Option<String>,

    pub last_completed: Option<LastCompleted>,

    #[serde(default)]
    pub history: Vec<HistoryEntry>,

    pub created_at: DateTime<FixedOffset>,
    pub last_active: DateTime<FixedOffset>,
}

impl Session {
    /// A brand-new session, as created lazily on first turn.
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = now_sgt();
        Self {
            session_id: session_id.into(),
            product: None,
            slots: HashMap::new(),
            recommendation_status: None,
            comparison_status: None,
            summary_status: None,
            comparison_slot: None,
            summary_slot: None,
            comparison_history: Vec::new(),
            summary_history: Vec::new(),
            last_question: None,
            last_info_prod_q: false,
            last_info_user_msg: None,
            fu_query: None,
            last_completed: None,
            history: Vec::new(),
            created_at: now,
            last_active: now,
        }
    }

    /// Clear all transient state, preserving `history` and `created_at`
    /// (spec §4.2, field list grounded on the source's `reset_session`).
    pub fn reset_transient(&mut self) {
        self.product = None;
        self.slots.clear();
        self.comparison_status = None;
        self.summary_status = None;
        self.comparison_slot = None;
        self.comparison_history.clear();
        self.summary_slot = None;
        self.summary_history.clear();
        self.recommendation_status = None;
        self.last_question = None;
        self.last_info_prod_q = false;
        self.last_info_user_msg = None;
        self.fu_query = None;
        self.last_completed = None;
    }

    /// Append a turn to history, truncating the assistant side to
    /// `HISTORY_ASSISTANT_TRUNCATE_CHARS` and keeping at most
    /// `MAX_HISTORY_ENTRIES` entries (most recent last).
    pub fn append_history(&mut self, user: impl Into<String>, assistant_full: &str) {
        let truncated: String = assistant_full
            .chars()
            .take(HISTORY_ASSISTANT_TRUNCATE_CHARS)
            .collect();
        self.history.push(HistoryEntry {
            timestamp: now_sgt(),
            user: user.into(),
            assistant: truncated,
        });
        if self.history.len() > MAX_HISTORY_ENTRIES {
            let excess = self.history.len() - MAX_HISTORY_ENTRIES;
            self.history.drain(0..excess);
        }
    }

    pub fn mid_flow_status(&self) -> Option<(&'static str, FlowStatus)> {
        if self.recommendation_status == Some(FlowStatus::InProgress) {
            return Some(("recommendation", FlowStatus::InProgress));
        }
        if self.comparison_status == Some(FlowStatus::InProgress) {
            return Some(("comparison", FlowStatus::InProgress));
        }
        if self.summary_status == Some(FlowStatus::InProgress) {
            return Some(("summary", FlowStatus::InProgress));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped_and_truncated() {
        let mut s = Session::new("s1");
        for i in 0..8 {
            s.append_history(format!("msg{i}"), &"x".repeat(150));
        }
        assert_eq!(s.history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(s.history.last().unwrap().user, "msg7");
        assert_eq!(
            s.history.last().unwrap().assistant.chars().count(),
            HISTORY_ASSISTANT_TRUNCATE_CHARS
        );
    }

    #[test]
    fn reset_preserves_history_and_created_at() {
        let mut s = Session::new("s1");
        s.append_history("hi", "hello");
        s.product = Some(Product::Travel);
        s.recommendation_status = Some(FlowStatus::InProgress);
        let created = s.created_at;
        s.reset_transient();
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.created_at, created);
        assert!(s.product.is_none());
        assert!(s.recommendation_status.is_none());
    }

    #[test]
    fn at_most_one_status_in_progress_by_construction() {
        let mut s = Session::new("s1");
        s.recommendation_status = Some(FlowStatus::InProgress);
        assert_eq!(s.mid_flow_status().unwrap().0, "recommendation");
    }
}
