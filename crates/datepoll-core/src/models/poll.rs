use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The part of a poll the session core needs to list and link to polls.
/// Everything else travels as loose JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PollSummary {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl PollSummary {
    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at < Utc::now()).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollListResponse {
    #[serde(default)]
    pub polls: Vec<PollSummary>,
    #[serde(default)]
    pub count: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PollEnvelope {
    pub poll: PollSummary,
}
