//! Conversation types: exchanges, the bounded history window, and the
//! records the conversation store persists.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of exchanges fed back to the model as context.
pub const HISTORY_WINDOW_SIZE: usize = 10;

/// One completed turn: a user message paired with the model's reply.
///
/// Immutable once created. Fields are private so a constructed exchange
/// can only be read, never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    user_text: String,
    ai_text: String,
}

impl Exchange {
    pub fn new(user_text: impl Into<String>, ai_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            ai_text: ai_text.into(),
        }
    }

    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    pub fn ai_text(&self) -> &str {
        &self.ai_text
    }
}

/// Bounded, oldest-to-newest view of recent exchanges.
///
/// Invariant: holds at most [`HISTORY_WINDOW_SIZE`] exchanges. Building a
/// window from a longer sequence keeps the most recent tail and never
/// reorders what remains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    exchanges: Vec<Exchange>,
}

impl HistoryWindow {
    /// An empty window (first message of the day).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a window from exchanges ordered oldest to newest.
    pub fn from_recent(exchanges: impl IntoIterator<Item = Exchange>) -> Self {
        let mut exchanges: Vec<Exchange> = exchanges.into_iter().collect();
        if exchanges.len() > HISTORY_WINDOW_SIZE {
            exchanges.drain(..exchanges.len() - HISTORY_WINDOW_SIZE);
        }
        Self { exchanges }
    }

    pub fn exchanges(&self) -> &[Exchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

impl FromIterator<Exchange> for HistoryWindow {
    fn from_iter<I: IntoIterator<Item = Exchange>>(iter: I) -> Self {
        Self::from_recent(iter)
    }
}

/// A persisted exchange, as stored by the conversation repository.
///
/// `id` is assigned by the store and increases monotonically, so ordering by
/// `id` is ordering by insertion. `date` is the local calendar day the
/// exchange belongs to and scopes which history is fed back as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub id: i64,
    pub date: NaiveDate,
    pub user_message: String,
    pub ai_response: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationEntry {
    /// View this entry as a context exchange.
    pub fn to_exchange(&self) -> Exchange {
        Exchange::new(self.user_message.clone(), self.ai_response.clone())
    }
}

/// A conversation entry that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewConversationEntry {
    pub date: NaiveDate,
    pub user_message: String,
    pub ai_response: String,
    pub created_at: DateTime<Utc>,
}

/// End-of-day reflection. At most one exists per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub id: i64,
    pub date: NaiveDate,
    pub summary_text: String,
    pub sentiment_score: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A daily summary that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewDailySummary {
    pub date: NaiveDate,
    pub summary_text: String,
    pub sentiment_score: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
