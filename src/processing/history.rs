use chrono::{DateTime, Utc};

use crate::client::{ChatApi, HistoryRequest};
use crate::error::Result;
use crate::models::{ConversationRef, Message};

/// Lower edge of the next fetch window, shared by every conversation of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCursor(DateTime<Utc>);

impl PollCursor {
    pub fn starting_at(ts: DateTime<Utc>) -> Self {
        Self(ts)
    }

    pub fn oldest(&self) -> DateTime<Utc> {
        self.0
    }

    /// Moves to `cycle_start`; never moves backwards.
    pub fn advance_to(&mut self, cycle_start: DateTime<Utc>) {
        if cycle_start > self.0 {
            self.0 = cycle_start;
        }
    }
}

/// Everything in `conversation` newer than the cursor, in the order the
/// service returns it.
pub async fn fetch_window<A>(
    api: &A,
    conversation: &ConversationRef,
    cursor: PollCursor,
) -> Result<Vec<Message>>
where
    A: ChatApi + ?Sized,
{
    let request = HistoryRequest::since(conversation.clone(), cursor.oldest());
    api.fetch_history(&request).await
}
