use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::error::Result;
use crate::models::{ConversationKind, ConversationRef, DirectMessageSummary, Message, RoomSummary};

/// Parameters of one history window request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    pub conversation: ConversationRef,
    /// Upper edge; `None` means up to now.
    pub latest: Option<DateTime<Utc>>,
    pub oldest: DateTime<Utc>,
    pub include_unread: bool,
}

impl HistoryRequest {
    /// Everything newer than `oldest`, including unread markers.
    pub fn since(conversation: ConversationRef, oldest: DateTime<Utc>) -> Self {
        Self {
            conversation,
            latest: None,
            oldest,
            include_unread: true,
        }
    }

    pub fn endpoint(&self) -> &'static str {
        match self.conversation.kind {
            ConversationKind::Channel => "channels.history",
            ConversationKind::PrivateGroup => "groups.history",
            ConversationKind::DirectMessage => "im.history",
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![("roomId", self.conversation.id.clone())];
        if let Some(latest) = self.latest {
            query.push(("latest", format_timestamp(latest)));
        }
        query.push(("oldest", format_timestamp(self.oldest)));
        query.push(("unreads", self.include_unread.to_string()));
        query
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The slice of the service the polling engine depends on.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Identifier of the authenticated user.
    fn user_id(&self) -> &str;

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>>;

    async fn list_direct_messages(&self) -> Result<Vec<DirectMessageSummary>>;

    async fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<Message>>;
}
