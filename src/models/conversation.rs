use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConversationKind {
    Channel,
    PrivateGroup,
    DirectMessage,
}

impl ConversationKind {
    /// Maps the service's one-letter room type.
    pub fn from_room_type(room_type: Option<&str>) -> Self {
        match room_type {
            Some("d") => Self::DirectMessage,
            Some("p") => Self::PrivateGroup,
            _ => Self::Channel,
        }
    }

    pub fn is_direct(self) -> bool {
        self == Self::DirectMessage
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel => write!(f, "channel"),
            Self::PrivateGroup => write!(f, "group"),
            Self::DirectMessage => write!(f, "dm"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationRef {
    pub id: String,
    pub kind: ConversationKind,
}

impl ConversationRef {
    pub fn new(id: impl Into<String>, kind: ConversationKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Entry of `rooms.get`.
#[derive(Debug, Clone, Deserialize)]
pub struct RoomSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "t", default)]
    pub room_type: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// Entry of `channels.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub msgs: u64,
}

/// Entry of `im.list`.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectMessageSummary {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub msgs: u64,
    #[serde(default)]
    pub usernames: Vec<String>,
}

/// Pollable conversations for one cycle. Rebuilt from scratch every cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationSet {
    pub channels: Vec<ConversationRef>,
    pub direct_messages: Vec<ConversationRef>,
}

impl ConversationSet {
    /// Builds the two disjoint sequences. Rooms of type `d` and rooms that
    /// also appear in the IM listing only ever land in `direct_messages`.
    pub fn from_listings(rooms: &[RoomSummary], ims: &[DirectMessageSummary]) -> Self {
        let mut seen = HashSet::new();
        let direct_messages: Vec<_> = ims
            .iter()
            .filter(|im| seen.insert(im.id.clone()))
            .map(|im| ConversationRef::new(im.id.clone(), ConversationKind::DirectMessage))
            .collect();

        let channels = rooms
            .iter()
            .filter(|room| room.room_type.as_deref() != Some("d"))
            .filter(|room| seen.insert(room.id.clone()))
            .map(|room| {
                ConversationRef::new(
                    room.id.clone(),
                    ConversationKind::from_room_type(room.room_type.as_deref()),
                )
            })
            .collect();

        Self {
            channels,
            direct_messages,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len() + self.direct_messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.id.as_str())
    }

    pub fn direct_message_ids(&self) -> impl Iterator<Item = &str> {
        self.direct_messages.iter().map(|c| c.id.as_str())
    }

    /// Polling order: direct messages first, then channel-like rooms.
    pub fn in_poll_order(&self) -> impl Iterator<Item = &ConversationRef> {
        self.direct_messages.iter().chain(self.channels.iter())
    }
}
