mod conversation;
mod message;
mod stats;

pub use conversation::{
    ChannelSummary, ConversationKind, ConversationRef, ConversationSet, DirectMessageSummary,
    RoomSummary,
};
pub use message::{Author, Message};
pub use stats::{CycleReport, PollStats};
pub(crate) use stats::millis;
