use tracing::debug;

use crate::client::ChatApi;
use crate::error::{ChatError, Result};
use crate::models::ConversationSet;

/// Re-queries both listings in full. Nothing is cached between calls, so
/// rooms created after start show up on the next cycle.
pub async fn resolve<A>(api: &A) -> Result<ConversationSet>
where
    A: ChatApi + ?Sized,
{
    let rooms = api
        .list_rooms()
        .await
        .map_err(|e| ChatError::Directory(Box::new(e)))?;
    let ims = api
        .list_direct_messages()
        .await
        .map_err(|e| ChatError::Directory(Box::new(e)))?;

    let set = ConversationSet::from_listings(&rooms, &ims);
    debug!(
        channels = set.channels.len(),
        direct_messages = set.direct_messages.len(),
        "resolved conversations"
    );
    Ok(set)
}
