//! The polling engine: conversation directory, history windows, the dedup
//! window, and the loop that ties them into one stream.

pub mod dedup;
pub mod directory;
pub mod history;
pub mod poller;

#[cfg(test)]
pub(crate) mod testing;

pub use dedup::DedupWindow;
pub use history::PollCursor;
pub use poller::{IncomingStream, Poller, Stopped, start_incoming_stream};
