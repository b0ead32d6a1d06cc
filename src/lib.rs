//! Polls a Rocket.Chat-style REST API and turns the history of every channel
//! and direct-message room into one deduplicated stream of new messages.
//!
//! ```no_run
//! # async fn demo() -> Result<(), rocket_stream::ChatError> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rocket_stream::{ClientConfig, RocketClient};
//!
//! let client = RocketClient::new(&ClientConfig::new("https://chat.example.com"))?;
//! let session = client.login("bot", "secret").await?;
//! let chat = Arc::new(client.with_session(session));
//! let mut stream = chat.incoming_stream(Duration::from_secs(2))?;
//! while let Some(message) = stream.recv().await {
//!     println!("{}: {}", message.author.username, message.text);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod processing;
pub mod telemetry;
pub mod utils;

pub use client::{ChatApi, ChatSession, HistoryRequest, PostMessage, RocketClient, Session};
pub use config::{ClientConfig, PollerConfig};
pub use error::{ChatError, Result};
pub use models::{Message, PollStats};
pub use processing::{IncomingStream, start_incoming_stream};
