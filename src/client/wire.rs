//! Response envelopes of the REST endpoints the client talks to.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{ChannelSummary, DirectMessageSummary, Message, RoomSummary};

/// Responses that carry the service's own success flag.
pub(crate) trait Envelope {
    fn succeeded(&self) -> bool;
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(rename = "errorType", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn describe(&self) -> String {
        match (&self.error, &self.message) {
            (Some(Value::String(error)), _) => error.clone(),
            (_, Some(message)) => message.clone(),
            (Some(other), None) => other.to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub status: String,
    pub data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginData {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "authToken")]
    pub auth_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogoutResponse {
    pub status: String,
}

impl Envelope for LogoutResponse {
    fn succeeded(&self) -> bool {
        self.status != "error"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoomsGetResponse {
    #[serde(default)]
    pub update: Vec<RoomSummary>,
    #[serde(default)]
    pub success: Option<bool>,
}

impl Envelope for RoomsGetResponse {
    fn succeeded(&self) -> bool {
        self.success != Some(false)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelsListResponse {
    #[serde(default)]
    pub channels: Vec<ChannelSummary>,
    #[serde(default)]
    pub success: bool,
}

impl Envelope for ChannelsListResponse {
    fn succeeded(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImListResponse {
    #[serde(default)]
    pub ims: Vec<DirectMessageSummary>,
    #[serde(default)]
    pub success: bool,
}

impl Envelope for ImListResponse {
    fn succeeded(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub success: bool,
}

impl Envelope for HistoryResponse {
    fn succeeded(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostMessageResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<Message>,
}

impl Envelope for PostMessageResponse {
    fn succeeded(&self) -> bool {
        self.success
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

impl Envelope for SuccessResponse {
    fn succeeded(&self) -> bool {
        self.success
    }
}
