//! REST client for the chat service.
//!
//! [`RocketClient`] is unauthenticated and only knows how to log in. A
//! successful login yields a [`Session`], and [`ChatSession`] pairs the two for
//! every other call. Each operation is one request: no retries, no paging.

mod api;
mod wire;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

pub use api::{ChatApi, HistoryRequest, format_timestamp};

use crate::config::{ClientConfig, PollerConfig};
use crate::error::{ChatError, Result};
use crate::models::{ChannelSummary, DirectMessageSummary, Message, RoomSummary};
use crate::processing::{IncomingStream, start_incoming_stream};
use wire::{
    ChannelsListResponse, Envelope, ErrorResponse, HistoryResponse, ImListResponse, LoginRequest,
    LoginResponse, LogoutResponse, PostMessageResponse, RoomsGetResponse, SuccessResponse,
};

const USER_AGENT: &str = concat!("rocket-stream/", env!("CARGO_PKG_VERSION"));
const AUTH_TOKEN_HEADER: &str = "x-auth-token";
const USER_ID_HEADER: &str = "x-user-id";
const ERROR_BODY_PREVIEW: usize = 200;

/// Credentials returned by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub auth_token: String,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user_id", &self.user_id)
            .field("auth_token", &"<redacted>")
            .finish()
    }
}

#[derive(Clone)]
pub struct RocketClient {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for RocketClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RocketClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl RocketClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ChatError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.normalized_base_url(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, endpoint)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session> {
        const ENDPOINT: &str = "login";
        debug!(username, "logging in");
        let response = self
            .http
            .post(self.url(ENDPOINT))
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|source| ChatError::Transport {
                endpoint: ENDPOINT,
                source,
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|source| ChatError::Transport {
            endpoint: ENDPOINT,
            source,
        })?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.describe())
                .unwrap_or_else(|_| body_preview(&body));
            return Err(ChatError::Auth {
                status: status.as_u16(),
                message,
            });
        }

        let login: LoginResponse =
            serde_json::from_slice(&body).map_err(|source| ChatError::Decode {
                endpoint: ENDPOINT,
                source,
            })?;
        match login.data {
            Some(data) if login.status == "success" => {
                info!(user_id = %data.user_id, "logged in");
                Ok(Session {
                    user_id: data.user_id,
                    auth_token: data.auth_token,
                })
            }
            _ => Err(ChatError::Auth {
                status: status.as_u16(),
                message: format!("login answered with status '{}'", login.status),
            }),
        }
    }

    pub fn with_session(self, session: Session) -> ChatSession {
        ChatSession {
            client: self,
            session,
        }
    }

    async fn send<T>(&self, endpoint: &'static str, request: reqwest::RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned + Envelope,
    {
        let response = request.send().await.map_err(|source| ChatError::Transport {
            endpoint,
            source,
        })?;
        let status = response.status();

        if status.is_client_error() {
            let body = response.bytes().await.map_err(|source| ChatError::Transport {
                endpoint,
                source,
            })?;
            let (error_type, message) = match serde_json::from_slice::<ErrorResponse>(&body) {
                Ok(payload) => (payload.error_type.clone().unwrap_or_default(), payload.describe()),
                Err(_) => (String::new(), body_preview(&body)),
            };
            return Err(ChatError::Upstream {
                endpoint,
                status: status.as_u16(),
                error_type,
                message,
            });
        }

        let response = response
            .error_for_status()
            .map_err(|source| ChatError::Transport { endpoint, source })?;
        let body = response.bytes().await.map_err(|source| ChatError::Transport {
            endpoint,
            source,
        })?;
        let payload: T =
            serde_json::from_slice(&body).map_err(|source| ChatError::Decode { endpoint, source })?;
        if !payload.succeeded() {
            return Err(ChatError::Upstream {
                endpoint,
                status: status.as_u16(),
                error_type: "unsuccessful".to_string(),
                message: format!("{endpoint} reported success=false"),
            });
        }
        Ok(payload)
    }
}

/// Authenticated handle: a client plus the session it acts as.
#[derive(Debug, Clone)]
pub struct ChatSession {
    client: RocketClient,
    session: Session,
}

/// Body of `chat.postMessage`. Either `channel` or `room_id` must be set.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(rename = "roomId", skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
}

impl PostMessage {
    /// `channel` accepts `#name`, `@username` or a room id.
    pub fn to_channel(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: Some(channel.into()),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn to_room(room_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            room_id: Some(room_id.into()),
            text: text.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub room_id: Option<String>,
    pub message: Option<Message>,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    message: &'a str,
    status: &'a str,
}

impl ChatSession {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn client(&self) -> &RocketClient {
        &self.client
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.http.get(self.client.url(endpoint)))
    }

    fn post(&self, endpoint: &str) -> reqwest::RequestBuilder {
        self.authorize(self.client.http.post(self.client.url(endpoint)))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header(AUTH_TOKEN_HEADER, &self.session.auth_token)
            .header(USER_ID_HEADER, &self.session.user_id)
    }

    pub async fn logout(&self) -> Result<()> {
        let _: LogoutResponse = self.client.send("logout", self.post("logout")).await?;
        info!(user_id = %self.session.user_id, "logged out");
        Ok(())
    }

    pub async fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        let resp: RoomsGetResponse = self.client.send("rooms.get", self.get("rooms.get")).await?;
        Ok(resp.update)
    }

    pub async fn list_channels(&self) -> Result<Vec<ChannelSummary>> {
        let resp: ChannelsListResponse = self
            .client
            .send("channels.list", self.get("channels.list"))
            .await?;
        Ok(resp.channels)
    }

    pub async fn list_direct_messages(&self) -> Result<Vec<DirectMessageSummary>> {
        let resp: ImListResponse = self.client.send("im.list", self.get("im.list")).await?;
        Ok(resp.ims)
    }

    pub async fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<Message>> {
        let endpoint = request.endpoint();
        let resp: HistoryResponse = self
            .client
            .send(endpoint, self.get(endpoint).query(&request.query()))
            .await?;
        debug!(
            room_id = %request.conversation.id,
            kind = %request.conversation.kind,
            count = resp.messages.len(),
            "fetched history window"
        );
        Ok(resp.messages)
    }

    /// Direct-message history with one user, looked up by username.
    pub async fn direct_messages_with(&self, username: &str) -> Result<Vec<Message>> {
        let resp: HistoryResponse = self
            .client
            .send(
                "im.messages",
                self.get("im.messages").query(&[("username", username)]),
            )
            .await?;
        Ok(resp.messages)
    }

    pub async fn post_message(&self, message: &PostMessage) -> Result<PostedMessage> {
        if message.channel.is_none() && message.room_id.is_none() {
            return Err(ChatError::Config(
                "post message needs a channel or a room id".to_string(),
            ));
        }
        let resp: PostMessageResponse = self
            .client
            .send(
                "chat.postMessage",
                self.post("chat.postMessage").json(message),
            )
            .await?;
        Ok(PostedMessage {
            room_id: resp.channel,
            message: resp.message,
        })
    }

    pub async fn set_status(&self, message: &str, status: &str) -> Result<()> {
        let _: SuccessResponse = self
            .client
            .send(
                "users.setStatus",
                self.post("users.setStatus")
                    .json(&StatusBody { message, status }),
            )
            .await?;
        Ok(())
    }

    /// Starts polling as this session's user with the default dedup window.
    pub fn incoming_stream(self: &Arc<Self>, poll_interval: Duration) -> Result<IncomingStream> {
        let config = PollerConfig::new(poll_interval, self.session.user_id.clone());
        start_incoming_stream(Arc::clone(self), config)
    }
}

#[async_trait]
impl ChatApi for ChatSession {
    fn user_id(&self) -> &str {
        &self.session.user_id
    }

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        ChatSession::list_rooms(self).await
    }

    async fn list_direct_messages(&self) -> Result<Vec<DirectMessageSummary>> {
        ChatSession::list_direct_messages(self).await
    }

    async fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<Message>> {
        ChatSession::fetch_history(self, request).await
    }
}

fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() <= ERROR_BODY_PREVIEW {
        return text.into_owned();
    }
    warn!(len = body.len(), "truncating error body");
    text.chars().take(ERROR_BODY_PREVIEW).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::models::{ConversationKind, ConversationRef};

    fn client_for(server: &MockServer) -> RocketClient {
        RocketClient::new(&ClientConfig::new(server.base_url())).expect("client")
    }

    fn session_for(server: &MockServer) -> ChatSession {
        client_for(server).with_session(Session {
            user_id: "u1".to_string(),
            auth_token: "tok".to_string(),
        })
    }

    #[tokio::test]
    async fn login_returns_explicit_session() {
        let server = MockServer::start();
        let login = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/login")
                .json_body(json!({"username": "bot", "password": "secret"}));
            then.status(200).json_body(json!({
                "status": "success",
                "data": {"userId": "u1", "authToken": "tok", "me": {"_id": "u1"}}
            }));
        });

        let session = client_for(&server).login("bot", "secret").await.expect("login");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.auth_token, "tok");
        assert!(!format!("{session:?}").contains("tok\""));
        login.assert_calls(1);
    }

    #[tokio::test]
    async fn login_failure_maps_to_auth_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/login");
            then.status(401)
                .json_body(json!({"status": "error", "error": 401, "message": "Unauthorized"}));
        });

        let err = client_for(&server).login("bot", "wrong").await.unwrap_err();
        match err {
            ChatError::Auth { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Unauthorized");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn history_request_carries_auth_headers_and_window() {
        let server = MockServer::start();
        let history = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/im.history")
                .header(AUTH_TOKEN_HEADER, "tok")
                .header(USER_ID_HEADER, "u1")
                .query_param("roomId", "dm1")
                .query_param("oldest", "2024-03-01T10:00:00.000Z")
                .query_param("unreads", "true");
            then.status(200).json_body(json!({
                "success": true,
                "messages": [{
                    "_id": "m1",
                    "rid": "dm1",
                    "msg": "hi",
                    "ts": "2024-03-01T10:00:01.000Z",
                    "_updatedAt": "2024-03-01T10:00:01.000Z",
                    "u": {"_id": "u2", "username": "bob"}
                }]
            }));
        });

        let request = HistoryRequest::since(
            ConversationRef::new("dm1", ConversationKind::DirectMessage),
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
        );
        let messages = session_for(&server)
            .fetch_history(&request)
            .await
            .expect("history");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].author.username, "bob");
        history.assert_calls(1);
    }

    #[tokio::test]
    async fn client_errors_become_upstream_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/channels.history");
            then.status(400).json_body(json!({
                "success": false,
                "error": "The required \"roomId\" param provided does not match any channel",
                "errorType": "error-room-not-found"
            }));
        });

        let request = HistoryRequest::since(
            ConversationRef::new("gone", ConversationKind::Channel),
            Utc::now(),
        );
        let err = session_for(&server).fetch_history(&request).await.unwrap_err();
        match err {
            ChatError::Upstream {
                endpoint,
                status,
                error_type,
                ..
            } => {
                assert_eq!(endpoint, "channels.history");
                assert_eq!(status, 400);
                assert_eq!(error_type, "error-room-not-found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_errors_and_garbage_are_transport_class() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/im.list");
            then.status(502).body("bad gateway");
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/rooms.get");
            then.status(200).body("<html>not json</html>");
        });

        let session = session_for(&server);
        let im_err = session.list_direct_messages().await.unwrap_err();
        assert!(matches!(im_err, ChatError::Transport { endpoint: "im.list", .. }));
        assert_eq!(im_err.status(), Some(502));

        let rooms_err = session.list_rooms().await.unwrap_err();
        assert!(matches!(rooms_err, ChatError::Decode { endpoint: "rooms.get", .. }));
        assert!(rooms_err.is_transport());
    }

    #[tokio::test]
    async fn unsuccessful_body_is_rejected() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/im.list");
            then.status(200).json_body(json!({"success": false, "ims": []}));
        });

        let err = session_for(&server).list_direct_messages().await.unwrap_err();
        assert!(matches!(err, ChatError::Upstream { status: 200, .. }));
    }

    #[tokio::test]
    async fn listings_decode_summaries() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/channels.list");
            then.status(200).json_body(json!({
                "success": true,
                "channels": [{"_id": "GENERAL", "name": "general", "msgs": 12}],
                "count": 1, "offset": 0, "total": 1
            }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/im.list");
            then.status(200).json_body(json!({
                "success": true,
                "ims": [{"_id": "u1u2", "msgs": 3, "usernames": ["bot", "bob"]}]
            }));
        });

        let session = session_for(&server);
        let channels = session.list_channels().await.expect("channels");
        assert_eq!(channels[0].name, "general");
        assert_eq!(channels[0].msgs, 12);
        let ims = session.list_direct_messages().await.expect("ims");
        assert_eq!(ims[0].usernames, vec!["bot", "bob"]);
    }

    #[tokio::test]
    async fn post_message_sends_typed_body() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/chat.postMessage")
                .json_body(json!({"channel": "#waza", "text": "a simple message"}));
            then.status(200).json_body(json!({
                "success": true,
                "ts": 1709287200000_i64,
                "channel": "GENERAL",
                "message": {
                    "_id": "m9",
                    "rid": "GENERAL",
                    "msg": "a simple message",
                    "ts": "2024-03-01T10:00:00.000Z",
                    "_updatedAt": "2024-03-01T10:00:00.000Z",
                    "u": {"_id": "u1", "username": "bot"}
                }
            }));
        });

        let posted = session_for(&server)
            .post_message(&PostMessage::to_channel("#waza", "a simple message"))
            .await
            .expect("post");
        assert_eq!(posted.room_id.as_deref(), Some("GENERAL"));
        assert_eq!(posted.message.map(|m| m.id), Some("m9".to_string()));
        post.assert_calls(1);
    }

    #[tokio::test]
    async fn post_message_without_target_is_rejected_locally() {
        let server = MockServer::start();
        let err = session_for(&server)
            .post_message(&PostMessage::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[tokio::test]
    async fn set_status_and_logout() {
        let server = MockServer::start();
        let status = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/users.setStatus")
                .json_body(json!({"message": "WAZAAAAAAAA", "status": "online"}));
            then.status(200).json_body(json!({"success": true}));
        });
        let logout = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/logout")
                .header(AUTH_TOKEN_HEADER, "tok");
            then.status(200).json_body(json!({
                "status": "success",
                "data": {"message": "You've been logged out!"}
            }));
        });

        let session = session_for(&server);
        session.set_status("WAZAAAAAAAA", "online").await.expect("status");
        session.logout().await.expect("logout");
        status.assert_calls(1);
        logout.assert_calls(1);
    }

    #[tokio::test]
    async fn direct_messages_with_queries_by_username() {
        let server = MockServer::start();
        let messages = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/im.messages")
                .query_param("username", "bob");
            then.status(200).json_body(json!({"success": true, "messages": []}));
        });

        let found = session_for(&server)
            .direct_messages_with("bob")
            .await
            .expect("im.messages");
        assert!(found.is_empty());
        messages.assert_calls(1);
    }
}
