//! In-memory [`ChatApi`] used by the processing tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use crate::client::{ChatApi, HistoryRequest};
use crate::error::{ChatError, Result};
use crate::models::{Author, DirectMessageSummary, Message, RoomSummary};

pub(crate) fn message(id: &str, author_id: &str, room_id: &str) -> Message {
    let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
    Message {
        id: id.to_string(),
        text: format!("text of {id}"),
        sent_at: ts,
        updated_at: ts,
        author: Author {
            id: author_id.to_string(),
            username: format!("user-{author_id}"),
            name: None,
        },
        room_id: room_id.to_string(),
    }
}

#[derive(Default)]
struct State {
    rooms: Vec<RoomSummary>,
    ims: Vec<DirectMessageSummary>,
    histories: HashMap<String, Vec<Message>>,
    failing_histories: HashSet<String>,
    rooms_down: bool,
    ims_down: bool,
    listing_calls: usize,
    history_requests: Vec<HistoryRequest>,
}

pub(crate) struct FakeChat {
    user_id: String,
    state: Mutex<State>,
}

impl FakeChat {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_room(self, id: &str, room_type: &str) -> Self {
        self.add_room(id, room_type);
        self
    }

    pub fn with_im(self, id: &str) -> Self {
        self.state.lock().unwrap().ims.push(DirectMessageSummary {
            id: id.to_string(),
            msgs: 0,
            usernames: Vec::new(),
        });
        self
    }

    pub fn with_history(self, room_id: &str, messages: Vec<Message>) -> Self {
        self.set_history(room_id, messages);
        self
    }

    pub fn failing_rooms(self) -> Self {
        self.set_rooms_down(true);
        self
    }

    pub fn failing_ims(self) -> Self {
        self.state.lock().unwrap().ims_down = true;
        self
    }

    pub fn add_room(&self, id: &str, room_type: &str) {
        self.state.lock().unwrap().rooms.push(RoomSummary {
            id: id.to_string(),
            name: Some(id.to_lowercase()),
            room_type: Some(room_type.to_string()),
            default: false,
        });
    }

    pub fn set_history(&self, room_id: &str, messages: Vec<Message>) {
        self.state
            .lock()
            .unwrap()
            .histories
            .insert(room_id.to_string(), messages);
    }

    pub fn set_history_failing(&self, room_id: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing_histories.insert(room_id.to_string());
        } else {
            state.failing_histories.remove(room_id);
        }
    }

    pub fn set_rooms_down(&self, down: bool) {
        self.state.lock().unwrap().rooms_down = down;
    }

    pub fn listing_calls(&self) -> usize {
        self.state.lock().unwrap().listing_calls
    }

    pub fn history_requests(&self) -> Vec<HistoryRequest> {
        self.state.lock().unwrap().history_requests.clone()
    }

    fn upstream(endpoint: &'static str) -> ChatError {
        ChatError::Upstream {
            endpoint,
            status: 400,
            error_type: "error-fake".to_string(),
            message: "scripted failure".to_string(),
        }
    }
}

#[async_trait]
impl ChatApi for FakeChat {
    fn user_id(&self) -> &str {
        &self.user_id
    }

    async fn list_rooms(&self) -> Result<Vec<RoomSummary>> {
        let mut state = self.state.lock().unwrap();
        state.listing_calls += 1;
        if state.rooms_down {
            return Err(Self::upstream("rooms.get"));
        }
        Ok(state.rooms.clone())
    }

    async fn list_direct_messages(&self) -> Result<Vec<DirectMessageSummary>> {
        let state = self.state.lock().unwrap();
        if state.ims_down {
            return Err(Self::upstream("im.list"));
        }
        Ok(state.ims.clone())
    }

    async fn fetch_history(&self, request: &HistoryRequest) -> Result<Vec<Message>> {
        let mut state = self.state.lock().unwrap();
        state.history_requests.push(request.clone());
        if state.failing_histories.contains(&request.conversation.id) {
            return Err(Self::upstream(request.endpoint()));
        }
        Ok(state
            .histories
            .get(&request.conversation.id)
            .cloned()
            .unwrap_or_default())
    }
}
