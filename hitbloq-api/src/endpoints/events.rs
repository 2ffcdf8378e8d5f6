use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

/// Id the service uses when no event is running
pub const NO_EVENT_ID: i64 = -1;

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub pool: Option<String>,
}

impl Event {
    pub fn is_active(&self) -> bool {
        self.id != NO_EVENT_ID
    }
}

// Requests

#[derive(Default, Debug, Clone)]
pub struct GetCurrentEvent;

impl GetCurrentEvent {
    pub fn new() -> Self {
        Self
    }
}

impl Request for GetCurrentEvent {
    type Data = ();
    type Response = Event;

    fn endpoint(&self) -> Cow<'_, str> {
        "/api/event".into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}
