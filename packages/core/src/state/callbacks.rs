// Менеджер событий SDK
//
// Поздний подписчик сразу получает SdkLoaded и InitCompleted, если они уже
// были отправлены. IdentityUpdated / OptoutReceived не повторяются.

use super::status::IdentityStatus;
use crate::storage::models::Identity;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::cell::{Cell, RefCell};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SdkEvent {
    SdkLoaded,
    InitCompleted,
    IdentityUpdated,
    OptoutReceived,
}

impl SdkEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            SdkEvent::SdkLoaded => "SdkLoaded",
            SdkEvent::InitCompleted => "InitCompleted",
            SdkEvent::IdentityUpdated => "IdentityUpdated",
            SdkEvent::OptoutReceived => "OptoutReceived",
        }
    }
}

/// Payload событий и init callback: статус последней валидации и текущая идентичность
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPayload {
    pub status: IdentityStatus,
    pub status_text: String,
    pub advertising_token: Option<String>,
    pub identity: Option<Identity>,
}

impl EventPayload {
    pub fn new(status: IdentityStatus, status_text: impl Into<String>, identity: Option<Identity>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            advertising_token: identity.as_ref().map(|i| i.advertising_token.clone()),
            identity,
        }
    }

    /// Текст статуса по умолчанию
    pub fn from_status(status: IdentityStatus, identity: Option<Identity>) -> Self {
        Self::new(status, status.text(), identity)
    }
}

impl Default for EventPayload {
    fn default() -> Self {
        Self::from_status(IdentityStatus::NoIdentity, None)
    }
}

// advertisingToken и advertising_token оба заполняются для совместимости
impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EventPayload", 5)?;
        state.serialize_field("status", &self.status)?;
        state.serialize_field("statusText", &self.status_text)?;
        state.serialize_field("advertisingToken", &self.advertising_token)?;
        state.serialize_field("advertising_token", &self.advertising_token)?;
        state.serialize_field("identity", &self.identity)?;
        state.end()
    }
}

pub type Subscriber = Rc<dyn Fn(SdkEvent, &EventPayload)>;

#[derive(Default)]
pub struct CallbackManager {
    subscribers: RefCell<Vec<Subscriber>>,
    sent_sdk_loaded: Cell<bool>,
    sent_init: Cell<bool>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.borrow().is_empty()
    }

    pub fn init_sent(&self) -> bool {
        self.sent_init.get()
    }

    /// Подписаться; уже отправленные SdkLoaded / InitCompleted
    /// доставляются только новому подписчику
    pub fn subscribe(&self, callback: Subscriber, payload: EventPayload) {
        if self.sent_sdk_loaded.get() {
            Self::invoke(&callback, SdkEvent::SdkLoaded, &payload);
        }
        if self.sent_init.get() {
            Self::invoke(&callback, SdkEvent::InitCompleted, &payload);
        }
        self.subscribers.borrow_mut().push(callback);
    }

    pub fn run_callbacks(&self, event: SdkEvent, payload: EventPayload) {
        match event {
            SdkEvent::SdkLoaded => self.sent_sdk_loaded.set(true),
            SdkEvent::InitCompleted => self.sent_init.set(true),
            _ if !self.sent_init.get() => {
                tracing::debug!("dropping {} raised before init", event.as_str());
                return;
            }
            _ => {}
        }

        // Снимок: подписчик может подписать кого-то ещё во время доставки
        let snapshot: Vec<Subscriber> = self.subscribers.borrow().clone();
        for callback in &snapshot {
            Self::invoke(callback, event, &payload);
        }
    }

    fn invoke(callback: &Subscriber, event: SdkEvent, payload: &EventPayload) {
        if catch_unwind(AssertUnwindSafe(|| callback(event, payload))).is_err() {
            tracing::error!("subscriber panicked while handling {}", event.as_str());
        }
    }
}

impl std::fmt::Debug for CallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackManager")
            .field("subscribers", &self.len())
            .field("sent_sdk_loaded", &self.sent_sdk_loaded.get())
            .field("sent_init", &self.sent_init.get())
            .finish()
    }
}
