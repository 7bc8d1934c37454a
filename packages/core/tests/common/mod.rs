//! Общая обвязка интеграционных тестов: ручная платформа, in-memory
//! хранилища и транспорт со сценарием ответов.

#![allow(dead_code)]

use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use uid2_core::platform::ManualPlatform;
use uid2_core::protocol::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use uid2_core::state::{EventPayload, InitCallbackPayload, SdkEvent, SdkOptions};
use uid2_core::storage::{MemoryCookieJar, MemoryLocalStorage, StorageBackends};
use uid2_core::{Identity, ProductName, Sdk, SdkEnvironment};

pub const NOW: i64 = 1_700_000_000_000;

/// Отвечает заранее заданными ответами по очереди.
/// Когда очередь пуста, запрос висит до abort.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: RefCell<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn respond(&self, status: u16, body: impl Into<String>) {
        self.responses.borrow_mut().push_back(Ok(HttpResponse {
            status,
            body: body.into(),
        }));
    }

    pub fn fail(&self, message: &str) {
        self.responses
            .borrow_mut()
            .push_back(Err(TransportError::Network(message.to_string())));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl HttpTransport for ScriptedTransport {
    fn post(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, TransportError>> {
        self.requests.borrow_mut().push(request);
        match self.responses.borrow_mut().pop_front() {
            Some(response) => futures::future::ready(response).boxed_local(),
            None => futures::future::pending().boxed_local(),
        }
    }
}

pub type EventLog = Rc<RefCell<Vec<(SdkEvent, Option<String>)>>>;
pub type CallbackLog = Rc<RefCell<Vec<InitCallbackPayload>>>;

pub struct Harness {
    pub platform: Rc<ManualPlatform>,
    pub cookies: Rc<MemoryCookieJar>,
    pub local: Rc<MemoryLocalStorage>,
    pub transport: Rc<ScriptedTransport>,
    pub sdk: Sdk,
}

impl Harness {
    pub fn new(product: ProductName) -> Self {
        let platform = Rc::new(ManualPlatform::new(NOW));
        let cookies = Rc::new(MemoryCookieJar::new(platform.clone()));
        let local = Rc::new(MemoryLocalStorage::new());
        let transport = Rc::new(ScriptedTransport::default());
        let sdk = Sdk::new(product, Self::env_for(&platform, &cookies, &local, &transport));
        Self {
            platform,
            cookies,
            local,
            transport,
            sdk,
        }
    }

    pub fn uid2() -> Self {
        Self::new(ProductName::Uid2)
    }

    fn env_for(
        platform: &Rc<ManualPlatform>,
        cookies: &Rc<MemoryCookieJar>,
        local: &Rc<MemoryLocalStorage>,
        transport: &Rc<ScriptedTransport>,
    ) -> SdkEnvironment {
        SdkEnvironment::new(
            platform.clone(),
            StorageBackends {
                cookies: cookies.clone(),
                local_storage: local.clone(),
            },
            transport.clone(),
        )
    }

    /// Второй экземпляр поверх тех же хранилищ ("перезагрузка страницы")
    pub fn reload(&self, product: ProductName) -> Sdk {
        Sdk::new(
            product,
            Self::env_for(&self.platform, &self.cookies, &self.local, &self.transport),
        )
    }

    pub fn record_events(&self) -> EventLog {
        record_events(&self.sdk)
    }
}

pub fn record_events(sdk: &Sdk) -> EventLog {
    let log: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    sdk.subscribe(Rc::new(move |event: SdkEvent, payload: &EventPayload| {
        let token = payload.identity.as_ref().map(|i| i.advertising_token.clone());
        sink.borrow_mut().push((event, token));
    }));
    log
}

pub type PayloadLog = Rc<RefCell<Vec<(SdkEvent, EventPayload)>>>;

/// Полные payload событий, в порядке доставки
pub fn record_payloads(sdk: &Sdk) -> PayloadLog {
    let log: PayloadLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    sdk.subscribe(Rc::new(move |event: SdkEvent, payload: &EventPayload| {
        sink.borrow_mut().push((event, payload.clone()));
    }));
    log
}

/// Опции с init callback, который пишет payload в журнал
pub fn options_with_callback(identity: Option<Identity>) -> (SdkOptions, CallbackLog) {
    let log: CallbackLog = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let options = SdkOptions {
        identity,
        callback: Some(Rc::new(move |payload: &InitCallbackPayload| {
            sink.borrow_mut().push(payload.clone());
        })),
        ..Default::default()
    };
    (options, log)
}

/// Идентичность со сроками относительно `now`
pub fn identity_at(
    token: &str,
    now: i64,
    refresh_from_in: i64,
    identity_expires_in: i64,
    refresh_expires_in: i64,
) -> Identity {
    Identity {
        advertising_token: token.to_string(),
        refresh_token: format!("{}-refresh", token),
        refresh_response_key: None,
        identity_expires: now + identity_expires_in,
        refresh_from: now + refresh_from_in,
        refresh_expires: now + refresh_expires_in,
    }
}

/// Свежая идентичность: refresh через 100 с, истекает через 200 с
pub fn fresh_identity(token: &str) -> Identity {
    identity_at(token, NOW, 100_000, 200_000, 300_000)
}

/// Идентичность, которую пора обновлять
pub fn stale_identity(token: &str) -> Identity {
    identity_at(token, NOW, -1, 200_000, 300_000)
}

/// Тело успешного ответа refresh v1 (открытый JSON)
pub fn refresh_success_body(identity: &Identity) -> String {
    serde_json::json!({ "status": "success", "body": identity }).to_string()
}
