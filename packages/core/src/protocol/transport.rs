// HTTP транспорт
// Обертка над браузерным XMLHttpRequest для WASM

use futures::future::LocalBoxFuture;
use thiserror::Error;

#[cfg(target_arch = "wasm32")]
use futures::channel::oneshot;
#[cfg(target_arch = "wasm32")]
use std::{cell::RefCell, rc::Rc};
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsCast;
#[cfg(target_arch = "wasm32")]
use web_sys::XmlHttpRequest;

pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// POST-запрос к API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub body: String,
    pub content_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP transport only available in WASM target")]
    Unsupported,
}

/// Транспорт запросов к API.
///
/// Сброс (drop) возвращённого future отменяет запрос.
pub trait HttpTransport {
    fn post(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, TransportError>>;
}

/// XMLHttpRequest транспорт для WASM
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct XhrTransport;

#[cfg(target_arch = "wasm32")]
impl XhrTransport {
    pub fn new() -> Self {
        Self
    }

    fn start(
        request: &HttpRequest,
    ) -> Result<(InFlight, oneshot::Receiver<Result<HttpResponse, TransportError>>), TransportError> {
        let xhr = XmlHttpRequest::new()
            .map_err(|e| TransportError::Network(format!("Failed to create XMLHttpRequest: {:?}", e)))?;
        xhr.open("POST", &request.url)
            .map_err(|e| TransportError::Network(format!("Failed to open request: {:?}", e)))?;
        xhr.set_request_header("Content-Type", request.content_type)
            .map_err(|e| TransportError::Network(format!("Failed to set header: {:?}", e)))?;

        let (tx, rx) = oneshot::channel();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let xhr_cb = xhr.clone();

        let on_change = Closure::wrap(Box::new(move || {
            if xhr_cb.ready_state() != XHR_DONE {
                return;
            }
            let result = match xhr_cb.status() {
                // status 0: сетевая ошибка, CORS или abort
                Ok(0) | Err(_) => Err(TransportError::Network("request failed".to_string())),
                Ok(status) => Ok(HttpResponse {
                    status,
                    body: xhr_cb.response_text().ok().flatten().unwrap_or_default(),
                }),
            };
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(result);
            }
        }) as Box<dyn FnMut()>);

        xhr.set_onreadystatechange(Some(on_change.as_ref().unchecked_ref()));
        xhr.send_with_opt_str(Some(&request.body))
            .map_err(|e| TransportError::Network(format!("Failed to send request: {:?}", e)))?;

        Ok((
            InFlight {
                xhr,
                _on_change: on_change,
                settled: false,
            },
            rx,
        ))
    }
}

#[cfg(target_arch = "wasm32")]
const XHR_DONE: u16 = 4;

/// Запрос в полёте; drop до завершения вызывает `xhr.abort()`
#[cfg(target_arch = "wasm32")]
struct InFlight {
    xhr: XmlHttpRequest,
    _on_change: Closure<dyn FnMut()>,
    settled: bool,
}

#[cfg(target_arch = "wasm32")]
impl Drop for InFlight {
    fn drop(&mut self) {
        self.xhr.set_onreadystatechange(None);
        if !self.settled {
            let _ = self.xhr.abort();
        }
    }
}

#[cfg(target_arch = "wasm32")]
impl HttpTransport for XhrTransport {
    fn post(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, TransportError>> {
        let started = Self::start(&request);
        Box::pin(async move {
            let (mut in_flight, rx) = started?;
            let result = rx.await;
            in_flight.settled = true;
            result.unwrap_or_else(|_| Err(TransportError::Network("request was dropped".to_string())))
        })
    }
}

/// Заглушка для не-WASM платформ
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct UnsupportedTransport;

#[cfg(not(target_arch = "wasm32"))]
impl UnsupportedTransport {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl HttpTransport for UnsupportedTransport {
    fn post(&self, _request: HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, TransportError>> {
        Box::pin(async { Err(TransportError::Unsupported) })
    }
}
