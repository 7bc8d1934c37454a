// Браузерная платформа: Date.now(), spawn_local и window.setTimeout

use super::{Platform, TimerId};
use futures::future::LocalBoxFuture;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[derive(Debug, Default)]
pub struct WebPlatform;

impl WebPlatform {
    pub fn new() -> Self {
        Self
    }
}

impl Platform for WebPlatform {
    fn now_ms(&self) -> i64 {
        js_sys::Date::now() as i64
    }

    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }

    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerId {
        let Some(window) = web_sys::window() else {
            tracing::warn!("window is not available, timer not armed");
            return TimerId(0);
        };

        // Closure освобождается после единственного вызова
        let closure = Closure::once_into_js(move || callback());
        match window.set_timeout_with_callback_and_timeout_and_arguments_0(
            closure.unchecked_ref(),
            delay_ms as i32,
        ) {
            Ok(handle) => TimerId(handle as u64),
            Err(e) => {
                tracing::warn!("setTimeout failed: {:?}", e);
                TimerId(0)
            }
        }
    }

    fn clear_timeout(&self, id: TimerId) {
        if let Some(window) = web_sys::window() {
            window.clear_timeout_with_handle(id.0 as i32);
        }
    }
}
