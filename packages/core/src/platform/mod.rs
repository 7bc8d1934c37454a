//! Платформа, на которой работает SDK.
//!
//! SDK однопоточный и кооперативный: ему нужны часы, запуск локальных future
//! и одноразовые таймеры. В браузере это `Date.now()`, `spawn_local` и
//! `setTimeout`; в остальных случаях всё детерминированно ведёт
//! [`manual::ManualPlatform`].

use futures::future::LocalBoxFuture;

pub mod manual;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use manual::ManualPlatform;

#[cfg(target_arch = "wasm32")]
pub use web::WebPlatform;

/// Идентификатор взведённого таймера
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

pub trait Platform {
    /// Текущее время, мс с эпохи
    fn now_ms(&self) -> i64;

    /// Запустить future в event loop текущего потока
    fn spawn_local(&self, task: LocalBoxFuture<'static, ()>);

    /// Взвести одноразовый таймер
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerId;

    /// Отменить таймер; неизвестные и уже сработавшие id игнорируются
    fn clear_timeout(&self, id: TimerId);
}
