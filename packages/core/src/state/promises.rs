// Отложенные запросы токена (getAdvertisingTokenAsync)

use super::callbacks::{EventPayload, SdkEvent};
use futures::channel::oneshot;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Ответ сразу: init завершён, идентичности нет
    #[error("Identity not available")]
    NotAvailable,

    /// Ответ на отложенный запрос
    #[error("No identity available.")]
    NoIdentity,

    #[error("{0}")]
    Aborted(String),
}

type TokenResult = Result<String, TokenError>;

/// Future результата `get_advertising_token_async`
#[must_use = "futures do nothing unless polled"]
pub struct AdvertisingTokenFuture {
    state: TokenFutureState,
}

enum TokenFutureState {
    Ready(Option<TokenResult>),
    Pending(oneshot::Receiver<TokenResult>),
}

impl AdvertisingTokenFuture {
    pub fn ready(result: TokenResult) -> Self {
        Self {
            state: TokenFutureState::Ready(Some(result)),
        }
    }

    fn pending(receiver: oneshot::Receiver<TokenResult>) -> Self {
        Self {
            state: TokenFutureState::Pending(receiver),
        }
    }
}

impl Future for AdvertisingTokenFuture {
    type Output = TokenResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().state {
            TokenFutureState::Ready(result) => Poll::Ready(
                result
                    .take()
                    .unwrap_or_else(|| Err(TokenError::Aborted("token future polled after completion".into()))),
            ),
            TokenFutureState::Pending(receiver) => Pin::new(receiver).poll(cx).map(|result| {
                result.unwrap_or_else(|_| Err(TokenError::Aborted("SDK dropped".to_string())))
            }),
        }
    }
}

impl std::fmt::Debug for AdvertisingTokenFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            TokenFutureState::Ready(_) => "ready",
            TokenFutureState::Pending(_) => "pending",
        };
        f.debug_struct("AdvertisingTokenFuture").field("state", &state).finish()
    }
}

#[derive(Default)]
pub struct PromiseHandler {
    pending: RefCell<Vec<oneshot::Sender<TokenResult>>>,
    /// InitCompleted уже наблюдался (или был rejectAll)
    seen_init: Cell<bool>,
}

impl PromiseHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Отложить запрос до завершения init / запросов в полёте,
    /// иначе ответить сразу
    pub fn get_advertising_token_async(
        &self,
        current_token: Option<String>,
        has_active_requests: bool,
    ) -> AdvertisingTokenFuture {
        if !self.seen_init.get() || has_active_requests {
            let (tx, rx) = oneshot::channel();
            self.pending.borrow_mut().push(tx);
            return AdvertisingTokenFuture::pending(rx);
        }
        AdvertisingTokenFuture::ready(current_token.ok_or(TokenError::NotAvailable))
    }

    pub fn handle_event(&self, event: SdkEvent, payload: &EventPayload, has_active_requests: bool) {
        match event {
            SdkEvent::InitCompleted => self.seen_init.set(true),
            SdkEvent::IdentityUpdated => {}
            _ => return,
        }
        if has_active_requests {
            return;
        }

        let token = payload.advertising_token.clone();
        let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        if !pending.is_empty() {
            tracing::debug!("settling {} pending token request(s)", pending.len());
        }
        for tx in pending {
            let _ = tx.send(token.clone().ok_or(TokenError::NoIdentity));
        }
    }

    /// Отклонить все ожидающие запросы; последующие запросы отвечают сразу
    pub fn reject_all(&self, reason: TokenError) {
        self.seen_init.set(true);
        let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        for tx in pending {
            let _ = tx.send(Err(reason.clone()));
        }
    }
}

impl std::fmt::Debug for PromiseHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseHandler")
            .field("pending", &self.pending_count())
            .field("seen_init", &self.seen_init.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::status::IdentityStatus;
    use crate::storage::models::Identity;
    use futures::executor::block_on;
    use futures::FutureExt;

    fn payload(token: Option<&str>) -> EventPayload {
        let identity = token.map(|t| Identity {
            advertising_token: t.into(),
            refresh_token: "ref".into(),
            refresh_response_key: None,
            identity_expires: 2,
            refresh_from: 1,
            refresh_expires: 3,
        });
        let status = if identity.is_some() {
            IdentityStatus::Established
        } else {
            IdentityStatus::NoIdentity
        };
        EventPayload::from_status(status, identity)
    }

    #[test]
    fn test_queued_until_init() {
        let handler = PromiseHandler::new();
        let mut future = handler.get_advertising_token_async(Some("early".into()), false);
        assert!((&mut future).now_or_never().is_none());
        assert_eq!(handler.pending_count(), 1);

        handler.handle_event(SdkEvent::InitCompleted, &payload(Some("tok")), false);
        assert_eq!(block_on(future), Ok("tok".to_string()));
        assert_eq!(handler.pending_count(), 0);
    }

    #[test]
    fn test_waits_for_active_requests() {
        let handler = PromiseHandler::new();
        handler.handle_event(SdkEvent::InitCompleted, &payload(None), false);

        let future = handler.get_advertising_token_async(Some("old".into()), true);
        handler.handle_event(SdkEvent::IdentityUpdated, &payload(Some("new")), true);
        assert_eq!(handler.pending_count(), 1);

        handler.handle_event(SdkEvent::IdentityUpdated, &payload(None), false);
        assert_eq!(block_on(future), Err(TokenError::NoIdentity));
    }

    #[test]
    fn test_immediate_answers_after_init() {
        let handler = PromiseHandler::new();
        handler.handle_event(SdkEvent::InitCompleted, &payload(None), false);

        assert_eq!(
            block_on(handler.get_advertising_token_async(Some("tok".into()), false)),
            Ok("tok".to_string())
        );
        let err = block_on(handler.get_advertising_token_async(None, false)).unwrap_err();
        assert_eq!(err.to_string(), "Identity not available");
    }

    #[test]
    fn test_reject_all() {
        let handler = PromiseHandler::new();
        let future = handler.get_advertising_token_async(None, false);
        handler.reject_all(TokenError::Aborted("UID2 SDK aborted.".into()));
        assert_eq!(
            block_on(future),
            Err(TokenError::Aborted("UID2 SDK aborted.".into()))
        );

        // Больше не ставится в очередь
        let err = block_on(handler.get_advertising_token_async(None, false)).unwrap_err();
        assert_eq!(err, TokenError::NotAvailable);
    }
}
