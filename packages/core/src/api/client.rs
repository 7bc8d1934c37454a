// ApiClient: вызовы /v2/token/refresh и /v2/token/client-generate

use super::ApiError;
use crate::config::Config;
use crate::crypto::CstgBox;
use crate::platform::Platform;
use crate::product::ProductDetails;
use crate::protocol::messages::{
    parse_cstg_response, parse_refresh_response, ClientSideIdentityOptions, CstgPlaintext,
    CstgResponse, CstgResult, RefreshResult,
};
use crate::protocol::transport::{
    HttpRequest, HttpResponse, HttpTransport, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON,
};
use crate::protocol::wire::{pack_cstg_request, unpack_cstg_body, unpack_refresh_body};
use crate::storage::models::Identity;
use futures::future::{self, AbortHandle, Abortable, LocalBoxFuture};
use futures::FutureExt;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const REFRESH_PATH: &str = "/v2/token/refresh";
const CLIENT_GENERATE_PATH: &str = "/v2/token/client-generate";

pub struct ApiClient {
    base_url: RefCell<String>,
    product: ProductDetails,
    transport: Rc<dyn HttpTransport>,
    platform: Rc<dyn Platform>,
    active_requests: Rc<RefCell<Vec<(u64, AbortHandle)>>>,
    next_request_id: Cell<u64>,
}

impl ApiClient {
    pub fn new(
        base_url: Option<&str>,
        product: ProductDetails,
        transport: Rc<dyn HttpTransport>,
        platform: Rc<dyn Platform>,
    ) -> Self {
        let base_url = RefCell::new(Self::normalize_base_url(base_url, &product));
        Self {
            base_url,
            product,
            transport,
            platform,
            active_requests: Rc::new(RefCell::new(Vec::new())),
            next_request_id: Cell::new(1),
        }
    }

    fn normalize_base_url(base_url: Option<&str>, product: &ProductDetails) -> String {
        base_url
            .unwrap_or(product.default_base_url)
            .trim_end_matches('/')
            .to_string()
    }

    pub fn base_url(&self) -> String {
        self.base_url.borrow().clone()
    }

    /// Повторный init может сменить baseUrl; запросы в полёте не трогаются
    pub fn set_base_url(&self, base_url: Option<&str>) {
        *self.base_url.borrow_mut() = Self::normalize_base_url(base_url, &self.product);
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}{}?client={}",
            self.base_url.borrow(),
            path,
            urlencoding::encode(&self.product.client_id())
        )
    }

    /// Есть ли запросы в полёте
    pub fn has_active_requests(&self) -> bool {
        !self.active_requests.borrow().is_empty()
    }

    /// Отменить все запросы в полёте; их вызовы завершатся `ApiError::Aborted`
    pub fn abort_active_requests(&self) {
        let requests: Vec<_> = self.active_requests.borrow_mut().drain(..).collect();
        if !requests.is_empty() {
            tracing::debug!("aborting {} active request(s)", requests.len());
        }
        for (_, handle) in requests {
            handle.abort();
        }
    }

    /// Зарегистрировать запрос в списке активных сразу, до первого poll
    fn track<T: 'static>(
        &self,
        request: LocalBoxFuture<'static, Result<T, ApiError>>,
    ) -> LocalBoxFuture<'static, Result<T, ApiError>> {
        let (handle, registration) = AbortHandle::new_pair();
        let id = self.next_request_id.get();
        self.next_request_id.set(id + 1);
        self.active_requests.borrow_mut().push((id, handle));

        let active_requests = self.active_requests.clone();
        async move {
            let result = Abortable::new(request, registration).await;
            active_requests.borrow_mut().retain(|(active, _)| *active != id);
            result.unwrap_or(Err(ApiError::Aborted))
        }
        .boxed_local()
    }

    /// Отправить POST; запрос уходит в транспорт до первого poll
    fn post(
        &self,
        path: &'static str,
        body: String,
        content_type: &'static str,
    ) -> LocalBoxFuture<'static, Result<HttpResponse, ApiError>> {
        let request = HttpRequest {
            url: self.endpoint(path),
            body,
            content_type,
        };
        let in_flight = self
            .transport
            .post(request)
            .map(|result| result.map_err(ApiError::from))
            .boxed_local();
        let tracked = self.track(in_flight);

        async move {
            let response = tracked.await;
            if let Err(e) = &response {
                if !e.is_aborted() {
                    tracing::warn!("POST {} failed: {}", path, e);
                }
            }
            response
        }
        .boxed_local()
    }

    /// Обновить идентичность по refresh token
    pub fn call_refresh_api(
        &self,
        identity: &Identity,
    ) -> LocalBoxFuture<'static, Result<RefreshResult, ApiError>> {
        let response = self.post(REFRESH_PATH, identity.refresh_token.clone(), CONTENT_TYPE_FORM);
        let response_key = identity.refresh_response_key.clone();

        async move {
            let response = response.await?;
            let json = unpack_refresh_body(response.status, &response.body, response_key.as_deref())?;
            parse_refresh_response(&json).map_err(ApiError::Protocol)
        }
        .boxed_local()
    }

    /// Client-side token generation по хешу email / телефона
    pub fn call_cstg_api(
        &self,
        plaintext: CstgPlaintext,
        options: &ClientSideIdentityOptions,
    ) -> LocalBoxFuture<'static, Result<CstgResult, ApiError>> {
        let prepared = self.prepare_cstg(&plaintext, options);
        let (cstg, body) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return future::ready(Err(e)).boxed_local(),
        };
        let response = self.post(CLIENT_GENERATE_PATH, body, CONTENT_TYPE_JSON);

        async move {
            let response = response.await?;
            match response.status {
                200 => {
                    let json = unpack_cstg_body(&cstg, &response.body)?;
                    parse_cstg_response(&json)
                        .and_then(CstgResponse::into_result)
                        .map_err(ApiError::Protocol)
                }
                400 => match parse_cstg_response(response.body.as_bytes()) {
                    Ok(CstgResponse::ClientError { message }) => Err(ApiError::ClientError(message)),
                    _ => Err(ApiError::Protocol(format!(
                        "unexpected response body for HTTP 400: {}",
                        response.body
                    ))),
                },
                403 => match parse_cstg_response(response.body.as_bytes()) {
                    Ok(CstgResponse::InvalidHttpOrigin { message }) => Err(ApiError::Forbidden(message)),
                    _ => Err(ApiError::Protocol(format!(
                        "unexpected response body for HTTP 403: {}",
                        response.body
                    ))),
                },
                other => Err(ApiError::UnexpectedStatus(other)),
            }
        }
        .boxed_local()
    }

    fn prepare_cstg(
        &self,
        plaintext: &CstgPlaintext,
        options: &ClientSideIdentityOptions,
    ) -> Result<(CstgBox, String), ApiError> {
        let prefix_len = Config::global().server_public_key_prefix_length;
        let server_key = options
            .server_public_key
            .get(prefix_len..)
            .ok_or_else(|| ApiError::Protocol("server public key is too short".to_string()))?;

        let cstg = CstgBox::derive(server_key)?;
        let timestamp = self.platform.now_ms();
        let request = pack_cstg_request(&cstg, plaintext, timestamp, &options.subscription_id)?;
        let body = serde_json::to_string(&request)
            .map_err(|e| ApiError::Protocol(format!("failed to encode request: {}", e)))?;
        Ok((cstg, body))
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.borrow())
            .field("product", &self.product.name)
            .field("active_requests", &self.active_requests.borrow().len())
            .finish()
    }
}
