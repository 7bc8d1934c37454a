//! Мост secure signals.
//!
//! Рекламные площадки забирают advertising token через провайдера в своём
//! реестре (`googletag.secureSignalProviders` и подобные). Мост ищет SDK
//! лениво в явном [`SdkRegistry`], поэтому провайдера можно зарегистрировать
//! раньше, чем создан сам SDK.

use crate::product::{ProductDetails, ProductName};
use crate::state::{AdvertisingTokenFuture, Sdk};
use futures::future::{self, LocalBoxFuture};
use futures::FutureExt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Минимальный контракт SDK для адаптеров сигналов
pub trait AdvertisingTokenSource {
    fn get_advertising_token(&self) -> Option<String>;
    fn get_advertising_token_async(&self) -> AdvertisingTokenFuture;
}

impl AdvertisingTokenSource for Sdk {
    fn get_advertising_token(&self) -> Option<String> {
        Sdk::get_advertising_token(self)
    }

    fn get_advertising_token_async(&self) -> AdvertisingTokenFuture {
        Sdk::get_advertising_token_async(self)
    }
}

/// Реестр экземпляров SDK по продукту (вместо `window.__uid2` / `window.__euid`)
#[derive(Default)]
pub struct SdkRegistry {
    entries: RefCell<HashMap<ProductName, Rc<dyn AdvertisingTokenSource>>>,
}

impl SdkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Зарегистрировать источник; возвращает предыдущий
    pub fn register(
        &self,
        product: ProductName,
        source: Rc<dyn AdvertisingTokenSource>,
    ) -> Option<Rc<dyn AdvertisingTokenSource>> {
        self.entries.borrow_mut().insert(product, source)
    }

    pub fn get(&self, product: ProductName) -> Option<Rc<dyn AdvertisingTokenSource>> {
        self.entries.borrow().get(&product).cloned()
    }

    pub fn unregister(&self, product: ProductName) -> Option<Rc<dyn AdvertisingTokenSource>> {
        self.entries.borrow_mut().remove(&product)
    }

    /// Снять регистрацию, только если под продуктом записан именно `source`
    pub fn unregister_if_same(
        &self,
        product: ProductName,
        source: &Rc<dyn AdvertisingTokenSource>,
    ) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.get(&product) {
            Some(current) if Rc::ptr_eq(current, source) => {
                entries.remove(&product);
                true
            }
            _ => false,
        }
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl std::fmt::Debug for SdkRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let products: Vec<ProductName> = self.entries.borrow().keys().copied().collect();
        f.debug_struct("SdkRegistry").field("products", &products).finish()
    }
}

/// Функция, которую площадка вызывает за токеном
pub type TokenCollector = Rc<dyn Fn() -> LocalBoxFuture<'static, Option<String>>>;

/// Запись в реестре провайдеров площадки
#[derive(Clone)]
pub struct SignalProvider {
    pub id: String,
    pub collector: TokenCollector,
}

impl SignalProvider {
    pub fn collect(&self) -> LocalBoxFuture<'static, Option<String>> {
        (self.collector)()
    }
}

impl std::fmt::Debug for SignalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalProvider").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Реестр провайдеров на стороне площадки
pub trait SignalProviderRegistry {
    fn push(&self, provider: SignalProvider);
}

pub struct SignalBridge {
    product: ProductDetails,
    registry: Rc<SdkRegistry>,
    custom_getter: Option<TokenCollector>,
}

impl SignalBridge {
    pub fn new(product: ProductName, registry: Rc<SdkRegistry>) -> Self {
        Self {
            product: ProductDetails::for_product(product),
            registry,
            custom_getter: None,
        }
    }

    /// Собственный способ получить токен вместо SDK из реестра
    pub fn with_token_getter(mut self, getter: TokenCollector) -> Self {
        self.custom_getter = Some(getter);
        self
    }

    pub fn provider_id(&self) -> &'static str {
        self.product.signal_provider_id
    }

    /// Токен для площадки; ошибки и отсутствие SDK дают `None`
    pub fn collect_token(&self) -> LocalBoxFuture<'static, Option<String>> {
        collect(self.product.name, &self.registry, self.custom_getter.as_ref())
    }

    pub fn provider(&self) -> SignalProvider {
        let product = self.product.name;
        let registry = self.registry.clone();
        let custom_getter = self.custom_getter.clone();
        SignalProvider {
            id: self.product.signal_provider_id.to_string(),
            collector: Rc::new(move || collect(product, &registry, custom_getter.as_ref())),
        }
    }

    pub fn register_with(&self, target: &dyn SignalProviderRegistry) {
        tracing::debug!("registering secure signal provider {}", self.provider_id());
        target.push(self.provider());
    }
}

fn collect(
    product: ProductName,
    registry: &SdkRegistry,
    custom_getter: Option<&TokenCollector>,
) -> LocalBoxFuture<'static, Option<String>> {
    if let Some(getter) = custom_getter {
        return getter();
    }

    let Some(source) = registry.get(product) else {
        tracing::warn!("{} SDK is not registered, no token for secure signals", product);
        return future::ready(None).boxed_local();
    };
    if let Some(token) = source.get_advertising_token() {
        return future::ready(Some(token)).boxed_local();
    }

    let pending = source.get_advertising_token_async();
    async move {
        match pending.await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::debug!("no token for secure signals: {}", e);
                None
            }
        }
    }
    .boxed_local()
}

impl std::fmt::Debug for SignalBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBridge")
            .field("product", &self.product.name)
            .field("custom_getter", &self.custom_getter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TokenError;
    use futures::executor::block_on;

    struct FixedSource {
        sync_token: Option<String>,
        async_result: Result<String, TokenError>,
    }

    impl AdvertisingTokenSource for FixedSource {
        fn get_advertising_token(&self) -> Option<String> {
            self.sync_token.clone()
        }

        fn get_advertising_token_async(&self) -> AdvertisingTokenFuture {
            AdvertisingTokenFuture::ready(self.async_result.clone())
        }
    }

    #[derive(Default)]
    struct ProviderList {
        providers: RefCell<Vec<SignalProvider>>,
    }

    impl SignalProviderRegistry for ProviderList {
        fn push(&self, provider: SignalProvider) {
            self.providers.borrow_mut().push(provider);
        }
    }

    #[test]
    fn test_registry_lifecycle() {
        let registry = SdkRegistry::new();
        let source = Rc::new(FixedSource {
            sync_token: Some("a".into()),
            async_result: Ok("a".into()),
        });
        assert!(registry.register(ProductName::Uid2, source.clone()).is_none());
        assert!(registry.register(ProductName::Uid2, source).is_some());
        assert!(registry.get(ProductName::Euid).is_none());
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(ProductName::Uid2).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_instance_does_not_unregister_newer_one() {
        let registry = SdkRegistry::new();
        let first: Rc<dyn AdvertisingTokenSource> = Rc::new(FixedSource {
            sync_token: Some("first".into()),
            async_result: Ok("first".into()),
        });
        let second: Rc<dyn AdvertisingTokenSource> = Rc::new(FixedSource {
            sync_token: Some("second".into()),
            async_result: Ok("second".into()),
        });
        registry.register(ProductName::Uid2, first.clone());
        registry.register(ProductName::Uid2, second.clone());

        assert!(!registry.unregister_if_same(ProductName::Uid2, &first));
        let current = registry.get(ProductName::Uid2).unwrap();
        assert_eq!(current.get_advertising_token().as_deref(), Some("second"));

        assert!(!registry.unregister_if_same(ProductName::Euid, &second));
        assert!(registry.unregister_if_same(ProductName::Uid2, &second));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_provider_resolves_sdk_lazily() {
        let registry = Rc::new(SdkRegistry::new());
        let list = ProviderList::default();
        SignalBridge::new(ProductName::Euid, registry.clone()).register_with(&list);

        let provider = list.providers.borrow()[0].clone();
        assert_eq!(provider.id, "euid.eu");
        assert_eq!(block_on(provider.collect()), None);

        registry.register(
            ProductName::Euid,
            Rc::new(FixedSource {
                sync_token: None,
                async_result: Ok("later".into()),
            }),
        );
        assert_eq!(block_on(provider.collect()), Some("later".to_string()));
    }

    #[test]
    fn test_sync_token_preferred_and_errors_map_to_none() {
        let registry = Rc::new(SdkRegistry::new());
        registry.register(
            ProductName::Uid2,
            Rc::new(FixedSource {
                sync_token: Some("now".into()),
                async_result: Err(TokenError::NotAvailable),
            }),
        );
        let bridge = SignalBridge::new(ProductName::Uid2, registry.clone());
        assert_eq!(bridge.provider_id(), "uidapi.com");
        assert_eq!(block_on(bridge.collect_token()), Some("now".to_string()));

        registry.register(
            ProductName::Uid2,
            Rc::new(FixedSource {
                sync_token: None,
                async_result: Err(TokenError::NotAvailable),
            }),
        );
        assert_eq!(block_on(bridge.collect_token()), None);
    }

    #[test]
    fn test_custom_getter_wins() {
        let registry = Rc::new(SdkRegistry::new());
        let bridge = SignalBridge::new(ProductName::Uid2, registry)
            .with_token_getter(Rc::new(|| future::ready(Some("custom".to_string())).boxed_local()));
        assert_eq!(block_on(bridge.provider().collect()), Some("custom".to_string()));
    }
}
