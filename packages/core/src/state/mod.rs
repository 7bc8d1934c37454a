// Состояние SDK: статусы, события, отложенные токены и ядро жизненного цикла

pub mod callbacks;
pub mod options;
pub mod promises;
pub mod sdk;
pub mod status;

pub use callbacks::{CallbackManager, EventPayload, SdkEvent, Subscriber};
pub use options::{InitCallback, InitCallbackPayload, SdkOptions};
pub use promises::{AdvertisingTokenFuture, PromiseHandler, TokenError};
pub use sdk::{Sdk, SdkEnvironment};
pub use status::{get_identity_status, IdentityStatus, IdentityValidity};
