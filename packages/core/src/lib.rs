// UID2 / EUID Core
// Rust/WASM engine of the browser identity SDK

#![warn(clippy::all)]

// Модули
pub mod api;
pub mod config;
pub mod crypto;
pub mod error;
pub mod platform;
pub mod product;
pub mod protocol;
pub mod signals;
pub mod state;
pub mod storage;
pub mod utils;

// Re-exports для удобства
pub use product::{ProductDetails, ProductName};
pub use state::{IdentityStatus, Sdk, SdkEnvironment, SdkEvent, SdkOptions};
pub use storage::{Identity, OptoutIdentity, PersistedIdentity};
pub use utils::error::{Result, SdkError};

// WASM-specific bindings
#[cfg(target_arch = "wasm32")]
pub mod wasm;
