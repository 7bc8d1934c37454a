// Протокол API: типы сообщений, wire format, валидация DII и HTTP транспорт

pub mod messages;
pub mod transport;
pub mod validation;
pub mod wire;

pub use messages::{
    ClientSideIdentityOptions, CstgPlaintext, CstgRequest, CstgResult, RefreshResult,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};

#[cfg(target_arch = "wasm32")]
pub use transport::XhrTransport;

#[cfg(not(target_arch = "wasm32"))]
pub use transport::UnsupportedTransport;
