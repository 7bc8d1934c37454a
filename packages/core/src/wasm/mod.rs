// JS-интерфейс SDK (только wasm32)

pub mod bindings;
pub mod console;
pub mod signals;
pub mod wasm_api;
