pub use core::time::Duration;

// `std::time::SystemTime::now()` panics on `wasm32-unknown-unknown`.
// `web-time` provides a browser-backed clock via `Date.now()`.
#[cfg(target_arch = "wasm32")]
pub use web_time::{SystemTime, UNIX_EPOCH};

#[cfg(not(target_arch = "wasm32"))]
pub use std::time::{SystemTime, UNIX_EPOCH};
