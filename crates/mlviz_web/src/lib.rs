//! Browser-hosted lesson site.
//!
//! This crate is a stub by default so the workspace builds on native targets
//! without a wasm toolchain. Enable the real app with `--features web` on a
//! wasm32 target.
//!
//! [`ui_model`] holds the routing and control-state logic the widgets use; it
//! compiles everywhere so it can be unit-tested on the host.

pub mod ui_model;

/// Placeholder for non-web (or non-wasm) builds.
#[cfg(not(all(feature = "web", target_arch = "wasm32")))]
pub fn placeholder() {}

#[cfg(all(feature = "web", target_arch = "wasm32"))]
mod web;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
pub use web::start;
