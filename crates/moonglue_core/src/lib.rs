//! moonglue core - the embedded Lua runtime
//!
//! This crate provides the Lua state wrapper, the plugin/module loader, the
//! delayed job scheduler, the async bridge and the value formatter that
//! renders any Lua value as readable text.

pub mod error;
pub mod runtime;
pub mod module;
pub mod async_runtime;
pub mod scheduler;
pub mod pretty;

pub use error::{Error, Result};
pub use runtime::Runtime;
pub use async_runtime::{block_on, run_blocking, sleep_blocking};
pub use pretty::{format, format_bytes, format_lua, FormatOptions};
