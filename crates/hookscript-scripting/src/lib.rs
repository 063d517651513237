//! # Hookscript Scripting
//!
//! Script executors invoked by the event dispatch engine.
//!
//! ## Supported Languages
//!
//! - **Rhai** - Rust-native scripting, built in under the `rhai` type
//! - Any other language can be plugged in by implementing [`ScriptExecutor`]
//!   and registering it on an [`ExecutorRegistry`]
//!
//! ## Features
//!
//! - Routing by script type identifier
//! - AST caching keyed by script name, invalidated on content change
//! - Operation and size limits for Rhai scripts
//! - Lookup placeholder resolution in script content

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod executor;
pub mod lookup;
pub mod rhai_executor;

pub use error::ScriptError;
pub use executor::{ExecutorRegistry, ScriptExecutor};
pub use lookup::{LookupResolver, MapLookups, NoLookups};
pub use rhai_executor::{CacheStats, RhaiExecutor};

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::error::ScriptError;
    pub use crate::executor::{ExecutorRegistry, ScriptExecutor};
    pub use crate::lookup::{LookupResolver, MapLookups, NoLookups};
    pub use crate::rhai_executor::RhaiExecutor;
}
