//! # Hookscript Dispatch
//!
//! Matches named platform events to active scripts, runs them, and merges
//! their results back into the event being processed.
//!
//! ## Flow
//!
//! ```text
//! EventBus::fire(event)
//!   -> EventDispatchEngine::handle
//!   -> ScriptRecordStore lookup (exact name, active only)
//!   -> ScriptExecutor | QueueSubmitter (".queued" fallback, service events)
//!   -> ResultMerger
//!   -> continue propagation?
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use hookscript_core::{ApiEvent, Event, EventScript, ServiceRequest};
//! use hookscript_dispatch::Runtime;
//!
//! # async fn run() -> hookscript_core::Result<()> {
//! let runtime = Runtime::builder().build().await?;
//! runtime
//!     .scripts()
//!     .upsert(
//!         EventScript::new("db._table.contact.get.pre_process", "rhai")
//!             .active()
//!             .allow_modification()
//!             .with_content(r#"#{ request: #{ limit: 10 } }"#),
//!     )
//!     .await;
//!
//! let mut event = Event::from(ApiEvent::pre_process(
//!     "db._table.contact.get.pre_process",
//!     ServiceRequest::new("GET", "_table/contact"),
//! ));
//! let proceed = runtime.fire(&mut event).await?;
//! # let _ = proceed;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bus;
pub mod dispatcher;
pub mod merger;
pub mod queue;
pub mod runtime;
pub mod service_config;
pub mod store;

pub use bus::{EventBus, EventListener};
pub use dispatcher::EventDispatchEngine;
pub use merger::ResultMerger;
pub use queue::{
    CollectingFailureSink, FailedJob, FailureSink, JobRunner, QueuePlacement, QueueSubmitter,
    ScriptJob, TokioScriptQueue, SERVICE_EVENT_SCRIPT_JOB,
};
pub use runtime::{Runtime, RuntimeBuilder};
pub use service_config::{CacheConfigStore, ConfigResolver, InMemoryConfigStore, ServiceConfigStore};
pub use store::{ActiveScript, InMemoryScriptStore, ScriptRecordStore, ScriptResolver};

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::bus::{EventBus, EventListener};
    pub use crate::dispatcher::EventDispatchEngine;
    pub use crate::queue::{QueueSubmitter, ScriptJob};
    pub use crate::runtime::Runtime;
    pub use crate::service_config::ConfigResolver;
    pub use crate::store::{InMemoryScriptStore, ScriptRecordStore};
}
