//! # Hookscript Core
//!
//! Core types, traits, and error handling for the hookscript event engine.
//!
//! This crate provides the foundational abstractions shared by the other crates:
//! - Event script and service configuration records
//! - The closed set of platform events and their request/response shapes
//! - Response construction from script results
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod event;
pub mod response;
pub mod schema;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use event::{
    ApiEvent, Event, EventEnvelope, EventGroup, EventKind, RequestPhase, ServiceEvent,
    ServiceEventKind, ServiceRequest,
};
pub use response::{EventResponse, ResponseFactory, ServiceResponse};
pub use schema::ConfigSchemaField;
pub use types::*;

// Re-export commonly used HTTP types
pub use http::StatusCode;
pub use serde_json::Value;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::event::{
        ApiEvent, Event, EventEnvelope, EventGroup, EventKind, RequestPhase, ServiceEvent,
        ServiceEventKind, ServiceRequest,
    };
    pub use crate::response::{EventResponse, ResponseFactory, ServiceResponse};
    pub use crate::schema::ConfigSchemaField;
    pub use crate::types::*;
}
