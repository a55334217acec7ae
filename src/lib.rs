//! seisquery — FDSN-style seismic event query service.
//!
//! The search engine lives in `seisquery-core` and the output formats in
//! `seisquery-sinks`. This crate wires them into a request pipeline and an
//! HTTP transport, exposed as public modules so integration tests can drive
//! them directly.
//!
//! # Architecture
//!
//! ```text
//! HTTP ──► server ──► service ──► find_events ──► assembler / projection
//!                        │                              │
//!                        └────────── sinks ◄────────────┘
//! ```

pub mod server;
pub mod service;

pub use service::{EventService, Outcome, ServiceError, SERVICE_VERSION};
