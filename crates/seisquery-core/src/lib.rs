//! seisquery-core — filter compiler, catalog store and graph assembler.
//!
//! # Architecture
//!
//! ```text
//! request params ──► FilterSpec ──► compile ──► CatalogStore::query_events
//!                                                     │
//!                         ┌───────────────────────────┘
//!                         ▼
//!                  GraphAssembler (+ QuotaGuard) ──► EventParameters
//!                  Projection     (+ QuotaGuard) ──► EventRow stream
//! ```
//!
//! Everything here is synchronous; the transport runs a request on a
//! blocking task and cancels it through the [`QuotaGuard`]'s token.

pub mod assembler;
pub mod config;
pub mod error;
pub mod event_type;
pub mod filter;
pub mod geo;
pub mod project;
pub mod query;
pub mod quota;
pub mod search;
pub mod sql;
pub mod store;
pub mod types;

pub use assembler::{assemble, Assembly, AssemblySettings, AssemblyState, GraphAssembler};
pub use error::{Result, SearchError, StoreError};
pub use event_type::EventType;
pub use filter::{FilterSpec, Inclusion, OutputFormat};
pub use project::{EventRow, Projection};
pub use query::{compile, Compiled, EventPolicy, EventQuery};
pub use quota::QuotaGuard;
pub use search::find_events;
pub use store::{CatalogStore, MemoryCatalog};
pub use types::{Event, EventParameters};
