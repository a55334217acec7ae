//! Request pipeline — parameters in, one document out.
//!
//! ```text
//! params ──► FilterSpec ──► find_events ──► assemble ──► JsonSink
//!                                     └──► Projection ──► TextSink
//! ```
//!
//! [`EventService::parse`] does all request-only checks so the transport can
//! reject bad requests before scheduling any work. [`EventService::execute`]
//! is synchronous and meant to run on a blocking thread.

use seisquery_core::config::ServiceConfig;
use seisquery_core::{
    assemble, find_events, AssemblySettings, CatalogStore, EventPolicy, FilterSpec,
    OutputFormat, Projection, QuotaGuard, SearchError,
};
use seisquery_sinks::{Emission, JsonSink, ResultSink, SinkError, TextSink};
use std::io::Write;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Version reported by the version endpoint.
pub const SERVICE_VERSION: &str = "1.2.6";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// How a request ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The whole document was written.
    Complete { events: usize, objects: usize, bytes: u64 },
    /// The row stream was cut short; the rows written so far stand.
    Partial { rows: usize, bytes: u64, reason: String },
    /// Nothing matched. `status` is 204 or 404 as requested.
    NoContent { status: u16 },
}

pub struct EventService {
    store: Option<Arc<dyn CatalogStore>>,
    settings: ServiceConfig,
    policy: EventPolicy,
}

impl EventService {
    /// `store = None` models a catalog that could not be opened; every
    /// search then fails with `StoreUnavailable`.
    pub fn new(
        store: Option<Arc<dyn CatalogStore>>,
        settings: ServiceConfig,
    ) -> anyhow::Result<Self> {
        let policy = settings.policy()?;
        Ok(Self { store, settings, policy })
    }

    pub fn settings(&self) -> &ServiceConfig {
        &self.settings
    }

    /// Parse request parameters and reject what this service does not offer.
    pub fn parse<K, V>(&self, params: &[(K, V)]) -> Result<FilterSpec, SearchError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let spec = FilterSpec::from_params(params).inspect_err(|e| {
            tracing::warn!(error = %e, "rejected request parameters");
        })?;

        if !spec.catalogs.is_empty() {
            return Err(SearchError::unsupported("catalog filter not supported"));
        }
        if spec.include.comments && self.settings.hide_comments {
            return Err(SearchError::unsupported("including of comments not supported"));
        }
        if spec.updated_after.is_some() {
            return Err(SearchError::unsupported(
                "filtering based on update time not supported",
            ));
        }
        if !self.settings.offers(spec.output.format) {
            return Err(SearchError::unsupported(format!(
                "output format '{}' not available",
                spec.output.format.as_str()
            )));
        }
        Ok(spec)
    }

    fn store(&self) -> Result<&dyn CatalogStore, SearchError> {
        self.store
            .as_deref()
            .ok_or_else(|| SearchError::StoreUnavailable("could not connect to database".into()))
    }

    /// Parse and execute in one step.
    pub fn run<K, V, W>(
        &self,
        params: &[(K, V)],
        out: W,
        cancel: CancellationToken,
    ) -> Result<Outcome, ServiceError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        W: Write,
    {
        let spec = self.parse(params)?;
        self.execute(&spec, out, cancel)
    }

    /// Run a parsed request, writing the document to `out`.
    pub fn execute<W: Write>(
        &self,
        spec: &FilterSpec,
        out: W,
        cancel: CancellationToken,
    ) -> Result<Outcome, ServiceError> {
        let store = self.store()?;
        let mut quota = QuotaGuard::new(self.settings.ceiling(), cancel);
        quota.checkpoint()?;

        let events = find_events(store, spec, &self.policy)?;
        if events.is_empty() {
            tracing::debug!("no matching events found");
            return Ok(Outcome::NoContent { status: spec.output.nodata });
        }
        tracing::debug!(count = events.len(), "events found");

        match spec.output.format {
            OutputFormat::Json => {
                let settings = AssemblySettings { hide_author: self.settings.hide_author };
                let assembly = assemble(store, events, &spec.include, settings, &mut quota)?;

                let mut sink = JsonSink::new(out, spec.output.formatted);
                sink.begin_document()?;
                sink.emit(Emission::Graph(&assembly.graph))?;
                let bytes = sink.end_document()?;

                tracing::debug!(
                    "returned {} events and {} origins (total objects/bytes: {}/{})",
                    assembly.graph.events.len(),
                    assembly.graph.origins.len(),
                    assembly.objects,
                    bytes
                );
                Ok(Outcome::Complete {
                    events: assembly.graph.events.len(),
                    objects: assembly.objects,
                    bytes,
                })
            }
            OutputFormat::Text => {
                let mut sink = TextSink::new(out);
                sink.begin_document()?;
                let mut rows =
                    Projection::new(store, events, self.settings.hide_author, &mut quota);
                let mut cut = None;
                for row in rows.by_ref() {
                    match row {
                        Ok(row) => sink.emit(Emission::Row(&row))?,
                        Err(e) if e.is_abort() => {
                            cut = Some(e);
                            break;
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                let bytes = sink.end_document()?;
                let count = sink.rows();

                match cut {
                    Some(reason) => {
                        tracing::warn!(rows = count, bytes, reason = %reason, "text output cut short");
                        Ok(Outcome::Partial {
                            rows: count,
                            bytes,
                            reason: reason.to_string(),
                        })
                    }
                    None => {
                        tracing::debug!("returned {count} events (total bytes: {bytes})");
                        Ok(Outcome::Complete {
                            events: count,
                            objects: quota.count(),
                            bytes,
                        })
                    }
                }
            }
        }
    }
}
