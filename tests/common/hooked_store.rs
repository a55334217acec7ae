//! HookedStore — a [`CatalogStore`] that runs a callback on every origin and
//! pick fetch.
//!
//! Wraps a [`MemoryCatalog`] and counts the fetches it serves. The hook sees
//! each fetch before it is served, which lets a harness cancel a request in
//! the middle of assembly ([`HookedStore::cancelling`]) or hold a request at
//! a chosen row until the test lets it continue.
//!
//! ```rust
//! let store = HookedStore::cancelling(sample_catalog(), token.clone(), Fetch::Origin(2));
//! ```

use seisquery_core::query::{EventHit, EventQuery};
use seisquery_core::store::{Lazy, StoreResult};
use seisquery_core::types::{
    Arrival, Comment, DataUsed, Event, EventDescription, FocalMechanism, Magnitude,
    MomentTensor, Origin, PhaseSetting, Pick, PublicId, StationContribution,
};
use seisquery_core::{CatalogStore, MemoryCatalog};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// One fetch, numbered from 1 per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    Origin(usize),
    Pick(usize),
}

type Hook = Box<dyn Fn(Fetch, &str) + Send + Sync>;

pub struct HookedStore {
    inner: MemoryCatalog,
    hook: Hook,
    origins: AtomicUsize,
    picks: AtomicUsize,
}

impl HookedStore {
    pub fn new(inner: MemoryCatalog, hook: impl Fn(Fetch, &str) + Send + Sync + 'static) -> Self {
        Self {
            inner,
            hook: Box::new(hook),
            origins: AtomicUsize::new(0),
            picks: AtomicUsize::new(0),
        }
    }

    /// Cancel `token` when `at` is served, as a client hanging up mid-run.
    pub fn cancelling(inner: MemoryCatalog, token: CancellationToken, at: Fetch) -> Self {
        Self::new(inner, move |fetch, _| {
            if fetch == at {
                token.cancel();
            }
        })
    }

    /// The wrapped catalog, for looking up the events to assemble.
    pub fn catalog(&self) -> &MemoryCatalog {
        &self.inner
    }

    pub fn origin_fetches(&self) -> usize {
        self.origins.load(Ordering::SeqCst)
    }

    pub fn pick_fetches(&self) -> usize {
        self.picks.load(Ordering::SeqCst)
    }
}

impl CatalogStore for HookedStore {
    fn query_events(&self, query: &EventQuery) -> StoreResult<Vec<EventHit>> {
        self.inner.query_events(query)
    }

    fn event(&self, id: &str) -> StoreResult<Option<Event>> {
        self.inner.event(id)
    }

    fn origin(&self, id: &str) -> StoreResult<Option<Origin>> {
        let n = self.origins.fetch_add(1, Ordering::SeqCst) + 1;
        (self.hook)(Fetch::Origin(n), id);
        self.inner.origin(id)
    }

    fn magnitude(&self, id: &str) -> StoreResult<Option<Magnitude>> {
        self.inner.magnitude(id)
    }

    fn focal_mechanism(&self, id: &str) -> StoreResult<Option<FocalMechanism>> {
        self.inner.focal_mechanism(id)
    }

    fn pick(&self, id: &str) -> StoreResult<Option<Pick>> {
        let n = self.picks.fetch_add(1, Ordering::SeqCst) + 1;
        (self.hook)(Fetch::Pick(n), id);
        self.inner.pick(id)
    }

    fn magnitude_parent(&self, magnitude_id: &str) -> StoreResult<Option<PublicId>> {
        self.inner.magnitude_parent(magnitude_id)
    }

    fn origin_references(&self, event_id: &str) -> StoreResult<Lazy<'_, PublicId>> {
        self.inner.origin_references(event_id)
    }

    fn focal_mechanism_references(&self, event_id: &str) -> StoreResult<Lazy<'_, PublicId>> {
        self.inner.focal_mechanism_references(event_id)
    }

    fn magnitudes(&self, origin_id: &str) -> StoreResult<Lazy<'_, Magnitude>> {
        self.inner.magnitudes(origin_id)
    }

    fn arrivals(&self, origin_id: &str) -> StoreResult<Vec<Arrival>> {
        self.inner.arrivals(origin_id)
    }

    fn moment_tensors(&self, focal_mechanism_id: &str) -> StoreResult<Vec<MomentTensor>> {
        self.inner.moment_tensors(focal_mechanism_id)
    }

    fn comments(&self, parent_id: &str) -> StoreResult<Vec<Comment>> {
        self.inner.comments(parent_id)
    }

    fn descriptions(&self, event_id: &str) -> StoreResult<Vec<EventDescription>> {
        self.inner.descriptions(event_id)
    }

    fn data_used(&self, moment_tensor_id: &str) -> StoreResult<Vec<DataUsed>> {
        self.inner.data_used(moment_tensor_id)
    }

    fn phase_settings(&self, moment_tensor_id: &str) -> StoreResult<Vec<PhaseSetting>> {
        self.inner.phase_settings(moment_tensor_id)
    }

    fn station_contributions(
        &self,
        moment_tensor_id: &str,
    ) -> StoreResult<Vec<StationContribution>> {
        self.inner.station_contributions(moment_tensor_id)
    }
}
