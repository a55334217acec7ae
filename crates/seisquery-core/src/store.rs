//! Catalog store interface and the in-memory adapter.
//!
//! The store hands out entities "bare": child collections (comments,
//! magnitudes, arrivals, moment tensors, ...) are always empty and must be
//! fetched through the dedicated child accessors. This keeps the assembler
//! in charge of what gets materialized and counted.
//!
//! Child sequences that the assembler may abandon early (origin and focal
//! mechanism references, magnitudes) are returned as lazy iterators.

use crate::error::StoreError;
use crate::query::{finish_hits, EventHit, EventQuery, MagnitudeSource, Row};
use crate::types::{
    Arrival, Comment, DataUsed, Event, EventDescription, FocalMechanism, Magnitude,
    MomentTensor, Origin, PhaseSetting, Pick, PublicId, StationContribution,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Lazy child sequence; callers may stop pulling at any time.
pub type Lazy<'a, T> = Box<dyn Iterator<Item = T> + 'a>;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Read-only access to a seismic catalog.
///
/// Implementations must be shareable across concurrent requests; no method
/// mutates the store.
pub trait CatalogStore: Send + Sync {
    /// Execute a compiled search and return matching events in final order,
    /// already paginated.
    fn query_events(&self, query: &EventQuery) -> StoreResult<Vec<EventHit>>;

    fn event(&self, id: &str) -> StoreResult<Option<Event>>;
    fn origin(&self, id: &str) -> StoreResult<Option<Origin>>;
    fn magnitude(&self, id: &str) -> StoreResult<Option<Magnitude>>;
    fn focal_mechanism(&self, id: &str) -> StoreResult<Option<FocalMechanism>>;
    fn pick(&self, id: &str) -> StoreResult<Option<Pick>>;

    /// Origin owning the given magnitude.
    fn magnitude_parent(&self, magnitude_id: &str) -> StoreResult<Option<PublicId>>;

    fn origin_references(&self, event_id: &str) -> StoreResult<Lazy<'_, PublicId>>;
    fn focal_mechanism_references(&self, event_id: &str) -> StoreResult<Lazy<'_, PublicId>>;
    fn magnitudes(&self, origin_id: &str) -> StoreResult<Lazy<'_, Magnitude>>;

    fn arrivals(&self, origin_id: &str) -> StoreResult<Vec<Arrival>>;
    fn moment_tensors(&self, focal_mechanism_id: &str) -> StoreResult<Vec<MomentTensor>>;
    /// Comments of any commentable entity.
    fn comments(&self, parent_id: &str) -> StoreResult<Vec<Comment>>;
    fn descriptions(&self, event_id: &str) -> StoreResult<Vec<EventDescription>>;
    fn data_used(&self, moment_tensor_id: &str) -> StoreResult<Vec<DataUsed>>;
    fn phase_settings(&self, moment_tensor_id: &str) -> StoreResult<Vec<PhaseSetting>>;
    fn station_contributions(
        &self,
        moment_tensor_id: &str,
    ) -> StoreResult<Vec<StationContribution>>;
}

// ---------------------------------------------------------------------------
// Catalog dump
// ---------------------------------------------------------------------------

/// On-disk JSON layout: entities with their children nested, the same
/// shape the structured sink writes.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CatalogDump {
    pub events: Vec<Event>,
    pub origins: Vec<Origin>,
    pub focal_mechanisms: Vec<FocalMechanism>,
    pub picks: Vec<Pick>,
}

// ---------------------------------------------------------------------------
// MemoryCatalog
// ---------------------------------------------------------------------------

/// Catalog held entirely in memory, normalised into one table per entity
/// and one per child relation.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    events: BTreeMap<PublicId, Event>,
    origins: BTreeMap<PublicId, Origin>,
    focal_mechanisms: BTreeMap<PublicId, FocalMechanism>,
    picks: BTreeMap<PublicId, Pick>,
    /// magnitude ID → (parent origin ID, bare magnitude)
    magnitudes: HashMap<PublicId, (PublicId, Magnitude)>,

    origin_magnitudes: HashMap<PublicId, Vec<PublicId>>,
    origin_arrivals: HashMap<PublicId, Vec<Arrival>>,
    origin_references: HashMap<PublicId, Vec<PublicId>>,
    focal_mechanism_references: HashMap<PublicId, Vec<PublicId>>,
    moment_tensors: HashMap<PublicId, Vec<MomentTensor>>,
    data_used: HashMap<PublicId, Vec<DataUsed>>,
    phase_settings: HashMap<PublicId, Vec<PhaseSetting>>,
    station_contributions: HashMap<PublicId, Vec<StationContribution>>,
    descriptions: HashMap<PublicId, Vec<EventDescription>>,
    comments: HashMap<PublicId, Vec<Comment>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dump(dump: CatalogDump) -> StoreResult<Self> {
        let mut catalog = Self::new();
        for origin in dump.origins {
            catalog.insert_origin(origin)?;
        }
        for fm in dump.focal_mechanisms {
            catalog.insert_focal_mechanism(fm)?;
        }
        for pick in dump.picks {
            catalog.insert_pick(pick)?;
        }
        for event in dump.events {
            catalog.insert_event(event)?;
        }
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        Self::from_dump(serde_json::from_str(json)?)
    }

    /// Load a JSON catalog dump from disk.
    pub fn from_path(path: &Path) -> StoreResult<Self> {
        let file = std::fs::File::open(path)?;
        let dump: CatalogDump = serde_json::from_reader(std::io::BufReader::new(file))?;
        let catalog = Self::from_dump(dump)?;
        tracing::info!(
            path = %path.display(),
            events = catalog.events.len(),
            origins = catalog.origins.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn insert_event(&mut self, mut event: Event) -> StoreResult<()> {
        let id = event.public_id.clone();
        if self.events.contains_key(&id) {
            return Err(StoreError::Corrupt(format!("duplicate event '{id}'")));
        }
        self.descriptions.insert(id.clone(), std::mem::take(&mut event.descriptions));
        self.comments.insert(id.clone(), std::mem::take(&mut event.comments));

        let mut origin_refs = std::mem::take(&mut event.origin_references);
        if let Some(preferred) = &event.preferred_origin_id {
            if !origin_refs.contains(preferred) {
                origin_refs.push(preferred.clone());
            }
        }
        self.origin_references.insert(id.clone(), origin_refs);

        let mut fm_refs = std::mem::take(&mut event.focal_mechanism_references);
        if let Some(preferred) = &event.preferred_focal_mechanism_id {
            if !fm_refs.contains(preferred) {
                fm_refs.push(preferred.clone());
            }
        }
        self.focal_mechanism_references.insert(id.clone(), fm_refs);

        self.events.insert(id, event);
        Ok(())
    }

    pub fn insert_origin(&mut self, mut origin: Origin) -> StoreResult<()> {
        let id = origin.public_id.clone();
        if self.origins.contains_key(&id) {
            return Err(StoreError::Corrupt(format!("duplicate origin '{id}'")));
        }
        self.comments.insert(id.clone(), std::mem::take(&mut origin.comments));
        self.origin_arrivals.insert(id.clone(), std::mem::take(&mut origin.arrivals));

        let mut mag_ids = Vec::with_capacity(origin.magnitudes.len());
        for mut mag in std::mem::take(&mut origin.magnitudes) {
            if self.magnitudes.contains_key(&mag.public_id) {
                return Err(StoreError::Corrupt(format!(
                    "duplicate magnitude '{}'",
                    mag.public_id
                )));
            }
            self.comments.insert(mag.public_id.clone(), std::mem::take(&mut mag.comments));
            mag_ids.push(mag.public_id.clone());
            self.magnitudes.insert(mag.public_id.clone(), (id.clone(), mag));
        }
        self.origin_magnitudes.insert(id.clone(), mag_ids);

        self.origins.insert(id, origin);
        Ok(())
    }

    pub fn insert_focal_mechanism(&mut self, mut fm: FocalMechanism) -> StoreResult<()> {
        let id = fm.public_id.clone();
        if self.focal_mechanisms.contains_key(&id) {
            return Err(StoreError::Corrupt(format!("duplicate focal mechanism '{id}'")));
        }
        self.comments.insert(id.clone(), std::mem::take(&mut fm.comments));

        let mut tensors = Vec::with_capacity(fm.moment_tensors.len());
        for mut mt in std::mem::take(&mut fm.moment_tensors) {
            let mt_id = mt.public_id.clone();
            self.comments.insert(mt_id.clone(), std::mem::take(&mut mt.comments));
            self.data_used.insert(mt_id.clone(), std::mem::take(&mut mt.data_used));
            self.phase_settings
                .insert(mt_id.clone(), std::mem::take(&mut mt.phase_settings));
            self.station_contributions
                .insert(mt_id, std::mem::take(&mut mt.station_contributions));
            tensors.push(mt);
        }
        self.moment_tensors.insert(id.clone(), tensors);

        self.focal_mechanisms.insert(id, fm);
        Ok(())
    }

    pub fn insert_pick(&mut self, mut pick: Pick) -> StoreResult<()> {
        let id = pick.public_id.clone();
        if self.picks.contains_key(&id) {
            return Err(StoreError::Corrupt(format!("duplicate pick '{id}'")));
        }
        self.comments.insert(id.clone(), std::mem::take(&mut pick.comments));
        self.picks.insert(id, pick);
        Ok(())
    }

    fn magnitudes_of(&self, origin_id: &str) -> impl Iterator<Item = &Magnitude> + '_ {
        self.origin_magnitudes
            .get(origin_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.magnitudes.get(id).map(|(_, m)| m))
    }

    /// Candidate magnitudes of one event for a union branch. `[None]` for
    /// branches that do not join a magnitude.
    fn branch_magnitudes<'a>(
        &'a self,
        event: &'a Event,
        origin: &'a Origin,
        source: MagnitudeSource,
    ) -> Vec<Option<&'a Magnitude>> {
        match source {
            MagnitudeSource::None => vec![None],
            MagnitudeSource::Preferred => event
                .preferred_magnitude_id
                .as_deref()
                .and_then(|id| self.magnitudes.get(id))
                .map(|(_, m)| vec![Some(m)])
                .unwrap_or_default(),
            MagnitudeSource::PreferredOrigin => {
                self.magnitudes_of(&origin.public_id).map(Some).collect()
            }
            MagnitudeSource::DerivedOrigins => event
                .preferred_focal_mechanism_id
                .as_deref()
                .and_then(|fm| self.moment_tensors.get(fm))
                .into_iter()
                .flatten()
                .flat_map(|mt| self.magnitudes_of(&mt.derived_origin_id))
                .map(Some)
                .collect(),
        }
    }
}

impl CatalogStore for MemoryCatalog {
    fn query_events(&self, query: &EventQuery) -> StoreResult<Vec<EventHit>> {
        let mut hits = Vec::new();
        for event in self.events.values() {
            // inner join on the preferred origin
            let Some(origin) = event
                .preferred_origin_id
                .as_deref()
                .and_then(|id| self.origins.get(id))
            else {
                continue;
            };

            for source in &query.branches {
                for magnitude in self.branch_magnitudes(event, origin, *source) {
                    let row = Row { event, origin, magnitude };
                    if !query.filter.eval(&row) {
                        continue;
                    }
                    let distance = match &query.distance {
                        Some(circle) => {
                            let d = circle.distance_to(origin.latitude, origin.longitude);
                            if !circle.contains_distance(d) {
                                continue;
                            }
                            Some(d)
                        }
                        None => None,
                    };
                    hits.push(EventHit {
                        public_id: event.public_id.clone(),
                        sort_value: row.sort_value(query.order.key),
                        distance,
                    });
                }
            }
        }
        tracing::debug!(rows = hits.len(), union = query.is_union(), "evaluated event query");
        Ok(finish_hits(hits, query.order, query.page))
    }

    fn event(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.events.get(id).cloned())
    }

    fn origin(&self, id: &str) -> StoreResult<Option<Origin>> {
        Ok(self.origins.get(id).cloned())
    }

    fn magnitude(&self, id: &str) -> StoreResult<Option<Magnitude>> {
        Ok(self.magnitudes.get(id).map(|(_, m)| m.clone()))
    }

    fn focal_mechanism(&self, id: &str) -> StoreResult<Option<FocalMechanism>> {
        Ok(self.focal_mechanisms.get(id).cloned())
    }

    fn pick(&self, id: &str) -> StoreResult<Option<Pick>> {
        Ok(self.picks.get(id).cloned())
    }

    fn magnitude_parent(&self, magnitude_id: &str) -> StoreResult<Option<PublicId>> {
        Ok(self.magnitudes.get(magnitude_id).map(|(parent, _)| parent.clone()))
    }

    fn origin_references(&self, event_id: &str) -> StoreResult<Lazy<'_, PublicId>> {
        Ok(Box::new(
            self.origin_references.get(event_id).into_iter().flatten().cloned(),
        ))
    }

    fn focal_mechanism_references(&self, event_id: &str) -> StoreResult<Lazy<'_, PublicId>> {
        Ok(Box::new(
            self.focal_mechanism_references
                .get(event_id)
                .into_iter()
                .flatten()
                .cloned(),
        ))
    }

    fn magnitudes(&self, origin_id: &str) -> StoreResult<Lazy<'_, Magnitude>> {
        Ok(Box::new(self.magnitudes_of(origin_id).cloned()))
    }

    fn arrivals(&self, origin_id: &str) -> StoreResult<Vec<Arrival>> {
        Ok(self.origin_arrivals.get(origin_id).cloned().unwrap_or_default())
    }

    fn moment_tensors(&self, focal_mechanism_id: &str) -> StoreResult<Vec<MomentTensor>> {
        Ok(self
            .moment_tensors
            .get(focal_mechanism_id)
            .cloned()
            .unwrap_or_default())
    }

    fn comments(&self, parent_id: &str) -> StoreResult<Vec<Comment>> {
        Ok(self.comments.get(parent_id).cloned().unwrap_or_default())
    }

    fn descriptions(&self, event_id: &str) -> StoreResult<Vec<EventDescription>> {
        Ok(self.descriptions.get(event_id).cloned().unwrap_or_default())
    }

    fn data_used(&self, moment_tensor_id: &str) -> StoreResult<Vec<DataUsed>> {
        Ok(self.data_used.get(moment_tensor_id).cloned().unwrap_or_default())
    }

    fn phase_settings(&self, moment_tensor_id: &str) -> StoreResult<Vec<PhaseSetting>> {
        Ok(self
            .phase_settings
            .get(moment_tensor_id)
            .cloned()
            .unwrap_or_default())
    }

    fn station_contributions(
        &self,
        moment_tensor_id: &str,
    ) -> StoreResult<Vec<StationContribution>> {
        Ok(self
            .station_contributions
            .get(moment_tensor_id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
