//! Tabular projection: one summary row per matched event.
//!
//! Unlike the structured graph, rows are valid one at a time, so a projection
//! that is cut short by the quota or a disconnect still yields everything
//! produced up to that point.

use crate::error::Result;
use crate::quota::QuotaGuard;
use crate::store::CatalogStore;
use crate::types::{DescriptionKind, Event, PublicId};
use chrono::{DateTime, Utc};

/// Summary of one event. Unavailable values are `None` and render as empty
/// fields.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub event_id: PublicId,
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub depth: Option<f64>,
    pub author: Option<String>,
    /// Catalog filtering is not supported, so this stays empty.
    pub catalog: Option<String>,
    pub contributor: Option<String>,
    pub contributor_id: PublicId,
    pub magnitude_type: Option<String>,
    pub magnitude: Option<f64>,
    pub magnitude_author: Option<String>,
    pub location_name: Option<String>,
    pub event_type: Option<String>,
}

/// Build the row for `event`. Events whose preferred origin cannot be
/// loaded are skipped with a warning.
pub fn project_event(
    store: &dyn CatalogStore,
    event: &Event,
    hide_author: bool,
) -> Result<Option<EventRow>> {
    let origin = match event.preferred_origin_id.as_deref() {
        Some(id) => store.origin(id)?,
        None => None,
    };
    let Some(origin) = origin else {
        tracing::warn!(
            event = %event.public_id,
            origin = ?event.preferred_origin_id,
            "preferred origin of event not found"
        );
        return Ok(None);
    };

    let author_of = |ci: Option<&crate::types::CreationInfo>| {
        if hide_author {
            None
        } else {
            ci.and_then(|ci| ci.author.clone())
        }
    };

    let magnitude = match event.preferred_magnitude_id.as_deref() {
        Some(id) => store.magnitude(id)?,
        None => None,
    };

    let location_name = store
        .descriptions(&event.public_id)?
        .into_iter()
        .find(|d| d.kind == DescriptionKind::RegionName)
        .map(|d| d.text);

    Ok(Some(EventRow {
        event_id: event.public_id.clone(),
        time: origin.time,
        latitude: origin.latitude,
        longitude: origin.longitude,
        depth: origin.depth,
        author: author_of(origin.creation_info.as_ref()),
        catalog: None,
        contributor: event.agency_id().map(str::to_string),
        contributor_id: event.public_id.clone(),
        magnitude_type: magnitude.as_ref().map(|m| m.magnitude_type.clone()),
        magnitude: magnitude.as_ref().map(|m| m.value),
        magnitude_author: magnitude
            .as_ref()
            .and_then(|m| author_of(m.creation_info.as_ref())),
        location_name,
        event_type: event.event_type.map(|t| t.external_name().to_string()),
    }))
}

/// Lazily projects events into rows, charging one object per row.
///
/// After the first error the iterator is exhausted.
pub struct Projection<'a> {
    store: &'a dyn CatalogStore,
    events: std::vec::IntoIter<Event>,
    hide_author: bool,
    quota: &'a mut QuotaGuard,
    failed: bool,
}

impl<'a> Projection<'a> {
    pub fn new(
        store: &'a dyn CatalogStore,
        events: Vec<Event>,
        hide_author: bool,
        quota: &'a mut QuotaGuard,
    ) -> Self {
        Self {
            store,
            events: events.into_iter(),
            hide_author,
            quota,
            failed: false,
        }
    }

    fn step(&mut self, event: &Event) -> Result<Option<EventRow>> {
        self.quota.checkpoint()?;
        let row = project_event(self.store, event, self.hide_author)?;
        if row.is_some() {
            self.quota.charge(1)?;
        }
        Ok(row)
    }
}

impl Iterator for Projection<'_> {
    type Item = Result<EventRow>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some(event) = self.events.next() {
            match self.step(&event) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
