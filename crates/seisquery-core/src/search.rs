//! Event finder: resolves a validated filter to the bare events to return,
//! in result order.

use crate::error::Result;
use crate::filter::FilterSpec;
use crate::query::{compile, Compiled, EventPolicy};
use crate::sql::{self, PlainColumns};
use crate::store::CatalogStore;
use crate::types::Event;

/// Find the events matching `spec`.
///
/// An explicit event-ID list bypasses the compiler: each ID is looked up
/// directly (unknown IDs are skipped) and the operator policy is applied
/// per event. Otherwise the filter is compiled and run by the store.
pub fn find_events(
    store: &dyn CatalogStore,
    spec: &FilterSpec,
    policy: &EventPolicy,
) -> Result<Vec<Event>> {
    if !spec.event_ids.is_empty() {
        return events_by_id(store, &spec.event_ids, policy);
    }

    let query = match compile(spec, policy) {
        Compiled::Empty => return Ok(Vec::new()),
        Compiled::Query(q) => q,
    };
    tracing::debug!(sql = %sql::render(&query, &PlainColumns), "event query");

    let hits = store.query_events(&query)?;
    let mut events = Vec::with_capacity(hits.len());
    for hit in hits {
        match store.event(&hit.public_id)? {
            Some(event) => events.push(event),
            None => tracing::warn!(event = %hit.public_id, "matched event vanished from store"),
        }
    }
    tracing::debug!(count = events.len(), "events found");
    Ok(events)
}

fn events_by_id(
    store: &dyn CatalogStore,
    ids: &[String],
    policy: &EventPolicy,
) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for id in ids {
        let Some(event) = store.event(id)? else {
            continue;
        };
        if !policy.admits(event.event_type) {
            tracing::debug!(event = %id, "event type excluded by policy");
            continue;
        }
        if let Some(mode) = policy.evaluation_mode {
            let origin = match event.preferred_origin_id.as_deref() {
                Some(origin_id) => store.origin(origin_id)?,
                None => None,
            };
            if origin.and_then(|o| o.evaluation_mode) != Some(mode) {
                tracing::debug!(event = %id, "evaluation mode excluded by policy");
                continue;
            }
        }
        events.push(event);
    }
    Ok(events)
}
