//! Domain-specific assertion macros for seisquery harnesses.
//!
//! These wrap `pretty_assertions` and add failure messages that name the
//! graph or result list that broke, so a failing harness points straight at
//! the pipeline stage.

// ---------------------------------------------------------------------------
// Result lists
// ---------------------------------------------------------------------------

/// Assert the public IDs of a list of events, in order.
///
/// ```rust
/// assert_event_ids!(events, [EV_BLAST, EV_BANDA]);
/// ```
#[macro_export]
macro_rules! assert_event_ids {
    ($events:expr, [$($id:expr),* $(,)?]) => {{
        let events = &$events;
        let actual: Vec<&str> = events.iter().map(|e| e.public_id.as_str()).collect();
        let expected: Vec<&str> = vec![$($id),*];
        pretty_assertions::assert_eq!(actual, expected, "event IDs differ");
    }};
    ($events:expr, $expected:expr) => {{
        let events = &$events;
        let actual: Vec<&str> = events.iter().map(|e| e.public_id.as_str()).collect();
        let expected: Vec<&str> = $expected.iter().copied().collect();
        pretty_assertions::assert_eq!(actual, expected, "event IDs differ");
    }};
}

/// Assert that a sequence of IDs is strictly ascending.
#[macro_export]
macro_rules! assert_strictly_ascending {
    ($ids:expr) => {{
        let ids: Vec<&str> = $ids.into_iter().collect();
        for pair in ids.windows(2) {
            assert!(
                pair[0] < pair[1],
                "assert_strictly_ascending! failed: {:?} is not before {:?}\n  full list: {:?}",
                pair[0],
                pair[1],
                ids
            );
        }
    }};
}

// ---------------------------------------------------------------------------
// Assembled graphs
// ---------------------------------------------------------------------------

/// Assert that `graph.origins` holds `id` exactly once.
#[macro_export]
macro_rules! assert_origin_once {
    ($graph:expr, $id:expr) => {{
        let graph: &seisquery_core::EventParameters = &$graph;
        let id: &str = $id;
        let n = graph.origins.iter().filter(|o| o.public_id == id).count();
        assert_eq!(
            n,
            1,
            "assert_origin_once! failed: origin {:?} appears {} times.\n  origins: {:?}",
            id,
            n,
            graph.origins.iter().map(|o| &o.public_id).collect::<Vec<_>>()
        );
    }};
}

/// Assert that the graph carries magnitude `id` on any origin.
#[macro_export]
macro_rules! assert_has_magnitude {
    ($graph:expr, $id:expr) => {{
        let graph: &seisquery_core::EventParameters = &$graph;
        let id: &str = $id;
        let found = graph
            .origins
            .iter()
            .flat_map(|o| o.magnitudes.iter())
            .any(|m| m.public_id == id);
        assert!(
            found,
            "assert_has_magnitude! failed: magnitude {:?} not in graph.\n  magnitudes: {:?}",
            id,
            graph
                .origins
                .iter()
                .flat_map(|o| o.magnitudes.iter().map(|m| &m.public_id))
                .collect::<Vec<_>>()
        );
    }};
}
