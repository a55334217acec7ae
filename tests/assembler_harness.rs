#![allow(unused)]
//! Graph assembler integration harness.
//!
//! # What this covers
//!
//! Matched events → assembled `EventParameters`, against the shared sample
//! catalog:
//!
//! - **Preferred objects**: the preferred origin and preferred magnitude are
//!   in the graph even when neither "all origins" nor "all magnitudes" was
//!   requested.
//! - **Derived origins**: an origin reached both through a moment tensor and
//!   through a direct reference appears exactly once.
//! - **Shared origins**: events sharing a preferred origin each get their own
//!   preferred magnitude attached to the one origin object.
//! - **Sorted expansion**: origin IDs of one event and all pick IDs are
//!   emitted in strictly ascending order.
//! - **Quota**: assembly aborts once the object counter passes the ceiling,
//!   and the count at abort stays within ceiling + one batch (proptest).
//! - **Cancellation**: a cancelled token stops assembly before any fetch; a
//!   token cancelled mid-run stops it at the next object boundary, with no
//!   further origin or pick fetched.
//! - **Redaction**: `hide_author` strips authors from every level.
//!
//! # What this does NOT cover
//!
//! - Serialisation of the graph (sinks crate)
//! - The flat text projection (`project.rs` unit tests, end_to_end_harness)
//!
//! # Running
//!
//! ```sh
//! cargo test --test assembler_harness
//! ```

mod common;
use common::*;
use proptest::prelude::*;
use rstest::rstest;
use seisquery_core::EventType;
use seisquery_core::{
    assemble, Assembly, AssemblySettings, AssemblyState, CatalogStore, Event, GraphAssembler,
    Inclusion, MemoryCatalog, QuotaGuard, SearchError,
};
use tokio_util::sync::CancellationToken;

fn events(catalog: &MemoryCatalog, ids: &[&str]) -> Vec<Event> {
    ids.iter()
        .map(|id| catalog.event(id).unwrap().expect("fixture event exists"))
        .collect()
}

fn run(ids: &[&str], include: Inclusion) -> Assembly {
    let catalog = sample_catalog();
    let mut quota = QuotaGuard::unlimited();
    assemble(
        &catalog,
        events(&catalog, ids),
        &include,
        AssemblySettings::default(),
        &mut quota,
    )
    .expect("assembly must succeed")
}

// ---------------------------------------------------------------------------
// Preferred objects
// ---------------------------------------------------------------------------

#[test]
fn preferred_origin_and_magnitude_are_always_present() {
    let assembly = run(&[EV_ALPS, EV_BANDA], Inclusion::default());
    let graph = &assembly.graph;

    assert_event_ids!(graph.events, [EV_ALPS, EV_BANDA]);
    assert_origin_once!(*graph, OR_ALPS);
    assert_origin_once!(*graph, OR_BANDA);
    assert_has_magnitude!(*graph, MAG_ALPS);
    assert_has_magnitude!(*graph, MAG_BANDA);

    // nothing beyond the preferred ones
    assert_eq!(graph.origins.len(), 2);
    let mags: usize = graph.origins.iter().map(|o| o.magnitudes.len()).sum();
    assert_eq!(mags, 2);
    assert!(graph.focal_mechanisms.is_empty());
    assert!(graph.picks.is_empty());
}

#[test]
fn preferred_reference_is_the_only_reference_by_default() {
    let assembly = run(&[EV_ALPS], Inclusion::default());
    assert_eq!(assembly.graph.events[0].origin_references, vec![OR_ALPS.to_string()]);
}

#[test]
fn all_origins_and_magnitudes() {
    let include = Inclusion {
        all_origins: true,
        all_magnitudes: true,
        ..Default::default()
    };
    let graph = run(&[EV_ALPS], include).graph;
    assert_strictly_ascending!(graph.origins.iter().map(|o| o.public_id.as_str()));
    assert_eq!(graph.origins.len(), 2);
    let alps = graph.origin(OR_ALPS).unwrap();
    assert_eq!(alps.magnitudes.len(), 2);
    assert_has_magnitude!(graph, "mag/alps-reloc");
}

// ---------------------------------------------------------------------------
// Focal mechanisms
// ---------------------------------------------------------------------------

#[test]
fn derived_origin_appears_once_when_also_referenced() {
    let include = Inclusion {
        all_origins: true,
        focal_mechanism: true,
        ..Default::default()
    };
    let graph = run(&[EV_BANDA], include).graph;

    assert_eq!(graph.focal_mechanisms.len(), 1);
    assert_eq!(graph.focal_mechanisms[0].moment_tensors.len(), 1);
    assert_origin_once!(graph, OR_BANDA_MT);
    assert_origin_once!(graph, OR_BANDA);
    assert_has_magnitude!(graph, MAG_BANDA_MW);
}

#[test]
fn derived_origin_comes_with_the_focal_mechanism_alone() {
    let include = Inclusion {
        focal_mechanism: true,
        ..Default::default()
    };
    let graph = run(&[EV_BANDA], include).graph;
    assert_origin_once!(graph, OR_BANDA_MT);
    assert_has_magnitude!(graph, MAG_BANDA_MW);
}

#[test]
fn events_sharing_an_origin_keep_their_preferred_magnitudes() {
    let catalog = CatalogBuilder::new()
        .origin(
            OriginBuilder::new("origin/shared", "2024-05-01T00:00:00Z", 10.0, 20.0)
                .magnitude("mag/shared-ml", "ML", 4.0)
                .magnitude("mag/shared-mb", "mb", 4.2)
                .build(),
        )
        .event(
            EventBuilder::new("ev/first")
                .event_type(EventType::Earthquake)
                .preferred_origin("origin/shared")
                .preferred_magnitude("mag/shared-ml")
                .build(),
        )
        .event(
            EventBuilder::new("ev/second")
                .event_type(EventType::Earthquake)
                .preferred_origin("origin/shared")
                .preferred_magnitude("mag/shared-mb")
                .build(),
        )
        .build();

    let mut quota = QuotaGuard::unlimited();
    let graph = assemble(
        &catalog,
        events(&catalog, &["ev/first", "ev/second"]),
        &Inclusion::default(),
        AssemblySettings::default(),
        &mut quota,
    )
    .unwrap()
    .graph;

    assert_origin_once!(graph, "origin/shared");
    for event in &graph.events {
        let mag_id = event.preferred_magnitude_id.as_deref().unwrap();
        assert_has_magnitude!(graph, mag_id);
    }
    assert_eq!(graph.origin("origin/shared").unwrap().magnitudes.len(), 2);
}

// ---------------------------------------------------------------------------
// Picks
// ---------------------------------------------------------------------------

#[test]
fn picks_are_sorted_and_unique() {
    let include = Inclusion {
        arrivals: true,
        ..Default::default()
    };
    let graph = run(&[EV_ALPS], include).graph;
    let alps = graph.origin(OR_ALPS).unwrap();
    assert_eq!(alps.arrivals.len(), 2);
    assert_strictly_ascending!(graph.picks.iter().map(|p| p.public_id.as_str()));
    assert_eq!(graph.picks.len(), 2);
}

#[test]
fn arrivals_without_picks() {
    let include = Inclusion {
        arrivals: true,
        picks: Some(false),
        ..Default::default()
    };
    let graph = run(&[EV_ALPS], include).graph;
    assert_eq!(graph.origin(OR_ALPS).unwrap().arrivals.len(), 2);
    assert!(graph.picks.is_empty());
}

// ---------------------------------------------------------------------------
// Comments and authors
// ---------------------------------------------------------------------------

#[test]
fn comments_only_on_request() {
    let without = run(&[EV_ALPS], Inclusion::default()).graph;
    assert!(without.events[0].comments.is_empty());
    assert!(without.origin(OR_ALPS).unwrap().comments.is_empty());

    let include = Inclusion {
        comments: true,
        ..Default::default()
    };
    let with = run(&[EV_ALPS], include).graph;
    assert_eq!(with.events[0].comments[0].text, "felt in Zurich");
    assert_eq!(with.origin(OR_ALPS).unwrap().comments[0].text, "relocated by analyst");
}

#[test]
fn hide_author_redacts_events_and_origins() {
    let catalog = sample_catalog();
    let mut quota = QuotaGuard::unlimited();
    let settings = AssemblySettings { hide_author: true };
    let graph = assemble(
        &catalog,
        events(&catalog, &[EV_ALPS]),
        &Inclusion::default(),
        settings,
        &mut quota,
    )
    .unwrap()
    .graph;

    let event_ci = graph.events[0].creation_info.as_ref().unwrap();
    assert_eq!(event_ci.agency_id.as_deref(), Some("GFZ"));
    assert!(event_ci.author.is_none());
    let origin_ci = graph.origin(OR_ALPS).unwrap().creation_info.as_ref().unwrap();
    assert!(origin_ci.author.is_none());
}

// ---------------------------------------------------------------------------
// Quota & cancellation
// ---------------------------------------------------------------------------

fn everything() -> Inclusion {
    Inclusion {
        all_origins: true,
        all_magnitudes: true,
        arrivals: true,
        picks: None,
        focal_mechanism: true,
        all_focal_mechanisms: true,
        station_moment_tensors: true,
        comments: true,
    }
}

#[test]
fn unlimited_run_reports_its_cost() {
    let assembly = run(BY_TIME_DESC, everything());
    assert!(assembly.objects > BY_TIME_DESC.len());
}

proptest! {
    #[test]
    fn quota_abort_stays_within_one_batch(ceiling in 1usize..40) {
        let catalog = sample_catalog();
        let include = everything();
        let mut quota = QuotaGuard::new(Some(ceiling), CancellationToken::new());
        let evs = events(&catalog, BY_TIME_DESC);

        let mut assembler =
            GraphAssembler::new(&catalog, &include, AssemblySettings::default(), &mut quota);
        let result = assembler.run(evs);
        let state = assembler.state();
        drop(assembler);

        match result {
            Ok(assembly) => {
                prop_assert_eq!(state, AssemblyState::Done);
                prop_assert!(assembly.objects <= ceiling);
            }
            Err(SearchError::QuotaExceeded { max }) => {
                prop_assert_eq!(state, AssemblyState::Aborted);
                prop_assert_eq!(max, ceiling);
                // the largest single charge in this catalog is the event batch
                prop_assert!(quota.count() <= ceiling + BY_TIME_DESC.len());
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }
}

#[test]
fn cancelled_token_stops_before_any_work() {
    let catalog = sample_catalog();
    let token = CancellationToken::new();
    token.cancel();
    let mut quota = QuotaGuard::new(None, token);
    let include = Inclusion::default();

    let mut assembler =
        GraphAssembler::new(&catalog, &include, AssemblySettings::default(), &mut quota);
    let err = assembler.run(events(&catalog, &[EV_ALPS])).unwrap_err();
    assert!(matches!(err, SearchError::Disconnected));
    assert_eq!(assembler.state(), AssemblyState::Aborted);
}

#[rstest]
#[case::on_an_origin(Fetch::Origin(2))]
#[case::on_a_pick(Fetch::Pick(1))]
fn cancellation_mid_run_stops_at_the_next_boundary(#[case] at: Fetch) {
    let token = CancellationToken::new();
    let store = HookedStore::cancelling(sample_catalog(), token.clone(), at);
    let evs = events(store.catalog(), BY_TIME_DESC);
    let include = everything();
    let mut quota = QuotaGuard::new(None, token);

    let mut assembler =
        GraphAssembler::new(&store, &include, AssemblySettings::default(), &mut quota);
    let err = assembler.run(evs).unwrap_err();

    assert!(matches!(err, SearchError::Disconnected), "{err}");
    assert_eq!(assembler.state(), AssemblyState::Aborted);
    // the cancelling fetch is the last one served
    match at {
        Fetch::Origin(n) => {
            assert_eq!(store.origin_fetches(), n);
            assert_eq!(store.pick_fetches(), 0);
        }
        Fetch::Pick(n) => assert_eq!(store.pick_fetches(), n),
    }
}
