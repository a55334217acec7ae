//! Sample catalog shared across harnesses.
//!
//! Six events spread over four days, chosen so every end-to-end scenario has
//! a non-trivial answer:
//!
//! | Event | Time (UTC) | Type | Preferred magnitude | Notes |
//! |-------|------------|------|---------------------|-------|
//! | `EV_ALPS` | 03-01 10:00 | earthquake | ML 3.1 | second origin, picks, comment |
//! | `EV_RUHR` | 03-02 12:00 | induced earthquake | ML 2.4 | |
//! | `EV_BANDA` | 03-03 08:30 | earthquake | mb 6.1 | focal mechanism, Mw 6.3 on derived origin |
//! | `EV_BLAST` | 03-04 09:15 | explosion | ML 5.2 | |
//! | `EV_QUIET` | 03-05 00:00 | earthquake | none | no magnitude at all |
//! | `EV_ORPHAN` | — | none | none | no preferred origin, never matches |

use super::builders::*;
use seisquery::EventService;
use seisquery_core::config::ServiceConfig;
use seisquery_core::event_type::EventType;
use seisquery_core::{CatalogStore, MemoryCatalog};
use std::sync::Arc;

pub const EV_ALPS: &str = "gfz2024alps";
pub const EV_RUHR: &str = "gfz2024ruhr";
pub const EV_BANDA: &str = "gfz2024banda";
pub const EV_BLAST: &str = "gfz2024blast";
pub const EV_QUIET: &str = "gfz2024quiet";
pub const EV_ORPHAN: &str = "gfz2024orphan";

pub const OR_ALPS: &str = "origin/alps";
pub const OR_ALPS_RELOC: &str = "origin/alps-reloc";
pub const OR_BANDA: &str = "origin/banda";
pub const OR_BANDA_MT: &str = "origin/banda-mt";
pub const MAG_ALPS: &str = "mag/alps-ml";
pub const MAG_BANDA: &str = "mag/banda-mb";
pub const MAG_BANDA_MW: &str = "mag/banda-mw";
pub const FM_BANDA: &str = "fm/banda";

/// Events newest first, the default result order.
pub const BY_TIME_DESC: &[&str] = &[EV_QUIET, EV_BLAST, EV_BANDA, EV_RUHR, EV_ALPS];

/// Number of events that can match a filter (everything but the orphan).
pub const MATCHABLE: usize = 5;

pub fn sample_catalog() -> MemoryCatalog {
    CatalogBuilder::new()
        // Alps: two origins, two magnitudes on the preferred one, picks.
        .origin(
            OriginBuilder::new(OR_ALPS, "2024-03-01T10:00:00Z", 46.0, 8.0)
                .depth(8.0)
                .created_by("GFZ", "scautoloc@gfz")
                .magnitude(MAG_ALPS, "ML", 3.1)
                .magnitude("mag/alps-mw", "Mw", 3.3)
                .arrival("pick/alps-2", "S")
                .arrival("pick/alps-1", "P")
                .comment("relocated by analyst")
                .build(),
        )
        .origin(
            OriginBuilder::new(OR_ALPS_RELOC, "2024-03-01T10:00:01Z", 46.01, 8.02)
                .depth(9.0)
                .magnitude("mag/alps-reloc", "ML", 3.0)
                .build(),
        )
        .pick(pick("pick/alps-1", "2024-03-01T10:00:05Z"))
        .pick(pick("pick/alps-2", "2024-03-01T10:00:09Z"))
        .event(
            EventBuilder::new(EV_ALPS)
                .event_type(EventType::Earthquake)
                .preferred_origin(OR_ALPS)
                .preferred_magnitude(MAG_ALPS)
                .origin_ref(OR_ALPS_RELOC)
                .origin_ref(OR_ALPS)
                .created_by("GFZ", "scevent@gfz")
                .region("Switzerland")
                .comment("felt in Zurich")
                .build(),
        )
        // Ruhr: induced.
        .origin(
            OriginBuilder::new("origin/ruhr", "2024-03-02T12:00:00Z", 51.0, 7.0)
                .depth(1.0)
                .magnitude("mag/ruhr", "ML", 2.4)
                .build(),
        )
        .event(
            EventBuilder::new(EV_RUHR)
                .event_type(EventType::InducedEarthquake)
                .preferred_origin("origin/ruhr")
                .preferred_magnitude("mag/ruhr")
                .region("Ruhr area, Germany")
                .build(),
        )
        // Banda: deep, with a moment tensor solution.
        .origin(
            OriginBuilder::new(OR_BANDA, "2024-03-03T08:30:00Z", -6.0, 130.0)
                .depth(120.0)
                .magnitude(MAG_BANDA, "mb", 6.1)
                .build(),
        )
        .origin(
            OriginBuilder::new(OR_BANDA_MT, "2024-03-03T08:30:02Z", -6.1, 130.1)
                .depth(115.0)
                .magnitude(MAG_BANDA_MW, "Mw", 6.3)
                .build(),
        )
        .focal_mechanism(focal_mechanism(FM_BANDA, OR_BANDA_MT, Some(MAG_BANDA_MW)))
        .event(
            EventBuilder::new(EV_BANDA)
                .event_type(EventType::Earthquake)
                .preferred_origin(OR_BANDA)
                .preferred_magnitude(MAG_BANDA)
                .preferred_focal_mechanism(FM_BANDA)
                .origin_ref(OR_BANDA_MT)
                .region("Banda Sea")
                .build(),
        )
        // Blast: close to the Alps event.
        .origin(
            OriginBuilder::new("origin/blast", "2024-03-04T09:15:00Z", 47.5, 8.5)
                .depth(0.0)
                .magnitude("mag/blast", "ML", 5.2)
                .build(),
        )
        .event(
            EventBuilder::new(EV_BLAST)
                .event_type(EventType::Explosion)
                .preferred_origin("origin/blast")
                .preferred_magnitude("mag/blast")
                .created_by("SED", "scevent@sed")
                .build(),
        )
        // Quiet: no magnitude.
        .origin(OriginBuilder::new("origin/quiet", "2024-03-05T00:00:00Z", 35.0, 139.0).build())
        .event(
            EventBuilder::new(EV_QUIET)
                .event_type(EventType::Earthquake)
                .preferred_origin("origin/quiet")
                .build(),
        )
        // Orphan: nothing to join against.
        .event(EventBuilder::new(EV_ORPHAN).build())
        .build()
}

pub fn sample_store() -> Arc<dyn CatalogStore> {
    Arc::new(sample_catalog())
}

pub fn sample_service(settings: ServiceConfig) -> EventService {
    EventService::new(Some(sample_store()), settings).expect("test service must build")
}

/// Request parameters from `key=value` strings.
pub fn params(pairs: &[&str]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|p| {
            let (k, v) = p.split_once('=').expect("params must be key=value");
            (k.to_string(), v.to_string())
        })
        .collect()
}
