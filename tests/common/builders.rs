//! Test builders — ergonomic constructors for catalog entities and stores.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use seisquery_core::event_type::EventType;
use seisquery_core::store::CatalogDump;
use seisquery_core::types::{
    Arrival, Comment, CreationInfo, DescriptionKind, EvaluationMode, Event, EventDescription,
    FocalMechanism, Magnitude, MomentTensor, Origin, Pick,
};
use seisquery_core::MemoryCatalog;

/// Parse an RFC 3339 timestamp; panics on bad input.
pub fn ts(s: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .unwrap_or_else(|e| panic!("bad timestamp {s:?}: {e}"))
        .with_timezone(&chrono::Utc)
}

fn authored(agency: &str, author: &str) -> CreationInfo {
    CreationInfo {
        agency_id: Some(agency.to_string()),
        author: Some(author.to_string()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// EventBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Event`] fixtures.
///
/// ```rust
/// let event = EventBuilder::new("ev1")
///     .event_type(EventType::Earthquake)
///     .preferred_origin("or1")
///     .preferred_magnitude("mag1")
///     .region("Northern Italy")
///     .build();
/// ```
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    pub fn new(public_id: &str) -> Self {
        Self {
            event: Event {
                public_id: public_id.to_string(),
                ..Default::default()
            },
        }
    }

    pub fn event_type(mut self, event_type: EventType) -> Self {
        self.event.event_type = Some(event_type);
        self
    }

    pub fn preferred_origin(mut self, id: &str) -> Self {
        self.event.preferred_origin_id = Some(id.to_string());
        self
    }

    pub fn preferred_magnitude(mut self, id: &str) -> Self {
        self.event.preferred_magnitude_id = Some(id.to_string());
        self
    }

    pub fn preferred_focal_mechanism(mut self, id: &str) -> Self {
        self.event.preferred_focal_mechanism_id = Some(id.to_string());
        self
    }

    pub fn origin_ref(mut self, id: &str) -> Self {
        self.event.origin_references.push(id.to_string());
        self
    }

    pub fn focal_mechanism_ref(mut self, id: &str) -> Self {
        self.event.focal_mechanism_references.push(id.to_string());
        self
    }

    pub fn created_by(mut self, agency: &str, author: &str) -> Self {
        self.event.creation_info = Some(authored(agency, author));
        self
    }

    pub fn region(mut self, name: &str) -> Self {
        self.event.descriptions.push(EventDescription {
            text: name.to_string(),
            kind: DescriptionKind::RegionName,
        });
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.event.comments.push(Comment {
            id: None,
            text: text.to_string(),
            creation_info: None,
        });
        self
    }

    pub fn build(self) -> Event {
        self.event
    }
}

// ---------------------------------------------------------------------------
// OriginBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Origin`] fixtures. Magnitudes and arrivals are
/// nested, the same way a catalog dump carries them.
pub struct OriginBuilder {
    origin: Origin,
}

impl OriginBuilder {
    pub fn new(public_id: &str, time: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            origin: Origin {
                public_id: public_id.to_string(),
                time: ts(time),
                latitude,
                longitude,
                depth: None,
                evaluation_mode: None,
                creation_info: None,
                comments: Vec::new(),
                magnitudes: Vec::new(),
                arrivals: Vec::new(),
            },
        }
    }

    pub fn depth(mut self, km: f64) -> Self {
        self.origin.depth = Some(km);
        self
    }

    pub fn mode(mut self, mode: EvaluationMode) -> Self {
        self.origin.evaluation_mode = Some(mode);
        self
    }

    pub fn created_by(mut self, agency: &str, author: &str) -> Self {
        self.origin.creation_info = Some(authored(agency, author));
        self
    }

    pub fn magnitude(mut self, public_id: &str, magnitude_type: &str, value: f64) -> Self {
        self.origin.magnitudes.push(Magnitude {
            public_id: public_id.to_string(),
            magnitude_type: magnitude_type.to_string(),
            value,
            creation_info: None,
            comments: Vec::new(),
        });
        self
    }

    pub fn arrival(mut self, pick_id: &str, phase: &str) -> Self {
        self.origin.arrivals.push(Arrival {
            pick_id: pick_id.to_string(),
            phase: Some(phase.to_string()),
            creation_info: None,
        });
        self
    }

    pub fn comment(mut self, text: &str) -> Self {
        self.origin.comments.push(Comment {
            id: None,
            text: text.to_string(),
            creation_info: None,
        });
        self
    }

    pub fn build(self) -> Origin {
        self.origin
    }
}

// ---------------------------------------------------------------------------
// Focal mechanisms, picks
// ---------------------------------------------------------------------------

/// A focal mechanism with one moment tensor pointing at `derived_origin`.
pub fn focal_mechanism(
    public_id: &str,
    derived_origin: &str,
    moment_magnitude: Option<&str>,
) -> FocalMechanism {
    FocalMechanism {
        public_id: public_id.to_string(),
        creation_info: None,
        comments: Vec::new(),
        moment_tensors: vec![MomentTensor {
            public_id: format!("{public_id}/mt"),
            derived_origin_id: derived_origin.to_string(),
            moment_magnitude_id: moment_magnitude.map(str::to_string),
            creation_info: None,
            comments: Vec::new(),
            data_used: Vec::new(),
            phase_settings: Vec::new(),
            station_contributions: Vec::new(),
        }],
    }
}

pub fn pick(public_id: &str, time: &str) -> Pick {
    Pick {
        public_id: public_id.to_string(),
        time: ts(time),
        waveform_id: Some("CH.DAVOX..HHZ".to_string()),
        phase_hint: Some("P".to_string()),
        creation_info: None,
        comments: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// CatalogBuilder
// ---------------------------------------------------------------------------

/// Collects entities and loads them into a [`MemoryCatalog`].
#[derive(Default)]
pub struct CatalogBuilder {
    dump: CatalogDump,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: Event) -> Self {
        self.dump.events.push(event);
        self
    }

    pub fn origin(mut self, origin: Origin) -> Self {
        self.dump.origins.push(origin);
        self
    }

    pub fn focal_mechanism(mut self, fm: FocalMechanism) -> Self {
        self.dump.focal_mechanisms.push(fm);
        self
    }

    pub fn pick(mut self, pick: Pick) -> Self {
        self.dump.picks.push(pick);
        self
    }

    /// An event with a single preferred origin and magnitude, the common
    /// shape in most tests.
    pub fn simple_event(
        self,
        id: &str,
        time: &str,
        lat: f64,
        lon: f64,
        magnitude: f64,
    ) -> Self {
        let origin_id = format!("{id}/origin");
        let mag_id = format!("{id}/mag");
        self.origin(
            OriginBuilder::new(&origin_id, time, lat, lon)
                .depth(10.0)
                .magnitude(&mag_id, "ML", magnitude)
                .build(),
        )
        .event(
            EventBuilder::new(id)
                .event_type(EventType::Earthquake)
                .preferred_origin(&origin_id)
                .preferred_magnitude(&mag_id)
                .build(),
        )
    }

    pub fn build(self) -> MemoryCatalog {
        MemoryCatalog::from_dump(self.dump).expect("test catalog must load")
    }
}
