//! Catalog data model.
//!
//! Entities are plain, serde-serialisable structs. The catalog store hands
//! them out "bare" (child collections empty); the graph assembler fills the
//! child collections it was asked for. Cross-entity links are by public ID
//! only, never by embedding.

use crate::event_type::EventType;
use serde::{Deserialize, Serialize};

pub type PublicId = String;

/// Provenance of an entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreationInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<chrono::DateTime<chrono::Utc>>,
}

impl CreationInfo {
    /// Clear author and author URI, keeping agency and timestamps.
    pub fn redact(&mut self) {
        self.author = None;
        self.author_uri = None;
    }
}

/// Anything carrying optional provenance that may be redacted.
pub trait Provenance {
    fn creation_info_mut(&mut self) -> Option<&mut CreationInfo>;

    /// Remove author information. Entities without creation info are left
    /// untouched.
    fn remove_author(&mut self) {
        if let Some(ci) = self.creation_info_mut() {
            ci.redact();
        }
    }
}

macro_rules! impl_provenance {
    ($($ty:ty),* $(,)?) => {
        $(impl Provenance for $ty {
            fn creation_info_mut(&mut self) -> Option<&mut CreationInfo> {
                self.creation_info.as_mut()
            }
        })*
    };
}

impl_provenance!(Event, Origin, Magnitude, FocalMechanism, MomentTensor, Arrival, Pick, Comment);

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DescriptionKind {
    RegionName,
    FeltReport,
    FlinnEngdahlRegion,
    LocalTime,
    TectonicSummary,
    NearestCities,
    EarthquakeName,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDescription {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: DescriptionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub public_id: PublicId,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub event_type: Option<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_origin_id: Option<PublicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_magnitude_id: Option<PublicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_focal_mechanism_id: Option<PublicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub descriptions: Vec<EventDescription>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub origin_references: Vec<PublicId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focal_mechanism_references: Vec<PublicId>,
}

impl Event {
    /// Agency of the event's creation info, if any.
    pub fn agency_id(&self) -> Option<&str> {
        self.creation_info.as_ref()?.agency_id.as_deref()
    }

    /// First region-name description.
    pub fn region_name(&self) -> Option<&str> {
        self.descriptions
            .iter()
            .find(|d| d.kind == DescriptionKind::RegionName)
            .map(|d| d.text.as_str())
    }
}

// ---------------------------------------------------------------------------
// Origin, Magnitude, Arrival, Pick
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    Manual,
    Automatic,
}

impl std::str::FromStr for EvaluationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" => Ok(EvaluationMode::Manual),
            "automatic" => Ok(EvaluationMode::Automatic),
            other => Err(format!("unknown evaluation mode '{other}'")),
        }
    }
}

impl std::fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMode::Manual => write!(f, "manual"),
            EvaluationMode::Automatic => write!(f, "automatic"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    pub public_id: PublicId,
    pub time: chrono::DateTime<chrono::Utc>,
    pub latitude: f64,
    pub longitude: f64,
    /// Depth in km.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation_mode: Option<EvaluationMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub magnitudes: Vec<Magnitude>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arrivals: Vec<Arrival>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Magnitude {
    pub public_id: PublicId,
    #[serde(rename = "type")]
    pub magnitude_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

/// Association of a pick with an origin. The pick itself is referenced, not
/// embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub pick_id: PublicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub public_id: PublicId,
    pub time: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waveform_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
}

// ---------------------------------------------------------------------------
// Focal mechanism & moment tensor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalMechanism {
    pub public_id: PublicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moment_tensors: Vec<MomentTensor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentTensor {
    pub public_id: PublicId,
    pub derived_origin_id: PublicId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moment_magnitude_id: Option<PublicId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<CreationInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_used: Vec<DataUsed>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phase_settings: Vec<PhaseSetting>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub station_contributions: Vec<StationContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataUsed {
    pub wave_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSetting {
    pub code: String,
    pub lower_period: f64,
    pub upper_period: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationContribution {
    pub waveform_id: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

// ---------------------------------------------------------------------------
// Assembled graph
// ---------------------------------------------------------------------------

/// The object graph returned for one request.
///
/// Identity is scoped to this value: `contains` answers whether an object was
/// already materialized while assembling it, so shared sub-objects are added
/// once even when several events reach them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventParameters {
    pub events: Vec<Event>,
    pub origins: Vec<Origin>,
    pub focal_mechanisms: Vec<FocalMechanism>,
    pub picks: Vec<Pick>,
    #[serde(skip)]
    arena: std::collections::HashSet<PublicId>,
    #[serde(skip)]
    origin_index: std::collections::HashMap<PublicId, usize>,
}

impl EventParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, public_id: &str) -> bool {
        self.arena.contains(public_id)
    }

    /// Reserve an identifier in the arena. Returns false if it was already
    /// present.
    pub fn register(&mut self, public_id: &str) -> bool {
        if self.arena.contains(public_id) {
            return false;
        }
        self.arena.insert(public_id.to_string())
    }

    pub fn add_event(&mut self, event: Event) {
        self.register(&event.public_id);
        self.events.push(event);
    }

    pub fn add_origin(&mut self, origin: Origin) {
        self.register(&origin.public_id);
        self.origin_index
            .insert(origin.public_id.clone(), self.origins.len());
        self.origins.push(origin);
    }

    pub fn add_focal_mechanism(&mut self, fm: FocalMechanism) {
        self.register(&fm.public_id);
        self.focal_mechanisms.push(fm);
    }

    pub fn add_pick(&mut self, pick: Pick) {
        self.register(&pick.public_id);
        self.picks.push(pick);
    }

    pub fn origin(&self, public_id: &str) -> Option<&Origin> {
        self.origin_index.get(public_id).and_then(|&i| self.origins.get(i))
    }

    /// Origin added through [`add_origin`](Self::add_origin), for attaching
    /// objects a later event reaches through it.
    pub fn origin_mut(&mut self, public_id: &str) -> Option<&mut Origin> {
        let i = *self.origin_index.get(public_id)?;
        self.origins.get_mut(i)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
