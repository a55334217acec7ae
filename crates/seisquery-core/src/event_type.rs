//! Event type vocabulary.
//!
//! The catalog knows more event types than the external (QuakeML) vocabulary
//! used by requests and responses. Catalog-only types are mapped to their
//! external equivalent on output, and a request for such an external type
//! must also match the catalog-only types that render as it. That expansion
//! lives in [`EventType::equivalents`] and is applied while normalising the
//! filter, never at query time.
//!
//! Absent event types are modelled as `Option<EventType>::None` throughout the
//! crate; the request token `unknown` selects them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Request token selecting events without a type.
pub const UNKNOWN_TOKEN: &str = "unknown";

/// A set of event types where `None` stands for "no type set".
pub type EventTypeSet = BTreeSet<Option<EventType>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EventType {
    NotExisting,
    NotLocatable,
    OutsideOfNetworkInterest,
    Earthquake,
    InducedEarthquake,
    QuarryBlast,
    Explosion,
    ChemicalExplosion,
    NuclearExplosion,
    Landslide,
    Rockslide,
    SnowAvalanche,
    DebrisAvalanche,
    MineCollapse,
    BuildingCollapse,
    VolcanicEruption,
    MeteorImpact,
    PlaneCrash,
    SonicBoom,
    Duplicate,
    OtherEvent,
    NotReported,
    AnthropogenicEvent,
    Collapse,
    CavityCollapse,
    AccidentalExplosion,
    ControlledExplosion,
    ExperimentalExplosion,
    IndustrialExplosion,
    MiningExplosion,
    RoadCut,
    BlastingLevee,
    InducedOrTriggeredEvent,
    RockBurst,
    ReservoirLoading,
    FluidInjection,
    FluidExtraction,
    Crash,
    TrainCrash,
    BoatCrash,
    AtmosphericEvent,
    SonicBlast,
    AcousticNoise,
    Thunder,
    Avalanche,
    HydroacousticEvent,
    IceQuake,
    Slide,
    Meteorite,
}

// ---------------------------------------------------------------------------
// Name tables
// ---------------------------------------------------------------------------

/// Every catalog type name, keyed by its canonical lowercase spelling.
static CATALOG_NAMES: phf::Map<&'static str, EventType> = phf::phf_map! {
    "not existing" => EventType::NotExisting,
    "not locatable" => EventType::NotLocatable,
    "outside of network interest" => EventType::OutsideOfNetworkInterest,
    "earthquake" => EventType::Earthquake,
    "induced earthquake" => EventType::InducedEarthquake,
    "quarry blast" => EventType::QuarryBlast,
    "explosion" => EventType::Explosion,
    "chemical explosion" => EventType::ChemicalExplosion,
    "nuclear explosion" => EventType::NuclearExplosion,
    "landslide" => EventType::Landslide,
    "rockslide" => EventType::Rockslide,
    "snow avalanche" => EventType::SnowAvalanche,
    "debris avalanche" => EventType::DebrisAvalanche,
    "mine collapse" => EventType::MineCollapse,
    "building collapse" => EventType::BuildingCollapse,
    "volcanic eruption" => EventType::VolcanicEruption,
    "meteor impact" => EventType::MeteorImpact,
    "plane crash" => EventType::PlaneCrash,
    "sonic boom" => EventType::SonicBoom,
    "duplicate" => EventType::Duplicate,
    "other event" => EventType::OtherEvent,
    "not reported" => EventType::NotReported,
    "anthropogenic event" => EventType::AnthropogenicEvent,
    "collapse" => EventType::Collapse,
    "cavity collapse" => EventType::CavityCollapse,
    "accidental explosion" => EventType::AccidentalExplosion,
    "controlled explosion" => EventType::ControlledExplosion,
    "experimental explosion" => EventType::ExperimentalExplosion,
    "industrial explosion" => EventType::IndustrialExplosion,
    "mining explosion" => EventType::MiningExplosion,
    "road cut" => EventType::RoadCut,
    "blasting levee" => EventType::BlastingLevee,
    "induced or triggered event" => EventType::InducedOrTriggeredEvent,
    "rock burst" => EventType::RockBurst,
    "reservoir loading" => EventType::ReservoirLoading,
    "fluid injection" => EventType::FluidInjection,
    "fluid extraction" => EventType::FluidExtraction,
    "crash" => EventType::Crash,
    "train crash" => EventType::TrainCrash,
    "boat crash" => EventType::BoatCrash,
    "atmospheric event" => EventType::AtmosphericEvent,
    "sonic blast" => EventType::SonicBlast,
    "acoustic noise" => EventType::AcousticNoise,
    "thunder" => EventType::Thunder,
    "avalanche" => EventType::Avalanche,
    "hydroacoustic event" => EventType::HydroacousticEvent,
    "ice quake" => EventType::IceQuake,
    "slide" => EventType::Slide,
    "meteorite" => EventType::Meteorite,
};

// ---------------------------------------------------------------------------
// EventType
// ---------------------------------------------------------------------------

impl EventType {
    /// Canonical catalog name, as stored in the catalog.
    pub fn as_str(self) -> &'static str {
        CATALOG_NAMES
            .entries()
            .find_map(|(name, t)| (*t == self).then_some(*name))
            .unwrap_or("other event")
    }

    /// False for the catalog-only types that have no external spelling.
    pub fn is_external(self) -> bool {
        !matches!(
            self,
            EventType::NotLocatable
                | EventType::OutsideOfNetworkInterest
                | EventType::InducedEarthquake
                | EventType::Duplicate
        )
    }

    /// Name used in responses. Catalog-only types render as their external
    /// equivalent.
    pub fn external_name(self) -> &'static str {
        match self {
            EventType::InducedEarthquake => EventType::InducedOrTriggeredEvent.as_str(),
            EventType::NotLocatable | EventType::OutsideOfNetworkInterest | EventType::Duplicate => {
                EventType::OtherEvent.as_str()
            }
            other => other.as_str(),
        }
    }

    /// Catalog-only types that render as `self` and must therefore match a
    /// request for `self`.
    pub fn equivalents(self) -> &'static [EventType] {
        match self {
            EventType::InducedOrTriggeredEvent => &[EventType::InducedEarthquake],
            EventType::OtherEvent => &[
                EventType::Duplicate,
                EventType::NotLocatable,
                EventType::OutsideOfNetworkInterest,
            ],
            _ => &[],
        }
    }

    /// Look up any catalog name (config lists, catalog dumps).
    pub fn from_name(name: &str) -> Option<EventType> {
        CATALOG_NAMES.get(normalize(name).as_str()).copied()
    }

    /// Parse an external request token. Separators `-` and `_` count as
    /// spaces and a trailing "event" may be left off, so
    /// `induced-or-triggered` selects "induced or triggered event".
    pub fn from_token(token: &str) -> Option<EventType> {
        let name = normalize(token);
        CATALOG_NAMES
            .get(name.as_str())
            .or_else(|| CATALOG_NAMES.get(format!("{name} event").as_str()))
            .copied()
            .filter(|t| t.is_external())
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for EventType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        EventType::from_name(&value).ok_or_else(|| format!("unknown event type '{value}'"))
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

fn normalize(token: &str) -> String {
    token
        .trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
}

// ---------------------------------------------------------------------------
// Token lists
// ---------------------------------------------------------------------------

/// Parse request tokens into a normalised set, expanding each external type
/// with its catalog-only equivalents. Empty tokens are skipped. Returns the
/// first token that is not a known external type as the error.
pub fn parse_request_types<'a, I>(tokens: I) -> Result<EventTypeSet, String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = EventTypeSet::new();
    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        if token.eq_ignore_ascii_case(UNKNOWN_TOKEN) {
            set.insert(None);
            continue;
        }
        let t = EventType::from_token(token).ok_or_else(|| token.to_lowercase())?;
        set.insert(Some(t));
        set.extend(t.equivalents().iter().copied().map(Some));
    }
    Ok(set)
}

/// Parse operator-configured names (allow/deny lists). Any catalog name is
/// accepted, plus `unknown` for untyped events.
pub fn parse_policy_types<S: AsRef<str>>(names: &[S]) -> Result<EventTypeSet, String> {
    names
        .iter()
        .map(|n| {
            let n = n.as_ref();
            if n.trim().eq_ignore_ascii_case(UNKNOWN_TOKEN) {
                Ok(None)
            } else {
                EventType::from_name(n)
                    .map(Some)
                    .ok_or_else(|| n.to_string())
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
