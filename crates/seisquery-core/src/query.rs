//! Filter-to-query compiler.
//!
//! [`compile`] maps a validated [`FilterSpec`] plus the operator's
//! [`EventPolicy`] onto an [`EventQuery`]: a predicate tree evaluated per
//! candidate row, the magnitude sources whose rows are unioned, an optional
//! great-circle post-filter, the ordering and the page window. Store adapters
//! execute it; [`crate::sql`] renders it as SQL text.
//!
//! # Rows
//!
//! A row joins an event with its preferred origin and, depending on the
//! magnitude source, one magnitude:
//!
//! ```text
//! MagnitudeSource::None             event ⋈ preferred origin
//! MagnitudeSource::Preferred        … ⋈ event.preferred magnitude
//! MagnitudeSource::PreferredOrigin  … ⋈ any magnitude of the preferred origin
//! MagnitudeSource::DerivedOrigins   … ⋈ any magnitude of a derived origin of a
//!                                       moment tensor of the preferred focal mechanism
//! ```
//!
//! A magnitude-type filter cannot use the preferred magnitude (it may be of
//! another type), so it unions the last two sources. Ordering, the distance
//! stage and pagination run over the union.

use crate::event_type::{EventType, EventTypeSet};
use crate::filter::{FilterSpec, OrderBy, Region, MAX_UINT};
use crate::geo::{BoundingBox, BoundingCircle};
use crate::types::{EvaluationMode, Event, Magnitude, Origin};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

// ---------------------------------------------------------------------------
// Operator policy
// ---------------------------------------------------------------------------

/// Server-side restrictions applied to every request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPolicy {
    /// Only these types are ever returned (`None` entry = untyped events).
    pub whitelist: Option<EventTypeSet>,
    /// These types are never returned.
    pub blacklist: Option<EventTypeSet>,
    /// Only events whose preferred origin has this evaluation mode.
    pub evaluation_mode: Option<EvaluationMode>,
}

impl EventPolicy {
    /// Apply the allow/deny lists to a single event type.
    pub fn admits(&self, event_type: Option<EventType>) -> bool {
        if let Some(allow) = self.whitelist.as_ref().filter(|s| !s.is_empty()) {
            if !allow.contains(&event_type) {
                return false;
            }
        }
        if let Some(deny) = &self.blacklist {
            if deny.contains(&event_type) {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Query representation
// ---------------------------------------------------------------------------

/// Logical columns a predicate can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    EventType,
    EventAgency,
    OriginTime,
    OriginLatitude,
    OriginLongitude,
    OriginDepth,
    OriginEvaluationMode,
    MagnitudeValue,
    MagnitudeType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Time(DateTime<Utc>),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ge,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare { field: Field, op: CmpOp, value: Value },
    /// Case-sensitive membership for event types; agency values are stored
    /// upper-cased and compared case-insensitively. A null field never
    /// matches, negated or not.
    InSet { field: Field, values: Vec<String>, negated: bool },
    IsNull(Field),
}

impl Predicate {
    pub fn cmp(field: Field, op: CmpOp, value: Value) -> Self {
        Predicate::Compare { field, op, value }
    }

    /// Conjunction that drops `True` terms and flattens nested `And`s.
    pub fn all(terms: Vec<Predicate>) -> Self {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                Predicate::True => {}
                Predicate::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Predicate::True,
            1 => flat.remove(0),
            _ => Predicate::And(flat),
        }
    }

    pub fn eval(&self, row: &Row<'_>) -> bool {
        match self {
            Predicate::True => true,
            Predicate::And(terms) => terms.iter().all(|p| p.eval(row)),
            Predicate::Or(terms) => terms.iter().any(|p| p.eval(row)),
            Predicate::Not(inner) => !inner.eval(row),
            Predicate::Compare { field, op, value } => {
                let Some(actual) = row.get(*field) else {
                    return false;
                };
                match (op, compare(&actual, value)) {
                    (CmpOp::Eq, Some(Ordering::Equal)) => true,
                    (CmpOp::Ge, Some(Ordering::Greater | Ordering::Equal)) => true,
                    (CmpOp::Le, Some(Ordering::Less | Ordering::Equal)) => true,
                    _ => false,
                }
            }
            Predicate::InSet { field, values, negated } => {
                let Some(Value::Text(actual)) = row.get(*field) else {
                    return false;
                };
                let found = if *field == Field::EventAgency {
                    values.iter().any(|v| v.eq_ignore_ascii_case(&actual))
                } else {
                    values.iter().any(|v| *v == actual)
                };
                found != *negated
            }
            Predicate::IsNull(field) => row.get(*field).is_none(),
        }
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (Value::Text(x), Value::Text(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Which magnitude, if any, each candidate row is joined with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagnitudeSource {
    None,
    Preferred,
    PreferredOrigin,
    DerivedOrigins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    OriginTime,
    MagnitudeValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub key: SortKey,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    /// Zero-based.
    pub offset: u64,
}

/// A compiled event search.
#[derive(Debug, Clone, PartialEq)]
pub struct EventQuery {
    /// Row predicate shared by every branch.
    pub filter: Predicate,
    /// One union branch per source. Never empty.
    pub branches: Vec<MagnitudeSource>,
    /// Exact ring test on the preferred origin, applied after ordering.
    pub distance: Option<BoundingCircle>,
    pub order: Order,
    pub page: Option<Page>,
}

impl EventQuery {
    pub fn is_union(&self) -> bool {
        self.branches.len() > 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Compiled {
    /// The filter combination provably matches nothing; no query is issued.
    Empty,
    Query(EventQuery),
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One candidate row as seen by a predicate.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub event: &'a Event,
    pub origin: &'a Origin,
    pub magnitude: Option<&'a Magnitude>,
}

impl Row<'_> {
    pub fn get(&self, field: Field) -> Option<Value> {
        match field {
            Field::EventType => self
                .event
                .event_type
                .map(|t| Value::Text(t.as_str().to_string())),
            Field::EventAgency => self.event.agency_id().map(|a| Value::Text(a.to_string())),
            Field::OriginTime => Some(Value::Time(self.origin.time)),
            Field::OriginLatitude => Some(Value::Float(self.origin.latitude)),
            Field::OriginLongitude => Some(Value::Float(self.origin.longitude)),
            Field::OriginDepth => self.origin.depth.map(Value::Float),
            Field::OriginEvaluationMode => self
                .origin
                .evaluation_mode
                .map(|m| Value::Text(m.to_string())),
            Field::MagnitudeValue => self.magnitude.map(|m| Value::Float(m.value)),
            Field::MagnitudeType => self
                .magnitude
                .map(|m| Value::Text(m.magnitude_type.clone())),
        }
    }

    pub fn sort_value(&self, key: SortKey) -> Option<SortValue> {
        match key {
            SortKey::OriginTime => Some(SortValue::Time(self.origin.time)),
            SortKey::MagnitudeValue => self.magnitude.map(|m| SortValue::Magnitude(m.value)),
        }
    }
}

/// Value of the ordering column for one hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SortValue {
    Time(DateTime<Utc>),
    Magnitude(f64),
}

impl SortValue {
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortValue::Time(a), SortValue::Time(b)) => a.cmp(b),
            (SortValue::Magnitude(a), SortValue::Magnitude(b)) => a.total_cmp(b),
            (SortValue::Time(_), SortValue::Magnitude(_)) => Ordering::Less,
            (SortValue::Magnitude(_), SortValue::Time(_)) => Ordering::Greater,
        }
    }
}

/// One matched event in result order.
#[derive(Debug, Clone, PartialEq)]
pub struct EventHit {
    pub public_id: String,
    pub sort_value: Option<SortValue>,
    /// Great-circle distance to the circle center when a circle was given.
    pub distance: Option<f64>,
}

impl EventHit {
    pub fn id(public_id: impl Into<String>) -> Self {
        Self {
            public_id: public_id.into(),
            sort_value: None,
            distance: None,
        }
    }
}

/// Order hits, keep the first row per event, then cut the page window.
/// Ties are broken by public ID so the result never depends on store
/// iteration order.
pub fn finish_hits(mut hits: Vec<EventHit>, order: Order, page: Option<Page>) -> Vec<EventHit> {
    hits.sort_by(|a, b| {
        let by_key = match (&a.sort_value, &b.sort_value) {
            (Some(x), Some(y)) => x.total_cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let by_key = if order.ascending { by_key } else { by_key.reverse() };
        by_key.then_with(|| a.public_id.cmp(&b.public_id))
    });

    let mut seen = std::collections::HashSet::new();
    hits.retain(|h| seen.insert(h.public_id.clone()));

    match page {
        Some(Page { limit, offset }) => {
            let offset = usize::try_from(offset).unwrap_or(usize::MAX);
            let limit = usize::try_from(limit).unwrap_or(usize::MAX);
            hits.into_iter().skip(offset).take(limit).collect()
        }
        None => hits,
    }
}

// ---------------------------------------------------------------------------
// Compiler
// ---------------------------------------------------------------------------

/// Compile a validated filter. Never fails; returns [`Compiled::Empty`] when
/// the allow-list leaves nothing to match.
pub fn compile(spec: &FilterSpec, policy: &EventPolicy) -> Compiled {
    let order_by = spec.order_by();
    let magnitude_type = spec.magnitude_type();
    let joins_magnitude = spec.magnitude.is_some() || order_by.by_magnitude();

    let mut terms = Vec::new();

    // event type allow list, from configuration and/or request
    let allowed = match (&policy.whitelist, spec.event_types.is_empty()) {
        (Some(allow), false) if !allow.is_empty() => {
            let both: EventTypeSet = allow.intersection(&spec.event_types).copied().collect();
            if both.is_empty() {
                tracing::debug!(
                    "all requested event types filtered by configured event type white list"
                );
                return Compiled::Empty;
            }
            Some(both)
        }
        (Some(allow), _) if !allow.is_empty() => Some(allow.clone()),
        (_, false) => Some(spec.event_types.clone()),
        _ => None,
    };
    if let Some(types) = allowed {
        terms.push(type_membership(&types, false));
    }

    // event type deny list, configuration only
    if let Some(deny) = policy.blacklist.as_ref().filter(|d| !d.is_empty()) {
        terms.push(type_membership(deny, true));
    }

    if !spec.contributors.is_empty() {
        terms.push(Predicate::InSet {
            field: Field::EventAgency,
            values: spec.contributors.iter().map(|c| c.to_uppercase()).collect(),
            negated: false,
        });
    }

    if let Some(mode) = policy.evaluation_mode {
        terms.push(Predicate::cmp(
            Field::OriginEvaluationMode,
            CmpOp::Eq,
            Value::Text(mode.to_string()),
        ));
    }

    if let Some(window) = &spec.time {
        if let Some(start) = window.start {
            terms.push(Predicate::cmp(Field::OriginTime, CmpOp::Ge, Value::Time(start)));
        }
        if let Some(end) = window.end {
            terms.push(Predicate::cmp(Field::OriginTime, CmpOp::Le, Value::Time(end)));
        }
    }

    let (bbox, distance) = match spec.region {
        Some(Region::Box(b)) => (Some(b), None),
        Some(Region::Circle(c)) => (Some(c.bounding_box()), Some(c)),
        None => (None, None),
    };
    if let Some(bbox) = bbox {
        terms.push(bounding_box_predicate(&bbox));
    }

    if let Some(depth) = &spec.depth {
        terms.push(Predicate::Not(Box::new(Predicate::IsNull(Field::OriginDepth))));
        if let Some(min) = depth.min {
            terms.push(Predicate::cmp(Field::OriginDepth, CmpOp::Ge, Value::Float(min)));
        }
        if let Some(max) = depth.max {
            terms.push(Predicate::cmp(Field::OriginDepth, CmpOp::Le, Value::Float(max)));
        }
    }

    let branches = if joins_magnitude {
        if let Some(mag) = &spec.magnitude {
            if let Some(min) = mag.min {
                terms.push(Predicate::cmp(Field::MagnitudeValue, CmpOp::Ge, Value::Float(min)));
            }
            if let Some(max) = mag.max {
                terms.push(Predicate::cmp(Field::MagnitudeValue, CmpOp::Le, Value::Float(max)));
            }
        }
        match magnitude_type {
            Some(t) => {
                terms.push(Predicate::cmp(
                    Field::MagnitudeType,
                    CmpOp::Eq,
                    Value::Text(t.to_string()),
                ));
                vec![MagnitudeSource::PreferredOrigin, MagnitudeSource::DerivedOrigins]
            }
            None => vec![MagnitudeSource::Preferred],
        }
    } else {
        vec![MagnitudeSource::None]
    };

    let order = Order::from(order_by);

    let page = (spec.limit.is_some() || spec.offset.is_some()).then(|| Page {
        limit: spec.limit.unwrap_or(MAX_UINT),
        offset: spec.offset.unwrap_or(0),
    });

    Compiled::Query(EventQuery {
        filter: Predicate::all(terms),
        branches,
        distance,
        order,
        page,
    })
}

/// Membership test on the event type honouring the `None` sentinel.
/// `negated = false`: type in set (untyped allowed iff `None` in set).
/// `negated = true`: type not in set (untyped denied iff `None` in set).
fn type_membership(types: &EventTypeSet, negated: bool) -> Predicate {
    let has_null = types.contains(&None);
    let names: Vec<String> = types
        .iter()
        .flatten()
        .map(|t| t.as_str().to_string())
        .collect();
    let set = Predicate::InSet {
        field: Field::EventType,
        values: names.clone(),
        negated,
    };
    let is_null = Predicate::IsNull(Field::EventType);

    match (negated, has_null, names.is_empty()) {
        (false, true, true) => is_null,
        (false, true, false) => Predicate::Or(vec![is_null, set]),
        (false, false, _) => set,
        (true, true, true) => Predicate::Not(Box::new(is_null)),
        // a null type never passes a (negated) set test
        (true, true, false) => set,
        (true, false, true) => Predicate::True,
        (true, false, false) => Predicate::Or(vec![is_null, set]),
    }
}

/// Latitude bounds plus longitude bounds; a range crossing the anti-meridian
/// becomes the union of its two halves. Both branches read the same
/// `min_lon`/`max_lon` fields.
pub fn bounding_box_predicate(bbox: &BoundingBox) -> Predicate {
    let mut terms = Vec::new();
    if let Some(min) = bbox.min_lat {
        terms.push(Predicate::cmp(Field::OriginLatitude, CmpOp::Ge, Value::Float(min)));
    }
    if let Some(max) = bbox.max_lat {
        terms.push(Predicate::cmp(Field::OriginLatitude, CmpOp::Le, Value::Float(max)));
    }
    match (bbox.min_lon, bbox.max_lon) {
        (Some(min), Some(max)) if bbox.crosses_date_line() => {
            terms.push(Predicate::Or(vec![
                Predicate::cmp(Field::OriginLongitude, CmpOp::Ge, Value::Float(min)),
                Predicate::cmp(Field::OriginLongitude, CmpOp::Le, Value::Float(max)),
            ]));
        }
        (min, max) => {
            if let Some(min) = min {
                terms.push(Predicate::cmp(Field::OriginLongitude, CmpOp::Ge, Value::Float(min)));
            }
            if let Some(max) = max {
                terms.push(Predicate::cmp(Field::OriginLongitude, CmpOp::Le, Value::Float(max)));
            }
        }
    }
    Predicate::all(terms)
}

impl From<OrderBy> for Order {
    fn from(order_by: OrderBy) -> Self {
        Order {
            key: if order_by.by_magnitude() {
                SortKey::MagnitudeValue
            } else {
                SortKey::OriginTime
            },
            ascending: order_by.ascending(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
