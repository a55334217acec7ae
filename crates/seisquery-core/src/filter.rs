//! Search criteria: parsing, normalisation and validation.
//!
//! [`FilterSpec::from_params`] turns raw request key/value pairs into a
//! validated [`FilterSpec`]. Several parameter names may map to one field;
//! the first alias in the table that the caller supplied wins, and for that
//! alias the first value wins. Every rejection is a
//! [`SearchError::InvalidParameter`] naming the offending parameter(s).
//!
//! Filters the service does not support (`catalog`, `updateafter`) are parsed
//! and carried along so the service layer can reject them; the compiler
//! ignores them.

use crate::error::{Result, SearchError};
use crate::event_type::{self, EventTypeSet};
use crate::geo::{BoundingBox, BoundingCircle};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

// ---------------------------------------------------------------------------
// Parameter names
// ---------------------------------------------------------------------------

pub const P_START: &[&str] = &["starttime", "start"];
pub const P_END: &[&str] = &["endtime", "end"];
pub const P_MIN_LAT: &[&str] = &["minlatitude", "minlat"];
pub const P_MAX_LAT: &[&str] = &["maxlatitude", "maxlat"];
pub const P_MIN_LON: &[&str] = &["minlongitude", "minlon"];
pub const P_MAX_LON: &[&str] = &["maxlongitude", "maxlon"];
pub const P_LAT: &[&str] = &["latitude", "lat"];
pub const P_LON: &[&str] = &["longitude", "lon"];
pub const P_MIN_RADIUS: &[&str] = &["minradius"];
pub const P_MAX_RADIUS: &[&str] = &["maxradius"];
pub const P_MIN_DEPTH: &[&str] = &["mindepth"];
pub const P_MAX_DEPTH: &[&str] = &["maxdepth"];
pub const P_MIN_MAG: &[&str] = &["minmagnitude", "minmag"];
pub const P_MAX_MAG: &[&str] = &["maxmagnitude", "maxmag"];
pub const P_MAG_TYPE: &[&str] = &["magnitudetype", "magtype"];
pub const P_EVENT_TYPE: &[&str] = &["eventtype"];
pub const P_ALL_ORIGINS: &[&str] = &["includeallorigins", "allorigins"];
pub const P_ALL_MAGS: &[&str] = &["includeallmagnitudes", "allmagnitudes", "allmags"];
pub const P_ARRIVALS: &[&str] = &["includearrivals", "allarrivals"];
pub const P_PICKS: &[&str] = &["includepicks", "picks"];
pub const P_FM: &[&str] = &["includefocalmechanism", "focalmechanism", "fm"];
pub const P_ALL_FMS: &[&str] = &["includeallfocalmechanisms", "allfocalmechanisms", "allfms"];
pub const P_STA_MTS: &[&str] = &["includestationmts", "stationmts", "stamts"];
pub const P_COMMENTS: &[&str] = &["includecomments", "comments"];
pub const P_EVENT_ID: &[&str] = &["eventid"];
pub const P_LIMIT: &[&str] = &["limit"];
pub const P_OFFSET: &[&str] = &["offset"];
pub const P_ORDER_BY: &[&str] = &["orderby"];
pub const P_CONTRIBUTOR: &[&str] = &["contributor"];
pub const P_CATALOG: &[&str] = &["catalog"];
pub const P_UPDATE_AFTER: &[&str] = &["updateafter"];
pub const P_FORMAT: &[&str] = &["format"];
pub const P_FORMATTED: &[&str] = &["formatted"];
pub const P_NODATA: &[&str] = &["nodata"];

const ALL_PARAMS: &[&[&str]] = &[
    P_START, P_END, P_MIN_LAT, P_MAX_LAT, P_MIN_LON, P_MAX_LON, P_LAT, P_LON, P_MIN_RADIUS,
    P_MAX_RADIUS, P_MIN_DEPTH, P_MAX_DEPTH, P_MIN_MAG, P_MAX_MAG, P_MAG_TYPE, P_EVENT_TYPE,
    P_ALL_ORIGINS, P_ALL_MAGS, P_ARRIVALS, P_PICKS, P_FM, P_ALL_FMS, P_STA_MTS, P_COMMENTS,
    P_EVENT_ID, P_LIMIT, P_OFFSET, P_ORDER_BY, P_CONTRIBUTOR, P_CATALOG, P_UPDATE_AFTER,
    P_FORMAT, P_FORMATTED, P_NODATA,
];

/// Largest value accepted for limit and offset.
pub const MAX_UINT: u64 = u64::MAX;

// ---------------------------------------------------------------------------
// Filter value types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        !(self.start.is_some_and(|s| t < s) || self.end.is_some_and(|e| t > e))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Region {
    Box(BoundingBox),
    Circle(BoundingCircle),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DepthRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MagnitudeFilter {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Free-form magnitude type, e.g. `Mw` or `ML`.
    pub magnitude_type: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderBy {
    #[default]
    Time,
    TimeAsc,
    Magnitude,
    MagnitudeAsc,
}

impl OrderBy {
    pub fn by_magnitude(self) -> bool {
        matches!(self, OrderBy::Magnitude | OrderBy::MagnitudeAsc)
    }

    pub fn ascending(self) -> bool {
        matches!(self, OrderBy::TimeAsc | OrderBy::MagnitudeAsc)
    }
}

impl std::str::FromStr for OrderBy {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "time" => Ok(OrderBy::Time),
            "time-asc" => Ok(OrderBy::TimeAsc),
            "magnitude" => Ok(OrderBy::Magnitude),
            "magnitude-asc" => Ok(OrderBy::MagnitudeAsc),
            _ => Err(()),
        }
    }
}

/// Which related objects to pull into the assembled graph beyond the
/// preferred ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Inclusion {
    pub all_origins: bool,
    pub all_magnitudes: bool,
    pub arrivals: bool,
    /// Unset means "yes, if arrivals are included".
    pub picks: Option<bool>,
    pub focal_mechanism: bool,
    pub all_focal_mechanisms: bool,
    pub station_moment_tensors: bool,
    pub comments: bool,
}

impl Inclusion {
    pub fn picks(&self) -> bool {
        self.arrivals && self.picks.unwrap_or(true)
    }

    pub fn focal_mechanisms(&self) -> bool {
        self.focal_mechanism || self.all_focal_mechanisms
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Complete structured document.
    #[default]
    Json,
    /// One pipe-separated line per event.
    Text,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Text => "text",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub format: OutputFormat,
    pub formatted: bool,
    /// Status used when nothing matched: 204 or 404.
    pub nodata: u16,
}

impl Default for Output {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            formatted: false,
            nodata: 204,
        }
    }
}

// ---------------------------------------------------------------------------
// FilterSpec
// ---------------------------------------------------------------------------

/// Validated criteria of one search request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSpec {
    pub time: Option<TimeWindow>,
    pub region: Option<Region>,
    pub depth: Option<DepthRange>,
    pub magnitude: Option<MagnitudeFilter>,
    /// Requested types after expansion; empty means "any".
    pub event_types: EventTypeSet,
    /// Agency identifiers.
    pub contributors: Vec<String>,
    pub catalogs: Vec<String>,
    pub updated_after: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    /// Zero-based; the request value is one-based.
    pub offset: Option<u64>,
    pub order_by: Option<OrderBy>,
    pub event_ids: Vec<String>,
    pub include: Inclusion,
    pub output: Output,
}

impl FilterSpec {
    /// Parse and validate raw request parameters.
    pub fn from_params<K, V>(pairs: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let params = Params::new(pairs)?;
        let mut spec = FilterSpec::default();

        // time
        let start = params.time(P_START)?;
        let end = params.time(P_END)?;
        if start.is_some() || end.is_some() {
            spec.time = Some(TimeWindow { start, end });
        }

        spec.region = parse_region(&params)?;

        // depth
        let depth = DepthRange {
            min: params.float(P_MIN_DEPTH)?,
            max: params.float(P_MAX_DEPTH)?,
        };
        if depth.min.is_some() || depth.max.is_some() {
            spec.depth = Some(depth);
        }

        // magnitude
        let mag = MagnitudeFilter {
            min: params.float(P_MIN_MAG)?,
            max: params.float(P_MAX_MAG)?,
            magnitude_type: params
                .first(P_MAG_TYPE)
                .map(|(_, v)| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        };
        if mag.min.is_some() || mag.max.is_some() || mag.magnitude_type.is_some() {
            spec.magnitude = Some(mag);
        }

        // event type
        let tokens = params.list(P_EVENT_TYPE);
        spec.event_types = event_type::parse_request_types(tokens.iter().map(String::as_str))
            .map_err(|t| SearchError::invalid(format!("'{t}' is not a valid QuakeML event type")))?;

        // output components
        spec.include = Inclusion {
            all_origins: params.boolean(P_ALL_ORIGINS)?.unwrap_or(false),
            all_magnitudes: params.boolean(P_ALL_MAGS)?.unwrap_or(false),
            arrivals: params.boolean(P_ARRIVALS)?.unwrap_or(false),
            picks: params.boolean(P_PICKS)?,
            focal_mechanism: params.boolean(P_FM)?.unwrap_or(false),
            all_focal_mechanisms: params.boolean(P_ALL_FMS)?.unwrap_or(false),
            station_moment_tensors: params.boolean(P_STA_MTS)?.unwrap_or(false),
            comments: params.boolean(P_COMMENTS)?.unwrap_or(false),
        };

        // limit, offset, orderby
        spec.limit = params.uint(P_LIMIT, 1)?;
        spec.offset = params.uint(P_OFFSET, 1)?.map(|o| o - 1);
        if let Some((key, value)) = params.first(P_ORDER_BY) {
            spec.order_by = Some(
                value
                    .parse()
                    .map_err(|_| SearchError::invalid(format!("invalid value in parameter: {key}")))?,
            );
        }

        spec.catalogs = params.list(P_CATALOG);
        spec.contributors = params.list(P_CONTRIBUTOR);
        spec.updated_after = params.time(P_UPDATE_AFTER)?;
        spec.event_ids = params.list(P_EVENT_ID);

        spec.output = parse_output(&params)?;

        spec.validate()?;
        Ok(spec)
    }

    /// Check the cross-field invariants. [`FilterSpec::from_params`] calls this;
    /// specs built by hand should too.
    pub fn validate(&self) -> Result<()> {
        if let Some(TimeWindow { start: Some(s), end: Some(e) }) = self.time {
            if s > e {
                return Err(exceeds(P_START, P_END));
            }
        }
        if let Some(d) = &self.depth {
            check_range(d.min, d.max, P_MIN_DEPTH, P_MAX_DEPTH)?;
        }
        if let Some(m) = &self.magnitude {
            check_range(m.min, m.max, P_MIN_MAG, P_MAX_MAG)?;
        }
        match &self.region {
            Some(Region::Box(b)) => check_range(b.min_lat, b.max_lat, P_MIN_LAT, P_MAX_LAT)?,
            Some(Region::Circle(c)) => {
                check_range(c.min_radius, c.max_radius, P_MIN_RADIUS, P_MAX_RADIUS)?
            }
            None => {}
        }
        if self.limit == Some(0) {
            return Err(SearchError::invalid(format!("{} must be at least 1", P_LIMIT[0])));
        }

        let conflicts = self.conflicting_filters();
        if !self.event_ids.is_empty() && !conflicts.is_empty() {
            return Err(SearchError::invalid(format!(
                "invalid mixture of parameters, the parameter '{}' may only be combined with: \
                 {}, {}, {}, {}, {}, {}, {}, {} (conflicting: {})",
                P_EVENT_ID[0],
                P_ALL_ORIGINS[0],
                P_ALL_MAGS[0],
                P_ARRIVALS[0],
                P_PICKS[0],
                P_FM[0],
                P_ALL_FMS[0],
                P_STA_MTS[0],
                P_COMMENTS[0],
                conflicts.join(", "),
            )));
        }
        Ok(())
    }

    /// Canonical names of the set filters that may not accompany an event-ID
    /// list.
    fn conflicting_filters(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.time.is_some() {
            names.push("time");
        }
        if self.region.is_some() {
            names.push("region");
        }
        if self.depth.is_some() {
            names.push("depth");
        }
        if self.magnitude.is_some() {
            names.push("magnitude");
        }
        if self.limit.is_some() {
            names.push(P_LIMIT[0]);
        }
        if self.offset.is_some() {
            names.push(P_OFFSET[0]);
        }
        if self.order_by.is_some() {
            names.push(P_ORDER_BY[0]);
        }
        if !self.catalogs.is_empty() {
            names.push(P_CATALOG[0]);
        }
        if !self.contributors.is_empty() {
            names.push(P_CONTRIBUTOR[0]);
        }
        if self.updated_after.is_some() {
            names.push(P_UPDATE_AFTER[0]);
        }
        names
    }

    pub fn order_by(&self) -> OrderBy {
        self.order_by.unwrap_or_default()
    }

    pub fn magnitude_type(&self) -> Option<&str> {
        self.magnitude.as_ref()?.magnitude_type.as_deref()
    }
}

fn exceeds(min: &[&str], max: &[&str]) -> SearchError {
    SearchError::invalid(format!("{} exceeds {}", min[0], max[0]))
}

fn check_range(min: Option<f64>, max: Option<f64>, pmin: &[&str], pmax: &[&str]) -> Result<()> {
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => Err(exceeds(pmin, pmax)),
        _ => Ok(()),
    }
}

fn parse_region(params: &Params) -> Result<Option<Region>> {
    let bbox = BoundingBox {
        min_lat: params.float_in(P_MIN_LAT, -90.0, 90.0)?,
        max_lat: params.float_in(P_MAX_LAT, -90.0, 90.0)?,
        min_lon: params.float_in(P_MIN_LON, -180.0, 180.0)?,
        max_lon: params.float_in(P_MAX_LON, -180.0, 180.0)?,
    };
    let lat = params.float_in(P_LAT, -90.0, 90.0)?;
    let lon = params.float_in(P_LON, -180.0, 180.0)?;
    let min_radius = params.float_in(P_MIN_RADIUS, 0.0, 180.0)?;
    let max_radius = params.float_in(P_MAX_RADIUS, 0.0, 180.0)?;

    let has_box = bbox != BoundingBox::default();
    let has_circle = lat.is_some() || lon.is_some() || min_radius.is_some() || max_radius.is_some();

    match (has_box, has_circle) {
        (true, true) => Err(SearchError::invalid(
            "bounding box and bounding circle parameters may not be combined",
        )),
        (true, false) => Ok(Some(Region::Box(bbox))),
        (false, true) => Ok(Some(Region::Circle(BoundingCircle {
            lat: lat.unwrap_or(0.0),
            lon: lon.unwrap_or(0.0),
            min_radius,
            max_radius,
        }))),
        (false, false) => Ok(None),
    }
}

fn parse_output(params: &Params) -> Result<Output> {
    let mut output = Output::default();
    if let Some((key, value)) = params.first(P_FORMAT) {
        output.format = match value.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "text" => OutputFormat::Text,
            _ => return Err(SearchError::invalid(format!("invalid value in parameter: {key}"))),
        };
    }
    output.formatted = params.boolean(P_FORMATTED)?.unwrap_or(false);
    if let Some(nodata) = params.uint(P_NODATA, 0)? {
        if nodata != 204 && nodata != 404 {
            return Err(SearchError::invalid("invalid nodata value, expected 204 or 404"));
        }
        output.nodata = nodata as u16;
    }
    Ok(output)
}

// ---------------------------------------------------------------------------
// Raw parameter access
// ---------------------------------------------------------------------------

/// Lower-cased request parameters in arrival order.
struct Params {
    pairs: Vec<(String, String)>,
}

impl Params {
    fn new<K: AsRef<str>, V: AsRef<str>>(pairs: &[(K, V)]) -> Result<Self> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.as_ref().trim().to_lowercase(), v.as_ref().to_string()))
            .collect();
        for (key, _) in &pairs {
            if !ALL_PARAMS.iter().any(|names| names.contains(&key.as_str())) {
                return Err(SearchError::invalid(format!("invalid parameter: {key}")));
            }
        }
        Ok(Self { pairs })
    }

    /// The first value of the first alias that was supplied.
    fn first(&self, names: &[&'static str]) -> Option<(&'static str, &str)> {
        names.iter().find_map(|name| {
            self.pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| (*name, v.as_str()))
        })
    }

    /// All values of all aliases, comma lists flattened, blanks dropped.
    fn list(&self, names: &[&str]) -> Vec<String> {
        self.pairs
            .iter()
            .filter(|(k, _)| names.contains(&k.as_str()))
            .flat_map(|(_, v)| v.split(','))
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn float(&self, names: &[&'static str]) -> Result<Option<f64>> {
        let Some((key, value)) = self.first(names) else {
            return Ok(None);
        };
        match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(SearchError::invalid(format!("invalid float value in parameter: {key}"))),
        }
    }

    fn float_in(&self, names: &[&'static str], min: f64, max: f64) -> Result<Option<f64>> {
        match self.float(names)? {
            Some(v) if v < min || v > max => Err(SearchError::invalid(format!(
                "parameter {} out of range [{min}, {max}]",
                names[0]
            ))),
            other => Ok(other),
        }
    }

    fn uint(&self, names: &[&'static str], min: u64) -> Result<Option<u64>> {
        let Some((key, value)) = self.first(names) else {
            return Ok(None);
        };
        let v: u64 = value
            .trim()
            .parse()
            .map_err(|_| SearchError::invalid(format!("invalid integer value in parameter: {key}")))?;
        if v < min {
            return Err(SearchError::invalid(format!(
                "parameter {key} must be at least {min}"
            )));
        }
        Ok(Some(v))
    }

    fn boolean(&self, names: &[&'static str]) -> Result<Option<bool>> {
        let Some((key, value)) = self.first(names) else {
            return Ok(None);
        };
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(SearchError::invalid(format!("invalid boolean value in parameter: {key}"))),
        }
    }

    fn time(&self, names: &[&'static str]) -> Result<Option<DateTime<Utc>>> {
        let Some((key, value)) = self.first(names) else {
            return Ok(None);
        };
        parse_time(value)
            .map(Some)
            .ok_or_else(|| SearchError::invalid(format!("invalid date string in parameter: {key}")))
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` and fractional seconds, with
/// an optional trailing `Z`. Times are UTC.
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let value = value.strip_suffix('Z').unwrap_or(value);
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
