//! Core domain types for the current-events pipeline.

use std::fmt;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{EventGraphError, Result};

/// Wikidata entity namespace used for canonical entity URIs.
pub const WIKIDATA_ENTITY_NS: &str = "http://www.wikidata.org/entity/";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for pipeline run identifiers (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// YearMonth / DayRange / Period
// ---------------------------------------------------------------------------

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(EventGraphError::validation(format!(
                "month must be within 1..=12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    /// English month name, as used in portal page titles.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }

    /// The following calendar month.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn days_in_month(&self) -> u32 {
        match (self.first_day(), self.next().first_day()) {
            (Some(first), Some(next)) => (next - first).num_days() as u32,
            _ => 0,
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    /// `January_2022`, the plain-month artifact prefix.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.month_name(), self.year)
    }
}

impl std::str::FromStr for YearMonth {
    type Err = EventGraphError;

    /// Accepts `M/YYYY` (e.g. `1/2022`).
    fn from_str(s: &str) -> Result<Self> {
        let (month, year) = s.trim().split_once('/').ok_or_else(|| {
            EventGraphError::validation(format!("expected month as M/YYYY, got '{s}'"))
        })?;
        let month: u32 = month
            .parse()
            .map_err(|_| EventGraphError::validation(format!("invalid month in '{s}'")))?;
        let year: i32 = year
            .parse()
            .map_err(|_| EventGraphError::validation(format!("invalid year in '{s}'")))?;
        Self::new(year, month)
    }
}

/// Inclusive day sub-range within one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayRange {
    pub start: u32,
    pub end: u32,
}

impl DayRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start == 0 || end > 31 || start > end {
            return Err(EventGraphError::validation(format!(
                "day range {start}..={end} must satisfy 1 <= start <= end <= 31"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, day: u32) -> bool {
        (self.start..=self.end).contains(&day)
    }
}

/// A unit of work: a full month, or a day sub-range of one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub month: YearMonth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<DayRange>,
}

impl Period {
    pub fn full(month: YearMonth) -> Self {
        Self { month, days: None }
    }

    pub fn partial(month: YearMonth, days: DayRange) -> Self {
        Self {
            month,
            days: Some(days),
        }
    }

    pub fn is_full_month(&self) -> bool {
        self.days.is_none()
    }

    /// Artifact name prefix: `January_2022` or `1_2_January_2022`.
    pub fn prefix(&self) -> String {
        match self.days {
            None => self.month.to_string(),
            Some(days) => format!("{}_{}_{}", days.start, days.end, self.month),
        }
    }

    /// Every date of the period, clamped to the month's length.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let last = self.month.days_in_month();
        let (start, end) = match self.days {
            Some(days) => (days.start, days.end.min(last)),
            None => (1, last),
        };
        (start..=end)
            .filter_map(|day| NaiveDate::from_ymd_opt(self.month.year, self.month.month, day))
            .collect()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

// ---------------------------------------------------------------------------
// GraphType
// ---------------------------------------------------------------------------

/// The four parallel documents emitted per period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    /// Events, dates, categories, entity and location links.
    Base,
    /// Entity one-hop neighbourhoods.
    Ohg,
    /// Location geometry and place types.
    Osm,
    /// Source markup per event.
    Raw,
}

impl GraphType {
    pub const ALL: [GraphType; 4] = [
        GraphType::Base,
        GraphType::Ohg,
        GraphType::Osm,
        GraphType::Raw,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::Base => "base",
            GraphType::Ohg => "ohg",
            GraphType::Osm => "osm",
            GraphType::Raw => "raw",
        }
    }
}

impl fmt::Display for GraphType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Term
// ---------------------------------------------------------------------------

/// An RDF object term.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Term {
    Iri(String),
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn plain(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    pub fn lang(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: Some(lang.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// Events and mentions
// ---------------------------------------------------------------------------

/// A topic heading an event is nested under (e.g. "2022 Kazakh unrest").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Position among the day's topics, from 0.
    #[serde(default)]
    pub index: usize,
    /// The `<li>` markup the topic came from.
    #[serde(default)]
    pub raw_html: String,
}

/// One sentence of an event's text, with character offsets into `Event::text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// A news source cited for an event, e.g. `(Reuters)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLink {
    pub label: String,
    pub url: String,
}

/// Canonical knowledge-base identity plus display label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityReference {
    /// Knowledge-base id, e.g. `Q42`.
    pub id: String,
    pub label: String,
}

impl EntityReference {
    pub fn uri(&self) -> String {
        format!("{WIKIDATA_ENTITY_NS}{}", self.id)
    }
}

/// A textual reference to an entity, linked or free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub text: String,
    /// Inline article link, when the portal linked the span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Character span within the event text, when the mention is inline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<(usize, usize)>,
    /// Filled by entity resolution; `None` means unresolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityReference>,
}

impl EntityMention {
    pub fn linked(text: impl Into<String>, link: impl Into<String>, span: (usize, usize)) -> Self {
        Self {
            text: text.into(),
            link: Some(link.into()),
            span: Some(span),
            entity: None,
        }
    }

    pub fn unlinked(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            link: None,
            span: None,
            entity: None,
        }
    }
}

/// A place referenced by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationMention {
    pub name: String,
    /// Containing area used to disambiguate homonyms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Filled by geocoding; `None` when geocoding failed or has not run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationReference>,
}

impl LocationMention {
    pub fn new(name: impl Into<String>, area_hint: Option<String>, link: Option<String>) -> Self {
        Self {
            name: name.into(),
            area_hint,
            link,
            location: None,
        }
    }

    /// Normalized `name|hint` identity of this place.
    pub fn key(&self) -> String {
        location_key(&self.name, self.area_hint.as_deref())
    }
}

/// Lat/lon in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReference {
    /// Normalized `name|hint` key the place was resolved from.
    pub key: String,
    /// Display name reported by the geocoder.
    pub display_name: String,
    /// Outline as WKT when the place has an area, otherwise a WKT point.
    pub geometry: String,
    pub centroid: Coordinate,
    /// Most specific first, e.g. `["city", "place", "boundary"]`.
    #[serde(default)]
    pub place_types: Vec<String>,
    /// Containing areas, innermost first.
    #[serde(default)]
    pub hierarchy: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub osm_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<u64>,
}

impl LocationReference {
    /// `https://www.openstreetmap.org/relation/123`, when the geocoder named the object.
    pub fn osm_url(&self) -> Option<String> {
        match (&self.osm_type, self.osm_id) {
            (Some(kind), Some(id)) => Some(format!("https://www.openstreetmap.org/{kind}/{id}")),
            _ => None,
        }
    }
}

/// A single current-events entry for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub date: NaiveDate,
    /// Position within the day page, from 0.
    pub index: usize,
    /// URL of the day page the event was parsed from.
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Enclosing topics, outermost first.
    #[serde(default)]
    pub topics: Vec<Topic>,
    pub text: String,
    pub fragments: Vec<TextFragment>,
    #[serde(default)]
    pub mentions: Vec<EntityMention>,
    #[serde(default)]
    pub locations: Vec<LocationMention>,
    #[serde(default)]
    pub sources: Vec<SourceLink>,
    /// The `<li>` markup the event came from.
    pub raw_html: String,
}

impl Event {
    /// `{day page}#{day}_e{index}`.
    pub fn uri(&self) -> String {
        format!("{}#{}_e{}", self.source_url, self.date.day(), self.index)
    }

    /// `{day page}#{day}_t{index}` for one of this event's topics.
    pub fn topic_uri(&self, topic: &Topic) -> String {
        format!("{}#{}_t{}", self.source_url, self.date.day(), topic.index)
    }

    /// Resolved entities, in mention order, duplicates included.
    pub fn resolved_entities(&self) -> impl Iterator<Item = &EntityReference> {
        self.mentions.iter().filter_map(|m| m.entity.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Linked articles
// ---------------------------------------------------------------------------

/// A linked article page, inspected once per run and shared by every event
/// and topic linking to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// Page URL without fragment; see [`article_key`].
    pub url: String,
    /// The infobox marks the article as a place.
    #[serde(default)]
    pub is_place: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinate>,
    /// Markup of the first infobox table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infobox_html: Option<String>,
    #[serde(default)]
    pub rows: Vec<InfoboxRow>,
    /// hCalendar `dtstart` of a `vevent` infobox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtstart: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtend: Option<NaiveDate>,
    /// Filled by entity resolution of the article title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityReference>,
}

/// One labelled infobox row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoboxRow {
    pub label: String,
    pub value: String,
    /// Article links inside the value cell.
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub kind: InfoboxValue,
}

/// Typed reading of an infobox row value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InfoboxValue {
    #[default]
    Plain,
    /// A `Location`/`Place`-style row.
    Location,
    Date(DateSpan),
    Time(TimeSpan),
}

/// A date row: start and/or end, or a start with an ongoing end.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateSpan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub ongoing: bool,
    /// UTC offset like `+03:00`, when the row named one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// A time-of-day row, e.g. `12:30 – 14:00 (UTC+3)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: NaiveTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// An OpenStreetMap object named by a knowledge-base entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OsmElement {
    /// `node`, `way` or `relation`.
    pub osm_type: String,
    pub osm_id: u64,
    /// WKT geometry when the geocoder returned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
}

impl OsmElement {
    pub fn url(&self) -> String {
        format!("https://www.openstreetmap.org/{}/{}", self.osm_type, self.osm_id)
    }
}

/// One knowledge-base fact adjacent to a resolved entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OneHopFact {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

// ---------------------------------------------------------------------------
// Lookup outcomes
// ---------------------------------------------------------------------------

/// Why a single lookup produced no result. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupFailure {
    #[error("no match")]
    NoMatch,
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("service failure: {0}")]
    Service(String),
}

impl From<EventGraphError> for LookupFailure {
    fn from(err: EventGraphError) -> Self {
        match err {
            EventGraphError::Parse { message } => LookupFailure::Malformed(message),
            other => LookupFailure::Service(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalization helpers
// ---------------------------------------------------------------------------

/// Article identity of a link: the URL without its `#fragment`.
pub fn article_key(link: &str) -> &str {
    link.split('#').next().unwrap_or(link)
}

/// Trim and collapse internal whitespace runs to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Case-folded `name|hint` key identifying a place across documents and runs.
pub fn location_key(name: &str, area_hint: Option<&str>) -> String {
    let name = normalize_whitespace(name).to_lowercase();
    match area_hint.map(normalize_whitespace) {
        Some(hint) if !hint.is_empty() => format!("{name}|{}", hint.to_lowercase()),
        _ => name,
    }
}

/// Lowercase hex SHA-256 of `input`.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// ASCII slug: lowercase alphanumerics joined by single hyphens.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(c.to_ascii_lowercase());
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("x");
    }
    slug
}
