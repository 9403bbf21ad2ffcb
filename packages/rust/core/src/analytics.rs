//! Per-day and per-month counters, their persistence, and range sums.

use std::collections::BTreeMap;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use eventgraph_shared::{DayRange, EventGraphError, Period, Result, YearMonth};

/// Counters kept per day and summed per month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Counters {
    pub events: u64,
    pub entities_resolved: u64,
    pub resolution_failures: u64,
    pub locations_geocoded: u64,
    pub geocoding_failures: u64,
    pub day_failures: u64,
    pub one_hop_facts: u64,
    pub one_hop_failures: u64,
    pub external_requests: u64,
    pub cache_hits: u64,
}

impl AddAssign for Counters {
    fn add_assign(&mut self, rhs: Self) {
        self.events += rhs.events;
        self.entities_resolved += rhs.entities_resolved;
        self.resolution_failures += rhs.resolution_failures;
        self.locations_geocoded += rhs.locations_geocoded;
        self.geocoding_failures += rhs.geocoding_failures;
        self.day_failures += rhs.day_failures;
        self.one_hop_facts += rhs.one_hop_facts;
        self.one_hop_failures += rhs.one_hop_failures;
        self.external_requests += rhs.external_requests;
        self.cache_hits += rhs.cache_hits;
    }
}

impl Add for Counters {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl Sum for Counters {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// One month's counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    pub month: YearMonth,
    /// Sum of `days` and `period_level`.
    pub total: Counters,
    /// Keyed by day of month.
    #[serde(default)]
    pub days: BTreeMap<u32, Counters>,
    /// Counts not attributable to a single day (external requests, cache hits).
    #[serde(default)]
    pub period_level: Counters,
}

impl AnalyticsRecord {
    pub fn new(month: YearMonth) -> Self {
        Self {
            month,
            total: Counters::default(),
            days: BTreeMap::new(),
            period_level: Counters::default(),
        }
    }

    pub fn record_day(&mut self, day: u32, counters: Counters) {
        *self.days.entry(day).or_default() += counters;
        self.total += counters;
    }

    pub fn record_period(&mut self, counters: Counters) {
        self.period_level += counters;
        self.total += counters;
    }

    /// Counters for `days` of this month. A range covering the whole month
    /// is the month total; otherwise only day-attributed counts are summed.
    pub fn sum_days(&self, days: Option<DayRange>) -> Counters {
        match days {
            Some(range) if !covers_month(range, self.month) => self
                .days
                .iter()
                .filter(|(day, _)| range.contains(**day))
                .map(|(_, counters)| *counters)
                .sum(),
            _ => self.total,
        }
    }
}

fn covers_month(range: DayRange, month: YearMonth) -> bool {
    range.start == 1 && range.end >= month.days_in_month()
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Accumulates monthly records and sums them over ranges.
#[derive(Debug, Default)]
pub struct AnalyticsAggregator {
    records: BTreeMap<YearMonth, AnalyticsRecord>,
}

impl AnalyticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_day(&mut self, date: NaiveDate, counters: Counters) {
        self.record_mut(YearMonth::of(date))
            .record_day(date.day(), counters);
    }

    pub fn record_period(&mut self, month: YearMonth, counters: Counters) {
        self.record_mut(month).record_period(counters);
    }

    /// Add a persisted record, merging with anything already counted.
    pub fn merge(&mut self, record: AnalyticsRecord) {
        let target = self.record_mut(record.month);
        for (day, counters) in record.days {
            target.record_day(day, counters);
        }
        target.record_period(record.period_level);
    }

    pub fn record(&self, month: YearMonth) -> Option<&AnalyticsRecord> {
        self.records.get(&month)
    }

    pub fn records(&self) -> impl Iterator<Item = &AnalyticsRecord> {
        self.records.values()
    }

    pub fn total(&self) -> Counters {
        self.records.values().map(|r| r.total).sum()
    }

    /// Counters of the dates in `[start, end]`. Months strictly inside the
    /// range count their whole total; the two boundary months count only
    /// their days in range.
    pub fn sum_range(&self, start: NaiveDate, end: NaiveDate) -> Counters {
        if start > end {
            return Counters::default();
        }
        let (first, last) = (YearMonth::of(start), YearMonth::of(end));
        self.records
            .range(first..=last)
            .map(|(month, record)| {
                let from = if *month == first { start.day() } else { 1 };
                let to = if *month == last { end.day() } else { 31 };
                DayRange::new(from, to)
                    .map(|days| record.sum_days(Some(days)))
                    .unwrap_or_default()
            })
            .sum()
    }

    /// Whole-month totals of `[start, end]`.
    pub fn sum_months(&self, start: YearMonth, end: YearMonth) -> Counters {
        if start > end {
            return Counters::default();
        }
        self.records.range(start..=end).map(|(_, r)| r.total).sum()
    }

    fn record_mut(&mut self, month: YearMonth) -> &mut AnalyticsRecord {
        self.records
            .entry(month)
            .or_insert_with(|| AnalyticsRecord::new(month))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Write `month`'s record to `{dir}/{Month_Year}_analytics.json`.
    #[instrument(skip_all, fields(dir = %dir.display(), month = %month))]
    pub fn save_month(&self, dir: &Path, month: YearMonth) -> Result<Option<PathBuf>> {
        let Some(record) = self.records.get(&month) else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir).map_err(|e| EventGraphError::io(dir, e))?;

        let path = analytics_path(dir, month);
        let temp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record).map_err(|e| {
            EventGraphError::validation(format!("analytics serialization failed: {e}"))
        })?;
        std::fs::write(&temp, json).map_err(|e| EventGraphError::io(&temp, e))?;
        std::fs::rename(&temp, &path).map_err(|e| EventGraphError::io(&path, e))?;

        info!(path = %path.display(), events = record.total.events, "analytics saved");
        Ok(Some(path))
    }

    /// Load the persisted record of `month`, if any, and merge it.
    pub fn load_month(&mut self, dir: &Path, month: YearMonth) -> Result<bool> {
        let path = analytics_path(dir, month);
        if !path.is_file() {
            debug!(path = %path.display(), "no analytics record");
            return Ok(false);
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| EventGraphError::io(&path, e))?;
        let record: AnalyticsRecord = serde_json::from_str(&raw).map_err(|e| {
            EventGraphError::parse(format!("invalid analytics file {}: {e}", path.display()))
        })?;
        self.merge(record);
        Ok(true)
    }

    /// Load every persisted month in `[start, end]`. Missing months are skipped.
    #[instrument(skip_all, fields(dir = %dir.display(), %start, %end))]
    pub fn load_range(dir: &Path, start: YearMonth, end: YearMonth) -> Result<Self> {
        let mut aggregator = Self::new();
        let mut month = start;
        let mut loaded = 0;
        while month <= end {
            if aggregator.load_month(dir, month)? {
                loaded += 1;
            }
            month = month.next();
        }
        info!(loaded, "analytics records loaded");
        Ok(aggregator)
    }
}

pub fn analytics_path(dir: &Path, month: YearMonth) -> PathBuf {
    dir.join(format!("{}_analytics.json", Period::full(month).prefix()))
}
