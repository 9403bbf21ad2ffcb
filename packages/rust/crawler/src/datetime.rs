//! Date and time readings of free-text infobox values such as
//! `1 – 12 January 2022`, `January 1, 2021 – present` or
//! `14:29 – 14:50 (UTC+4:00)`.

use std::sync::LazyLock;

use chrono::{FixedOffset, NaiveDate, NaiveTime};
use regex::{Captures, Regex};

/// Dates read from one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDates {
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
    /// The range runs to `present` / `ongoing`.
    pub ongoing: bool,
}

/// Times of day read from one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimes {
    pub start: NaiveTime,
    pub end: Option<NaiveTime>,
    pub offset: Option<FixedOffset>,
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const TO: &str = r"\s*(?:-|until|to)\s*";
const ONGOING: &str = r"(?P<on>[Pp]resent|[Oo]ngoing)";
const DAY: &str = r"(?P<day>\d\d?)";
const DAY2: &str = r"(?P<day2>\d\d?)";
const MONTH: &str = r"(?P<mon>\w{3,9})";
const MONTH2: &str = r"(?P<mon2>\w{3,9})";
const YEAR: &str = r"(?P<year>\d{2,4})";
const YEAR2: &str = r"(?P<year2>\d{2,4})";

/// Most specific first: two full dates, then shared-year ranges, then ongoing
/// ranges, then single dates. The first pattern yielding a valid date wins.
static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    let dm = format!(r"{DAY}\s+{MONTH}");
    let dmy = format!(r"{dm}\s+{YEAR}");
    let md = format!(r"{MONTH}\s*(?:/|\s)\s*{DAY}");
    let mdy = format!(r"{md}\s*[/,]\s*{YEAR}");

    let patterns = [
        format!(r"{mdy}{TO}{MONTH2}\s*(?:/|\s)\s*{DAY2}\s*[/,]\s*{YEAR2}"),
        format!(r"{dmy}{TO}{DAY2}\s+{MONTH2}\s+{YEAR2}"),
        format!(r"{md}{TO}{MONTH2}\s*{DAY2}\s*[/,]\s*{YEAR}"),
        format!(r"{dm}{TO}{DAY2}\s+{MONTH2}\s+{YEAR}"),
        format!(r"{md}{TO}{DAY2}\s*[/,]\s*{YEAR}"),
        format!(r"{DAY}{TO}{DAY2}\s+{MONTH}\s+{YEAR}"),
        format!(r"{mdy}{TO}{ONGOING}"),
        format!(r"{dmy}{TO}{ONGOING}"),
        mdy,
        dmy,
    ];
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
});

static TIMEZONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"UTC(?:(?P<h>[+-]\d\d?)(?::(?P<m>\d\d))?)?").expect("valid regex")
});

static TIME_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?P<hs>\d\d?):(?P<ms>\d\d)\s*
        (?:(?P<ams>[aA]\.?[mM]\.?)|(?P<pms>[pP]\.?[mM]\.?))?
        (?:
          \s*(?:-|and|to)\s*
          (?P<he>\d\d?):(?P<me>\d\d)\s*
          (?:(?P<ame>[aA]\.?[mM]\.?)|(?P<pme>[pP]\.?[mM]\.?))?
        )?",
    )
    .expect("valid regex")
});

/// En dash, em dash and minus sign read as `-`.
pub fn normalize_dashes(value: &str) -> String {
    value.replace(['\u{2013}', '\u{2212}', '\u{2014}'], "-")
}

/// Read a date, a date range or an ongoing range from `value`.
pub fn parse_dates(value: &str) -> Option<ParsedDates> {
    let value = normalize_dashes(value);
    DATE_PATTERNS
        .iter()
        .filter_map(|re| re.captures(&value))
        .find_map(|caps| dates_from(&caps))
}

fn dates_from(caps: &Captures<'_>) -> Option<ParsedDates> {
    let month = month_number(&caps["mon"])?;
    let year: i32 = caps["year"].parse().ok()?;
    let day: u32 = caps["day"].parse().ok()?;
    let start = NaiveDate::from_ymd_opt(year, month, day)?;

    let end = match caps.name("day2") {
        Some(day2) => {
            let month2 = match caps.name("mon2") {
                Some(m) => month_number(m.as_str())?,
                None => month,
            };
            let year2 = match caps.name("year2") {
                Some(y) => y.as_str().parse().ok()?,
                None => year,
            };
            Some(NaiveDate::from_ymd_opt(year2, month2, day2.as_str().parse().ok()?)?)
        }
        None => None,
    };

    Some(ParsedDates {
        start,
        end,
        ongoing: caps.name("on").is_some(),
    })
}

/// Full English month names and their first three letters (`Sept` too).
fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == name || (name.len() >= 3 && m.starts_with(name.as_str())))
        .map(|i| i as u32 + 1)
}

/// Read a time or a time range plus an optional `UTC±h[:mm]` offset.
pub fn parse_times(value: &str) -> Option<ParsedTimes> {
    let value = normalize_dashes(value);
    let caps = TIME_RANGE.captures(&value)?;

    let start = clock_time(
        &caps["hs"],
        &caps["ms"],
        caps.name("ams").is_some(),
        caps.name("pms").is_some(),
    )?;
    let end = match (caps.name("he"), caps.name("me")) {
        (Some(h), Some(m)) => Some(clock_time(
            h.as_str(),
            m.as_str(),
            caps.name("ame").is_some(),
            caps.name("pme").is_some(),
        )?),
        _ => None,
    };

    Some(ParsedTimes {
        start,
        end,
        offset: utc_offset(&value),
    })
}

fn clock_time(hours: &str, minutes: &str, am: bool, pm: bool) -> Option<NaiveTime> {
    let mut hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if pm && hours < 12 {
        hours += 12;
    } else if am && hours == 12 {
        hours = 0;
    }
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

fn utc_offset(value: &str) -> Option<FixedOffset> {
    let caps = TIMEZONE.captures(value)?;
    let Some(hours) = caps.name("h") else {
        return FixedOffset::east_opt(0);
    };
    let hours: i32 = hours.as_str().parse().ok()?;
    let minutes: i32 = match caps.name("m") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    let seconds = hours.abs() * 3600 + minutes * 60;
    FixedOffset::east_opt(if hours < 0 { -seconds } else { seconds })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).expect("time")
    }

    #[test]
    fn single_dates_both_orders() {
        let mdy = parse_dates("January 1, 2021").expect("mdy");
        assert_eq!(mdy.start, date(2021, 1, 1));
        assert_eq!(mdy.end, None);
        assert!(!mdy.ongoing);

        let dmy = parse_dates("Tanami Desert\n27 June 2021").expect("dmy");
        assert_eq!(dmy.start, date(2021, 6, 27));
    }

    #[test]
    fn ranges_sharing_month_or_year() {
        let r = parse_dates("January 1 – 12, 2021").expect("mddy");
        assert_eq!((r.start, r.end), (date(2021, 1, 1), Some(date(2021, 1, 12))));

        let r = parse_dates("1 – 2 January 2021").expect("ddmy");
        assert_eq!((r.start, r.end), (date(2021, 1, 1), Some(date(2021, 1, 2))));

        let r = parse_dates("January 1 - February 12, 2021").expect("mdmdy");
        assert_eq!(r.end, Some(date(2021, 2, 12)));

        let r = parse_dates("1 January - 12 February 2022").expect("dmdmy");
        assert_eq!((r.start, r.end), (date(2022, 1, 1), Some(date(2022, 2, 12))));
    }

    #[test]
    fn ranges_across_years() {
        let r = parse_dates("December 30, 2021-January 1, 2022").expect("mdymdy");
        assert_eq!((r.start, r.end), (date(2021, 12, 30), Some(date(2022, 1, 1))));

        let r = parse_dates("1 January 2021 - 12 February 2022").expect("dmydmy");
        assert_eq!(r.end, Some(date(2022, 2, 12)));
    }

    #[test]
    fn ongoing_ranges() {
        let r = parse_dates("17 November 2019 – present\n(2 years and 6 months)").expect("on");
        assert_eq!(r.start, date(2019, 11, 17));
        assert!(r.ongoing);
        assert_eq!(r.end, None);

        assert!(parse_dates("January 1, 2021 - ongoing").expect("on").ongoing);
    }

    #[test]
    fn invalid_month_or_day_is_no_date() {
        assert_eq!(parse_dates("31 February 2022"), None);
        assert_eq!(parse_dates("Route 66, 1926"), None);
        assert_eq!(parse_dates("no date here"), None);
    }

    #[test]
    fn twelve_hour_times_and_offsets() {
        let t = parse_times("January 15, 2022\n10:41 a.m. – 9:22 p.m. (CST)").expect("times");
        assert_eq!(t.start, time(10, 41));
        assert_eq!(t.end, Some(time(21, 22)));
        assert_eq!(t.offset, None);

        let t = parse_times("14:29 – 14:50 (UTC+4:00)").expect("times");
        assert_eq!((t.start, t.end), (time(14, 29), Some(time(14, 50))));
        assert_eq!(t.offset.map(|o| o.to_string()).as_deref(), Some("+04:00"));

        let t = parse_times("About 1:00 a.m. (local time, UTC+3)").expect("times");
        assert_eq!(t.start, time(1, 0));
        assert_eq!(t.offset, FixedOffset::east_opt(3 * 3600));

        let t = parse_times("12:30 p.m. UTC-5").expect("times");
        assert_eq!(t.start, time(12, 30));
        assert_eq!(t.offset, FixedOffset::west_opt(5 * 3600));
    }

    #[test]
    fn no_time_without_clock_value() {
        assert_eq!(parse_times("2 January 2022"), None);
    }
}
