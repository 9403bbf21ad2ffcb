//! Infobox inspection of linked article pages.
//!
//! Decides whether an article describes a place, reads its coordinates and
//! labelled infobox rows (dates and times typed), and extracts the places
//! listed in `Location` / `Areas affected` rows of event articles.

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use eventgraph_shared::{
    Article, Coordinate, DateSpan, InfoboxRow, InfoboxValue, TimeSpan, normalize_whitespace,
};

use crate::datetime::{parse_dates, parse_times};
use crate::portal::article_title;
use crate::text::TextCollector;

/// Infobox classes that mark an article as describing a place.
pub const PLACE_INFOBOX_CLASSES: [&str; 6] = [
    "ib-settlement",
    "ib-country",
    "ib-islands",
    "ib-pol-div",
    "ib-school-district",
    "ib-uk-place",
];

/// Infobox row labels listing where an event happened.
const LOCATION_ROW_LABELS: [&str; 2] = ["Location", "Areas affected"];

/// Rows whose value starts a date range.
const DATE_ROW_LABELS: [&str; 5] = [
    "Date",
    "Date(s)",
    "First outbreak",
    "Arrival Date",
    "Start Date",
];

/// Rows whose single date is an end date.
const END_DATE_ROW_LABELS: [&str; 2] = ["End Date", "Duration"];

const TIME_ROW_LABELS: [&str; 1] = ["Time"];

/// A place linked from a location row.
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedPlace {
    pub name: String,
    pub link: String,
    /// Row text following the link, e.g. `Kazakhstan` for `Almaty, Kazakhstan`.
    pub area_hint: Option<String>,
}

/// What an article page says: the shared [`Article`] record plus the places
/// its location row names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleInfo {
    pub article: Article,
    pub located_in: Vec<LocatedPlace>,
    /// Location row text with no article links.
    pub unlinked_location: Option<String>,
}

/// Inspect an article page: coordinates anywhere on the page, everything
/// else from the first infobox.
pub fn inspect_article(html: &str, page_url: &Url, base_url: &str) -> ArticleInfo {
    let doc = Html::parse_document(html);
    let mut url = page_url.clone();
    url.set_fragment(None);

    let mut info = ArticleInfo {
        article: Article {
            url: url.to_string(),
            coordinates: coordinates(&doc),
            ..Article::default()
        },
        ..ArticleInfo::default()
    };

    let table_sel = Selector::parse("table.infobox").expect("valid selector");
    let Some(table) = doc.select(&table_sel).next() else {
        return info;
    };

    let classes: Vec<&str> = table.value().classes().collect();
    info.article.is_place = classes.iter().any(|c| PLACE_INFOBOX_CLASSES.contains(c));
    info.article.infobox_html = Some(table.html());
    if classes.contains(&"vevent") {
        info.article.dtstart = microformat_date(table, "span.dtstart");
        info.article.dtend = microformat_date(table, "span.dtend");
    }

    let row_sel = Selector::parse("tr").expect("valid selector");
    let th_sel = Selector::parse("th").expect("valid selector");
    let td_sel = Selector::parse("td").expect("valid selector");

    let mut location_seen = false;
    for row in table.select(&row_sel) {
        let Some(label) = row.select(&th_sel).next() else {
            continue;
        };
        let Some(cell) = row.select(&td_sel).next() else {
            continue;
        };
        let label = normalize_whitespace(&label.text().collect::<String>());
        if label.is_empty() {
            continue;
        }

        let collected = TextCollector::collect(page_url, cell);
        let value = collected.text().to_string();
        let links: Vec<_> = collected
            .links
            .iter()
            .filter(|l| article_title(l.href.as_str(), base_url).is_some())
            .collect();

        let label_str = label.as_str();
        let kind = if LOCATION_ROW_LABELS.contains(&label_str) {
            if !location_seen {
                location_seen = true;
                let total = value.chars().count();
                if links.is_empty() {
                    if !value.is_empty() {
                        info.unlinked_location = Some(value.clone());
                    }
                } else {
                    info.located_in.extend(links.iter().map(|l| LocatedPlace {
                        name: collected.slice(l.start, l.end),
                        link: l.href.to_string(),
                        area_hint: area_hint(&collected.slice(l.end, total)),
                    }));
                }
            }
            InfoboxValue::Location
        } else if DATE_ROW_LABELS.contains(&label_str) {
            date_value(&value, false)
        } else if END_DATE_ROW_LABELS.contains(&label_str) {
            date_value(&value, true)
        } else if TIME_ROW_LABELS.contains(&label_str) {
            time_value(&value)
        } else {
            InfoboxValue::Plain
        };

        info.article.rows.push(InfoboxRow {
            label,
            links: links.iter().map(|l| l.href.to_string()).collect(),
            value,
            kind,
        });
    }

    info
}

/// Type a date row. A single time on a single day refines that day; an end
/// row's single date becomes the end of the span.
fn date_value(value: &str, ending: bool) -> InfoboxValue {
    if value.contains("As of") {
        return InfoboxValue::Plain;
    }
    let Some(dates) = parse_dates(value) else {
        return InfoboxValue::Plain;
    };

    let mut span = DateSpan {
        start: dates.start.and_hms_opt(0, 0, 0),
        end: dates.end.and_then(|d| d.and_hms_opt(0, 0, 0)),
        ongoing: dates.ongoing,
        timezone: None,
    };

    if dates.end.is_none() && !dates.ongoing {
        if let Some(times) = parse_times(value) {
            span.start = Some(dates.start.and_time(times.start));
            span.end = times.end.map(|t| dates.start.and_time(t));
            span.timezone = times.offset.map(|o| o.to_string());
        }
    }

    if ending && span.end.is_none() && !span.ongoing {
        span.end = span.start.take();
    }
    InfoboxValue::Date(span)
}

fn time_value(value: &str) -> InfoboxValue {
    match parse_times(value) {
        Some(times) => InfoboxValue::Time(TimeSpan {
            start: times.start,
            end: times.end,
            timezone: times.offset.map(|o| o.to_string()),
        }),
        None => InfoboxValue::Plain,
    }
}

/// `2022-01-02` (optionally followed by a time) from an hCalendar span.
fn microformat_date(table: ElementRef<'_>, selector: &str) -> Option<NaiveDate> {
    let sel = Selector::parse(selector).ok()?;
    let text: String = table.select(&sel).next()?.text().collect();
    let day = text.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Page coordinates from the `#coordinates` degree-minute-second display.
fn coordinates(doc: &Html) -> Option<Coordinate> {
    let lat_sel = Selector::parse("#coordinates .geo-dms .latitude").expect("valid selector");
    let lon_sel = Selector::parse("#coordinates .geo-dms .longitude").expect("valid selector");
    let lat: String = doc.select(&lat_sel).next()?.text().collect();
    let lon: String = doc.select(&lon_sel).next()?.text().collect();
    Some(Coordinate {
        lat: dms_to_decimal(&lat)?,
        lon: dms_to_decimal(&lon)?,
    })
}

/// `43°15′N` / `76°57′00″E` to signed decimal degrees.
fn dms_to_decimal(dms: &str) -> Option<f64> {
    let dms = dms.trim();
    let hemisphere = dms.chars().last()?;
    let negative = matches!(hemisphere, 'S' | 'W');
    let numbers = dms.trim_end_matches(['N', 'S', 'E', 'W']);

    let parts: Vec<f64> = numbers
        .split(['°', '′', '″', '\'', '"'])
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::parse)
        .collect::<Result<_, _>>()
        .ok()?;
    let (degrees, rest) = parts.split_first()?;
    let minutes = rest.first().copied().unwrap_or(0.0);
    let seconds = rest.get(1).copied().unwrap_or(0.0);

    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    Some(if negative { -value } else { value })
}

/// `", Almaty Region; other"` -> `Almaty Region`.
fn area_hint(rest: &str) -> Option<String> {
    let hint = rest
        .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
        .split([';', '('])
        .next()
        .unwrap_or("")
        .trim()
        .trim_end_matches(['.', ',']);
    (!hint.is_empty()).then(|| hint.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    const BASE: &str = "https://en.wikipedia.org/wiki/";

    fn page() -> Url {
        Url::parse("https://en.wikipedia.org/wiki/Some_article").expect("url")
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Option<chrono::NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(h, min, 0))
    }

    fn row<'a>(info: &'a ArticleInfo, label: &str) -> &'a InfoboxRow {
        info.article
            .rows
            .iter()
            .find(|r| r.label == label)
            .expect("row present")
    }

    #[test]
    fn settlement_infobox_is_a_place() {
        let html = r#"<table class="infobox ib-settlement vcard"><tr><th>Country</th>
            <td><a href="/wiki/Kazakhstan">Kazakhstan</a></td></tr></table>"#;
        let info = inspect_article(html, &page(), BASE);
        assert!(info.article.is_place);
        assert!(info.located_in.is_empty());

        let country = row(&info, "Country");
        assert_eq!(country.value, "Kazakhstan");
        assert_eq!(country.links, vec!["https://en.wikipedia.org/wiki/Kazakhstan"]);
        assert_eq!(country.kind, InfoboxValue::Plain);
        assert!(info.article.infobox_html.as_deref().is_some_and(|h| h.starts_with("<table")));
    }

    #[test]
    fn location_row_yields_places_with_hints() {
        let html = r#"<table class="infobox vevent">
            <tr><th>Date</th><td>2 January 2022</td></tr>
            <tr><th scope="row">Location</th>
              <td><a href="/wiki/Almaty">Almaty</a>, <a href="/wiki/Kazakhstan">Kazakhstan</a>
              <sup>[2]</sup></td></tr>
            </table>"#;
        let info = inspect_article(html, &page(), BASE);
        assert!(!info.article.is_place);
        assert_eq!(info.located_in.len(), 2);
        assert_eq!(info.located_in[0].name, "Almaty");
        assert_eq!(info.located_in[0].area_hint.as_deref(), Some("Kazakhstan"));
        assert_eq!(info.located_in[1].name, "Kazakhstan");
        assert_eq!(info.located_in[1].area_hint, None);
        assert_eq!(row(&info, "Location").kind, InfoboxValue::Location);
    }

    #[test]
    fn unlinked_areas_affected_row() {
        let html = r#"<table class="infobox"><tr><th>Areas affected</th>
            <td>Southern coast of Tonga</td></tr></table>"#;
        let info = inspect_article(html, &page(), BASE);
        assert!(info.located_in.is_empty());
        assert_eq!(info.unlinked_location.as_deref(), Some("Southern coast of Tonga"));
    }

    #[test]
    fn article_without_infobox() {
        let info = inspect_article("<p>Plain article</p>", &page(), BASE);
        assert_eq!(info.article.url, "https://en.wikipedia.org/wiki/Some_article");
        assert!(!info.article.is_place);
        assert!(info.article.rows.is_empty());
        assert_eq!(info.article.infobox_html, None);
        assert!(info.located_in.is_empty());
    }

    #[test]
    fn date_rows_are_typed() {
        let html = r#"<table class="infobox vevent">
            <tr><th>Date</th><td>January 15, 2022 10:41 a.m. – 9:22 p.m. (UTC+3)</td></tr>
            <tr><th>Date(s)</th><td>2 January 2022 – present</td></tr>
            <tr><th>End Date</th><td>11 January 2022</td></tr>
            <tr><th>Time</th><td>14:29 – 14:50</td></tr>
            </table>"#;
        let info = inspect_article(html, &page(), BASE);

        let InfoboxValue::Date(day) = &row(&info, "Date").kind else {
            panic!("date row not typed");
        };
        assert_eq!(day.start, at(2022, 1, 15, 10, 41));
        assert_eq!(day.end, at(2022, 1, 15, 21, 22));
        assert_eq!(day.timezone.as_deref(), Some("+03:00"));

        let InfoboxValue::Date(range) = &row(&info, "Date(s)").kind else {
            panic!("date(s) row not typed");
        };
        assert!(range.ongoing);
        assert_eq!(range.start, at(2022, 1, 2, 0, 0));

        let InfoboxValue::Date(end) = &row(&info, "End Date").kind else {
            panic!("end date row not typed");
        };
        assert_eq!(end.start, None);
        assert_eq!(end.end, at(2022, 1, 11, 0, 0));

        let InfoboxValue::Time(time) = &row(&info, "Time").kind else {
            panic!("time row not typed");
        };
        assert_eq!(time.start, NaiveTime::from_hms_opt(14, 29, 0).expect("time"));
        assert_eq!(date_value("As of 5 January 2022", false), InfoboxValue::Plain);
    }

    #[test]
    fn microformats_only_on_vevent() {
        let html = r#"<table class="infobox vevent"><tr><th>Date</th><td>
            <span class="dtstart">2022-01-02</span> – <span class="dtend">2022-01-11T00:00</span>
            </td></tr></table>"#;
        let info = inspect_article(html, &page(), BASE);
        assert_eq!(info.article.dtstart, NaiveDate::from_ymd_opt(2022, 1, 2));
        assert_eq!(info.article.dtend, NaiveDate::from_ymd_opt(2022, 1, 11));

        let plain = html.replace("infobox vevent", "infobox");
        let info = inspect_article(&plain, &page(), BASE);
        assert_eq!(info.article.dtstart, None);
    }

    #[test]
    fn coordinates_from_dms() {
        let html = r#"<span id="coordinates"><span class="geo-dms">
            <span class="latitude">43°15′N</span> <span class="longitude">76°55′30″W</span>
            </span></span>"#;
        let info = inspect_article(html, &page(), BASE);
        let coords = info.article.coordinates.expect("coordinates");
        assert!((coords.lat - 43.25).abs() < 1e-9);
        assert!((coords.lon + 76.925).abs() < 1e-9);
    }
}
