//! Parsing of portal day pages into raw [`Event`] records.

use chrono::{Datelike, NaiveDate};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use eventgraph_shared::{
    EntityMention, Event, EventGraphError, Result, TextFragment, Topic, YearMonth,
};

use crate::text::{InlineLink, TextCollector, char_slice};

/// Element id of the day box on a portal page, e.g. `2022_January_1`.
pub fn day_box_id(date: NaiveDate) -> String {
    format!(
        "{}_{}_{}",
        date.year(),
        YearMonth::of(date).month_name(),
        date.day()
    )
}

/// Decoded article title if `url` is a plain article under `base`
/// (no namespace such as `File:` or `Portal:`).
pub fn article_title(url: &str, base: &str) -> Option<String> {
    let url = url.split('#').next().unwrap_or(url);
    let rest = url.strip_prefix(base)?;
    if rest.is_empty() || rest.contains('?') {
        return None;
    }
    let decoded = urlencoding::decode(rest).ok()?;
    if decoded.contains(':') || decoded.contains('/') {
        return None;
    }
    Some(decoded.replace('_', " "))
}

/// Parse one day page.
///
/// Returns an error when the page has no recognizable day box; an existing
/// but empty day box yields `Ok(vec![])`.
pub fn parse_day_page(
    html: &str,
    date: NaiveDate,
    page_url: &str,
    base_url: &str,
) -> Result<Vec<Event>> {
    let page = Url::parse(page_url)
        .map_err(|e| EventGraphError::parse(format!("invalid page url {page_url}: {e}")))?;
    let doc = Html::parse_document(html);

    let day_box = find_day_box(&doc, date)
        .ok_or_else(|| EventGraphError::parse(format!("no day box for {date}")))?;

    let description_sel = Selector::parse(".description").expect("valid selector");
    let container = day_box.select(&description_sel).next().unwrap_or(day_box);

    let mut parser = DayParser {
        date,
        page: &page,
        page_url,
        base_url,
        category: None,
        topics: Vec::new(),
        topic_count: 0,
        events: Vec::new(),
    };
    parser.walk_container(container);
    Ok(parser.events)
}

fn find_day_box<'a>(doc: &'a Html, date: NaiveDate) -> Option<ElementRef<'a>> {
    let id = day_box_id(date);
    let any_sel = Selector::parse("div[id]").expect("valid selector");
    doc.select(&any_sel)
        .find(|el| el.value().attr("id") == Some(id.as_str()))
        .or_else(|| {
            let main_sel = Selector::parse(".current-events-main").expect("valid selector");
            doc.select(&main_sel).next()
        })
}

struct DayParser<'a> {
    date: NaiveDate,
    page: &'a Url,
    page_url: &'a str,
    base_url: &'a str,
    category: Option<String>,
    /// Enclosing topics of the current list item, outermost first.
    topics: Vec<Topic>,
    topic_count: usize,
    events: Vec<Event>,
}

impl DayParser<'_> {
    /// Headings set the category for the lists that follow them.
    fn walk_container(&mut self, container: ElementRef<'_>) {
        for child in container.children().filter_map(ElementRef::wrap) {
            let element = child.value();
            let is_heading = element.classes().any(|c| c == "current-events-content-heading")
                || (element.name() == "p" && element.attrs().next().is_none());
            if is_heading {
                let heading = child.text().collect::<String>();
                let heading = heading.trim();
                if !heading.is_empty() {
                    self.category = Some(heading.to_string());
                }
            } else if element.name() == "ul" {
                self.walk_list(child);
            } else if element.name() == "div" {
                self.walk_container(child);
            }
        }
    }

    /// An `<li>` with a nested list is a topic; any other `<li>` is an event.
    fn walk_list(&mut self, list: ElementRef<'_>) {
        for item in list
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "li")
        {
            let nested: Vec<ElementRef<'_>> = item
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| matches!(el.value().name(), "ul" | "ol"))
                .collect();

            if nested.is_empty() {
                self.push_event(item);
            } else {
                let collected = TextCollector::collect(self.page, item);
                let link = collected
                    .links
                    .iter()
                    .find(|l| article_title(l.href.as_str(), self.base_url).is_some())
                    .map(|l| l.href.to_string());
                self.topics.push(Topic {
                    text: collected.into_text(),
                    link,
                    index: self.topic_count,
                    raw_html: item.html(),
                });
                self.topic_count += 1;
                for sub in nested {
                    self.walk_list(sub);
                }
                self.topics.pop();
            }
        }
    }

    fn push_event(&mut self, item: ElementRef<'_>) {
        let collected = TextCollector::collect(self.page, item);
        if collected.text().is_empty() {
            return;
        }

        let article_links: Vec<&InlineLink> = collected
            .links
            .iter()
            .filter(|l| article_title(l.href.as_str(), self.base_url).is_some())
            .collect();

        let mut mentions: Vec<EntityMention> = article_links
            .iter()
            .map(|l| {
                EntityMention::linked(
                    collected.slice(l.start, l.end),
                    l.href.to_string(),
                    (l.start, l.end),
                )
            })
            .collect();
        if mentions.is_empty() {
            mentions.push(EntityMention::unlinked(collected.text()));
        }

        let fragments = split_sentences(collected.text(), &collected.links);

        self.events.push(Event {
            date: self.date,
            index: self.events.len(),
            source_url: self.page_url.to_string(),
            category: self.category.clone(),
            topics: self.topics.clone(),
            text: collected.text().to_string(),
            fragments,
            mentions,
            locations: Vec::new(),
            sources: collected.sources.clone(),
            raw_html: item.html(),
        });
    }
}

/// Split at `". "` followed by an uppercase letter, outside link labels.
fn split_sentences(text: &str, links: &[InlineLink]) -> Vec<TextFragment> {
    let chars: Vec<char> = text.chars().collect();
    let in_link = |i: usize| links.iter().any(|l| l.start <= i && i < l.end);

    let mut fragments = Vec::new();
    let mut start = 0;
    for i in 0..chars.len().saturating_sub(2) {
        if chars[i] == '.' && chars[i + 1] == ' ' && chars[i + 2].is_uppercase() && !in_link(i) {
            fragments.push(TextFragment {
                text: char_slice(text, start, i + 1),
                start,
                end: i + 1,
            });
            start = i + 2;
        }
    }
    if start < chars.len() {
        fragments.push(TextFragment {
            text: char_slice(text, start, chars.len()),
            start,
            end: chars.len(),
        });
    }
    fragments
}
