//! Portal crawler: fetches day pages, parses events and classifies the
//! places they mention.
//!
//! Days of a period are crawled concurrently; every HTTP request goes
//! through the portal [`ServiceClient`] and is therefore cached and
//! rate limited. A day that cannot be fetched or parsed becomes a
//! [`DayFailure`] and never affects other days.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

use eventgraph_shared::{
    Article, EntityMention, Event, LocationMention, Period, PortalConfig, article_key,
};

use crate::client::ServiceClient;
use crate::infobox::{ArticleInfo, inspect_article};
use crate::portal::{article_title, day_box_id, parse_day_page};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A day page that could not be fetched or parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{date}: {reason}")]
pub struct DayFailure {
    pub date: NaiveDate,
    pub reason: String,
}

/// Events of one day plus the article pages they link to.
#[derive(Debug, Clone, Default)]
pub struct DayPage {
    pub events: Vec<Event>,
    /// Inspected articles keyed by [`article_key`].
    pub articles: BTreeMap<String, Article>,
}

/// Outcome of crawling one day.
#[derive(Debug, Clone)]
pub struct DayOutcome {
    pub date: NaiveDate,
    pub result: std::result::Result<DayPage, DayFailure>,
}

// ---------------------------------------------------------------------------
// PortalCrawler
// ---------------------------------------------------------------------------

/// Crawls portal day pages into raw events.
pub struct PortalCrawler {
    client: Arc<ServiceClient>,
    base_url: String,
    classify_locations: bool,
}

impl PortalCrawler {
    /// The client's endpoint is the wiki root.
    pub fn new(client: Arc<ServiceClient>, config: &PortalConfig) -> Self {
        Self {
            base_url: client.endpoint().to_string(),
            client,
            classify_locations: config.classify_locations,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base}Portal:Current_events/2022_January_1`.
    pub fn day_url(&self, date: NaiveDate) -> String {
        format!("{}Portal:Current_events/{}", self.base_url, day_box_id(date))
    }

    /// Crawl every day of `period` concurrently. Outcomes are sorted by date.
    #[instrument(skip_all, fields(period = %period))]
    pub async fn crawl_period(self: &Arc<Self>, period: &Period) -> Vec<DayOutcome> {
        let dates = period.dates();
        let mut tasks = JoinSet::new();
        for date in dates.iter().copied() {
            let crawler = Arc::clone(self);
            tasks.spawn(async move {
                let result = crawler.crawl_day(date).await;
                DayOutcome { date, result }
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "day task panicked or was cancelled"),
            }
        }
        fill_missing_days(&dates, &mut outcomes);

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        info!(days = outcomes.len(), failed, "period crawled");
        outcomes
    }

    /// Fetch and parse one day page, then classify linked articles as places.
    #[instrument(skip_all, fields(day = %date))]
    pub async fn crawl_day(&self, date: NaiveDate) -> std::result::Result<DayPage, DayFailure> {
        let url = self.day_url(date);
        let html = self
            .client
            .fetch_cached(&url, |c| c.get(&url))
            .await
            .map_err(|e| {
                warn!(day = %date, error = %e, "day page fetch failed");
                DayFailure {
                    date,
                    reason: e.to_string(),
                }
            })?;

        let mut events = parse_day_page(&html, date, &url, &self.base_url).map_err(|e| {
            warn!(day = %date, error = %e, "day page parse failed");
            DayFailure {
                date,
                reason: e.to_string(),
            }
        })?;

        let mut page = DayPage::default();
        if self.classify_locations && !events.is_empty() {
            let infos = self.inspect_linked_articles(&events).await;
            for event in &mut events {
                attach_locations(event, &infos, &self.base_url);
            }
            page.articles = infos
                .into_iter()
                .map(|(key, info)| (key, info.article))
                .collect();
        }

        debug!(day = %date, events = events.len(), articles = page.articles.len(), "day parsed");
        page.events = events;
        Ok(page)
    }

    /// Fetch each distinct article linked from a mention or a topic once.
    async fn inspect_linked_articles(&self, events: &[Event]) -> HashMap<String, ArticleInfo> {
        let mention_links = events
            .iter()
            .flat_map(|e| e.mentions.iter())
            .filter_map(|m| m.link.as_deref());
        let topic_links = events
            .iter()
            .flat_map(|e| e.topics.iter())
            .filter_map(|t| t.link.as_deref());
        let keys: BTreeSet<&str> = mention_links.chain(topic_links).map(article_key).collect();

        let mut articles = HashMap::new();
        for key in keys {
            let Ok(page_url) = Url::parse(key) else {
                continue;
            };
            match self.client.fetch_cached(key, |c| c.get(key)).await {
                Ok(html) => {
                    let info = inspect_article(&html, &page_url, &self.base_url);
                    articles.insert(key.to_string(), info);
                }
                Err(e) => {
                    // The mention stays an entity mention; only place detection is lost.
                    warn!(link = key, error = %e, "article fetch failed");
                }
            }
        }
        articles
    }
}

/// Give every date without an outcome (its task panicked or was cancelled)
/// a failed one, then order by date.
fn fill_missing_days(dates: &[NaiveDate], outcomes: &mut Vec<DayOutcome>) {
    let present: HashSet<NaiveDate> = outcomes.iter().map(|o| o.date).collect();
    for &date in dates {
        if !present.contains(&date) {
            outcomes.push(DayOutcome {
                date,
                result: Err(DayFailure {
                    date,
                    reason: "day task aborted".into(),
                }),
            });
        }
    }
    outcomes.sort_by_key(|o| o.date);
}

/// Turn infobox findings into location mentions (deduplicated by place key).
fn attach_locations(event: &mut Event, articles: &HashMap<String, ArticleInfo>, base_url: &str) {
    let mut seen: HashSet<String> = event.locations.iter().map(|l| l.key()).collect();
    let mut extra_mentions = Vec::new();

    for mention in &event.mentions {
        let Some(link) = mention.link.as_deref() else {
            continue;
        };
        let Some(info) = articles.get(article_key(link)) else {
            continue;
        };

        if info.article.is_place {
            let name = article_title(link, base_url).unwrap_or_else(|| mention.text.clone());
            let location = LocationMention::new(name, None, Some(link.to_string()));
            if seen.insert(location.key()) {
                event.locations.push(location);
            }
        }
        for place in &info.located_in {
            let location = LocationMention::new(
                place.name.clone(),
                place.area_hint.clone(),
                Some(place.link.clone()),
            );
            if seen.insert(location.key()) {
                event.locations.push(location);
            }
        }
        if let Some(text) = &info.unlinked_location {
            if !extra_mentions.iter().any(|m: &EntityMention| &m.text == text) {
                extra_mentions.push(EntityMention::unlinked(text.clone()));
            }
        }
    }

    event.mentions.extend(extra_mentions);
}
