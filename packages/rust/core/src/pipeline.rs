//! End-to-end run: periods, crawl, resolve and geocode, one-hop, assemble,
//! artifacts.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use tracing::{info, instrument, warn};

use eventgraph_artifacts::{ArtifactMeta, documents_exist, write_documents};
use eventgraph_crawler::PortalCrawler;
use eventgraph_shared::{
    AppConfig, DayRange, EntityReference, Event, EventGraphError, Period, Result, RunId,
    YearMonth,
};
use eventgraph_storage::CacheStore;

use crate::analytics::{AnalyticsAggregator, Counters};
use crate::assembler::{GraphAssembler, PeriodData};
use crate::geocoding::GeocodingEnricher;
use crate::onehop::{Expansion, OneHopExpander, osm_refs};
use crate::resolver::EntityResolver;
use crate::services::Services;

/// Parameters of one invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub start: YearMonth,
    pub end: YearMonth,
    /// Day sub-range applied to every month of the span.
    pub days: Option<DayRange>,
    /// Report the range total only; do not persist monthly analytics.
    pub custom_analytics: bool,
    /// Re-parse periods whose artifacts already exist.
    pub force: bool,
}

impl RunConfig {
    pub fn months(start: YearMonth, end: YearMonth) -> Self {
        Self {
            start,
            end,
            days: None,
            custom_analytics: false,
            force: false,
        }
    }

    /// One period per month in `[start, end]`. A day range of 1..=31 is the
    /// whole month.
    pub fn periods(&self) -> Result<Vec<Period>> {
        if self.start > self.end {
            return Err(EventGraphError::validation(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        let mut periods = Vec::new();
        let mut month = self.start;
        loop {
            let period = match self.days {
                Some(days) if !(days.start == 1 && days.end == 31) => Period::partial(month, days),
                _ => Period::full(month),
            };
            periods.push(period);
            if month == self.end {
                break;
            }
            month = month.next();
        }
        Ok(periods)
    }
}

/// What happened to one period.
#[derive(Debug)]
pub enum PeriodStatus {
    Written { artifacts: Vec<ArtifactMeta> },
    /// Artifacts already existed.
    Skipped,
    Failed { reason: String },
}

#[derive(Debug)]
pub struct PeriodOutcome {
    pub period: Period,
    pub status: PeriodStatus,
    pub counters: Counters,
}

/// Result of [`run`].
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: RunId,
    pub outcomes: Vec<PeriodOutcome>,
    /// Counters summed over every period of the run.
    pub total: Counters,
    pub elapsed: Duration,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called before a period is processed or skipped.
    fn period_started(&self, period: &Period, current: usize, total: usize);
    /// Called once per crawled day.
    fn day_done(&self, date: NaiveDate, events: usize, failed: bool);
    /// Called when the run completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn period_started(&self, _period: &Period, _current: usize, _total: usize) {}
    fn day_done(&self, _date: NaiveDate, _events: usize, _failed: bool) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Open the cache, build every stage and run.
pub async fn run(
    config: &AppConfig,
    run_config: &RunConfig,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    let controller = RunController::open(config).await?;
    controller.run(run_config, progress).await
}

// ---------------------------------------------------------------------------
// RunController
// ---------------------------------------------------------------------------

/// Drives periods through every stage. Holds the shared cache and clients.
pub struct RunController {
    config: AppConfig,
    services: Services,
    crawler: Arc<PortalCrawler>,
    resolver: Arc<EntityResolver>,
    geocoder: Arc<GeocodingEnricher>,
    expander: Arc<OneHopExpander>,
    assembler: GraphAssembler,
}

impl RunController {
    /// Validate `config` and open the cache. Both failures are fatal.
    #[instrument(skip_all, fields(cache = %config.output.cache_path.display()))]
    pub async fn open(config: &AppConfig) -> Result<Self> {
        config.validate()?;
        let cache = Arc::new(CacheStore::open(&config.output.cache_path).await?);
        let services = Services::new(config, cache)?;

        let crawler = Arc::new(PortalCrawler::new(Arc::clone(&services.portal), &config.portal));
        let resolver = Arc::new(EntityResolver::new(
            Arc::clone(&services.kb_lookup),
            Arc::clone(&services.disambiguation),
            config.services.portal.endpoint.clone(),
        ));
        let geocoder = Arc::new(GeocodingEnricher::new(Arc::clone(&services.geocoding)));
        let expander = Arc::new(OneHopExpander::new(
            Arc::clone(&services.one_hop),
            config.one_hop_limit,
        ));

        Ok(Self {
            config: config.clone(),
            services,
            crawler,
            resolver,
            geocoder,
            expander,
            assembler: GraphAssembler::new(config.output.uri_base.clone()),
        })
    }

    /// Process every period of `run_config` in order. Only an invalid range
    /// is an error; per-period failures are reported in the summary.
    #[instrument(skip_all, fields(start = %run_config.start, end = %run_config.end))]
    pub async fn run(
        &self,
        run_config: &RunConfig,
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let run_id = RunId::new();
        let periods = run_config.periods()?;

        info!(%run_id, periods = periods.len(), force = run_config.force, "starting run");

        let dataset_dir = &self.config.output.dataset_dir;
        let analytics_dir = &self.config.output.analytics_dir;
        let mut analytics = AnalyticsAggregator::new();
        let mut outcomes = Vec::with_capacity(periods.len());

        for (i, period) in periods.iter().enumerate() {
            progress.period_started(period, i + 1, periods.len());
            let prefix = period.prefix();

            if !run_config.force && documents_exist(dataset_dir, &prefix) {
                info!(%period, "artifacts exist, skipping");
                if let Err(e) = analytics.load_month(analytics_dir, period.month) {
                    warn!(%period, error = %e, "could not load analytics of skipped period");
                }
                let counters = analytics
                    .record(period.month)
                    .map(|r| r.sum_days(period.days))
                    .unwrap_or_default();
                outcomes.push(PeriodOutcome {
                    period: *period,
                    status: PeriodStatus::Skipped,
                    counters,
                });
                continue;
            }

            let before = self.services.stats();
            let processed = self.process_period(period, progress).await;
            let after = self.services.stats();
            let traffic = Counters {
                external_requests: after.requests - before.requests,
                cache_hits: after.cache_hits - before.cache_hits,
                ..Counters::default()
            };

            let (status, day_counters) = match processed {
                Ok((artifacts, days)) => (PeriodStatus::Written { artifacts }, days),
                Err((reason, days)) => {
                    warn!(%period, %reason, "period failed");
                    (PeriodStatus::Failed { reason }, days)
                }
            };

            let mut counters = traffic;
            for (date, day) in &day_counters {
                analytics.record_day(*date, *day);
                counters += *day;
            }
            analytics.record_period(period.month, traffic);

            let written = matches!(status, PeriodStatus::Written { .. });
            if written && period.is_full_month() && !run_config.custom_analytics {
                if let Err(e) = analytics.save_month(analytics_dir, period.month) {
                    warn!(%period, error = %e, "failed to save analytics");
                }
            }

            outcomes.push(PeriodOutcome {
                period: *period,
                status,
                counters,
            });
        }

        let summary = RunSummary {
            run_id,
            total: outcomes.iter().map(|o| o.counters).sum(),
            outcomes,
            elapsed: started.elapsed(),
        };
        progress.done(&summary);

        info!(
            %run_id,
            events = summary.total.events,
            day_failures = summary.total.day_failures,
            requests = summary.total.external_requests,
            cache_hits = summary.total.cache_hits,
            elapsed_ms = summary.elapsed.as_millis(),
            "run complete"
        );
        Ok(summary)
    }

    /// Crawl, enrich, assemble and write one period. Day counters are
    /// returned even when writing fails.
    #[instrument(skip_all, fields(period = %period))]
    async fn process_period(
        &self,
        period: &Period,
        progress: &dyn ProgressReporter,
    ) -> std::result::Result<
        (Vec<ArtifactMeta>, BTreeMap<NaiveDate, Counters>),
        (String, BTreeMap<NaiveDate, Counters>),
    > {
        // --- Crawl ---
        progress.phase(&format!("Crawling {period}"));
        let mut data = PeriodData::default();
        let mut failed_days: BTreeSet<NaiveDate> = BTreeSet::new();
        for outcome in self.crawler.crawl_period(period).await {
            match outcome.result {
                Ok(page) => {
                    progress.day_done(outcome.date, page.events.len(), false);
                    data.events.extend(page.events);
                    data.articles.extend(page.articles);
                }
                Err(failure) => {
                    progress.day_done(outcome.date, 0, true);
                    info!(day = %failure.date, reason = %failure.reason, "day skipped");
                    failed_days.insert(outcome.date);
                }
            }
        }

        // --- Enrich ---
        progress.phase("Resolving entities");
        self.resolver.resolve_events(&mut data.events).await;
        self.resolver.resolve_articles(&mut data.articles).await;

        progress.phase("Geocoding locations");
        self.geocoder.geocode_events(&mut data.events).await;

        progress.phase("Expanding one-hop neighbourhoods");
        let entities: Vec<EntityReference> = data
            .events
            .iter()
            .flat_map(Event::resolved_entities)
            .chain(data.articles.values().filter_map(|a| a.entity.as_ref()))
            .cloned()
            .collect();
        let expansion = self.expander.expand_all(&entities).await;
        let days = tally_days(period, &data.events, &failed_days, &expansion);
        data.facts = expansion.facts;

        let class_ids: BTreeSet<String> =
            data.events.iter().flat_map(|e| data.event_types(e)).collect();
        data.class_labels = self.expander.labels(class_ids).await;

        let refs: BTreeSet<(String, u64)> = data
            .articles
            .values()
            .filter_map(|a| a.entity.as_ref())
            .flat_map(|entity| osm_refs(data.entity_facts(entity), &entity.uri()))
            .collect();
        data.osm_elements = self.geocoder.lookup_osm_all(refs).await;

        // --- Assemble ---
        progress.phase("Assembling graphs");
        let prefix = period.prefix();
        let documents = self.assembler.assemble(&prefix, &data);

        match write_documents(&self.config.output.dataset_dir, &prefix, &documents) {
            Ok(artifacts) => Ok((artifacts, days)),
            Err(e) => Err((e.to_string(), days)),
        }
    }
}

/// Per-day counters for `period`. One-hop counts go to the first day an
/// entity is mentioned.
fn tally_days(
    period: &Period,
    events: &[Event],
    failed_days: &BTreeSet<NaiveDate>,
    expansion: &Expansion,
) -> BTreeMap<NaiveDate, Counters> {
    let mut days: BTreeMap<NaiveDate, Counters> = period
        .dates()
        .into_iter()
        .map(|date| (date, Counters::default()))
        .collect();

    for date in failed_days {
        days.entry(*date).or_default().day_failures += 1;
    }

    let mut first_seen: BTreeMap<&str, NaiveDate> = BTreeMap::new();
    for event in events {
        let day = days.entry(event.date).or_default();
        day.events += 1;
        for mention in &event.mentions {
            if mention.entity.is_some() {
                day.entities_resolved += 1;
            } else {
                day.resolution_failures += 1;
            }
        }
        for location in &event.locations {
            if location.location.is_some() {
                day.locations_geocoded += 1;
            } else {
                day.geocoding_failures += 1;
            }
        }
        for entity in event.resolved_entities() {
            first_seen
                .entry(entity.id.as_str())
                .and_modify(|d| *d = (*d).min(event.date))
                .or_insert(event.date);
        }
    }

    for (id, date) in first_seen {
        let day = days.entry(date).or_default();
        if let Some(facts) = expansion.facts.get(id) {
            day.one_hop_facts += facts.len() as u64;
        }
        if expansion.failed.contains(id) {
            day.one_hop_failures += 1;
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use eventgraph_shared::GraphType;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn month(m: u32) -> YearMonth {
        YearMonth::new(2022, m).expect("month")
    }

    fn day_page(id: &str, body: &str) -> String {
        format!(
            r#"<html><body><div class="current-events-main" id="{id}">
            <div class="current-events-content description">{body}</div></div></body></html>"#
        )
    }

    fn settlement() -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(
            r#"<table class="infobox ib-settlement"><tr><th>Country</th><td>Y</td></tr></table>"#,
        )
    }

    fn test_root() -> PathBuf {
        std::env::temp_dir().join(format!("eg_run_{}", Uuid::now_v7()))
    }

    fn test_config(server: &MockServer, root: &Path) -> AppConfig {
        let mut config = AppConfig::default().with_all_endpoints(&server.uri());
        let services = &mut config.services;
        for service in [
            &mut services.portal,
            &mut services.kb_lookup,
            &mut services.disambiguation,
            &mut services.one_hop,
            &mut services.geocoding,
        ] {
            service.request_spacing_ms = 0;
            service.max_retries = 0;
            service.concurrency = 4;
            service.timeout_secs = 5;
        }
        config.output.dataset_dir = root.join("dataset");
        config.output.analytics_dir = root.join("analytics");
        config.output.cache_path = root.join("cache").join("eventgraph.db");
        config.output.uri_base = "https://data.example.org/events/".into();
        config
    }

    /// Day 1: Entity-A visits City-X. Day 2: no page.
    async fn january_server() -> MockServer {
        let server = MockServer::start().await;
        let page = day_page(
            "2022_January_1",
            r#"<p><b>Politics</b></p><ul><li><a href="/wiki/Entity-A">Entity-A</a> visits
               <a href="/wiki/City-X">City-X</a>.</li></ul>"#,
        );
        Mock::given(method("GET"))
            .and(path("/wiki/Portal:Current_events/2022_January_1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wiki/Portal:Current_events/2022_January_2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wiki/City-X"))
            .respond_with(settlement())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wiki/Entity-A"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>person</p>"))
            .mount(&server)
            .await;

        for (title, id) in [("Entity-A", "Q100"), ("City-X", "Q200")] {
            Mock::given(method("GET"))
                .and(path("/w/api.php"))
                .and(query_param("titles", title))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "query": {"pages": [{"title": title, "pageprops": {"wikibase_item": id}}]}
                })))
                .mount(&server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path("/sparql"))
            .and(query_param_contains("query", "wd:Q100 ?p"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"bindings": [
                    {"s": {"type": "uri", "value": "http://www.wikidata.org/entity/Q100"},
                     "p": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P27"},
                     "o": {"type": "uri", "value": "http://www.wikidata.org/entity/Q300"}}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .and(query_param_contains("query", "wd:Q200 ?p"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"results": {"bindings": []}})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/nominatim/search"))
            .and(query_param("q", "City-X"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "place_id": 5, "osm_type": "relation", "osm_id": 9,
                "lat": "10.5", "lon": "20.5", "type": "city",
                "display_name": "City-X, Region Y",
                "geotext": "POLYGON((20 10,21 10,21 11,20 10))"
            }])))
            .mount(&server)
            .await;
        server
    }

    fn january_days() -> RunConfig {
        RunConfig {
            days: Some(DayRange::new(1, 2).expect("days")),
            ..RunConfig::months(month(1), month(1))
        }
    }

    fn artifact(root: &Path, graph_type: GraphType) -> String {
        let file = root
            .join("dataset")
            .join(format!("1_2_January_2022_{graph_type}.jsonld"));
        std::fs::read_to_string(&file).expect("artifact written")
    }

    #[tokio::test]
    async fn partial_month_produces_aligned_artifacts() {
        let server = january_server().await;
        let root = test_root();
        let config = test_config(&server, &root);

        let summary = run(&config, &january_days(), &SilentProgress).await.expect("run");
        assert_eq!(summary.outcomes.len(), 1);
        assert!(matches!(
            &summary.outcomes[0].status,
            PeriodStatus::Written { artifacts } if artifacts.len() == 4
        ));

        let entity = "http://www.wikidata.org/entity/Q100";
        let (base, ohg, osm, raw) = (
            artifact(&root, GraphType::Base),
            artifact(&root, GraphType::Ohg),
            artifact(&root, GraphType::Osm),
            artifact(&root, GraphType::Raw),
        );
        assert!(base.contains(entity));
        assert!(ohg.contains(entity));
        assert!(ohg.contains("http://www.wikidata.org/entity/Q300"));
        assert!(osm.contains("POLYGON((20 10"));
        assert!(!base.contains("POLYGON") && !ohg.contains("POLYGON") && !raw.contains("POLYGON"));

        let event = "Portal:Current_events/2022_January_1#1_e0";
        assert!(base.contains(event) && raw.contains(event));
        assert!(base.contains("WikipediaArticle"));
        assert!(raw.contains("ib-settlement"), "infobox markup goes to raw");

        let total = summary.total;
        assert_eq!(total.events, 1);
        assert_eq!(total.entities_resolved, 2);
        assert_eq!(total.locations_geocoded, 1);
        assert_eq!(total.day_failures, 1);
        assert_eq!(total.one_hop_facts, 1);
        assert!(total.external_requests > 0);

        // Partial months are never persisted as monthly analytics.
        assert!(!root.join("analytics").join("January_2022_analytics.json").exists());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn rerun_with_warm_cache_sends_no_requests() {
        let server = january_server().await;
        let root = test_root();
        let config = test_config(&server, &root);

        let first = run(&config, &january_days(), &SilentProgress).await.expect("first run");
        assert_eq!(first.total.day_failures, 1, "the missing day page fails");
        let sent = server.received_requests().await.expect("recording").len();

        let forced = RunConfig {
            force: true,
            ..january_days()
        };
        let summary = run(&config, &forced, &SilentProgress).await.expect("second run");
        // The 404 day page is answered from the cache as well.
        assert_eq!(server.received_requests().await.expect("recording").len(), sent);
        assert_eq!(summary.total.external_requests, 0);
        assert!(summary.total.cache_hits > 0);
        assert_eq!(summary.total.events, 1);
        assert_eq!(summary.total.day_failures, 1);

        // Without force the period is skipped outright.
        let skipped = run(&config, &january_days(), &SilentProgress).await.expect("third run");
        assert!(matches!(skipped.outcomes[0].status, PeriodStatus::Skipped));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn full_month_persists_analytics_and_keeps_ungeocoded_places() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/Portal:Current_events/2022_February_1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(day_page(
                "2022_February_1",
                r#"<ul><li>Floods reach <a href="/wiki/Town-Q">Town-Q</a>.</li></ul>"#,
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wiki/Town-Q"))
            .respond_with(settlement())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"pages": [{"title": "Town-Q", "missing": true}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/nominatim/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let root = test_root();
        let config = test_config(&server, &root);
        let summary = run(&config, &RunConfig::months(month(2), month(2)), &SilentProgress)
            .await
            .expect("run");

        let total = summary.total;
        assert_eq!(total.events, 1);
        assert_eq!(total.day_failures, 27, "every other February page is missing");
        assert_eq!(total.resolution_failures, 1);
        assert_eq!(total.geocoding_failures, 1);

        let dataset = root.join("dataset");
        let read = |name: &str| {
            std::fs::read_to_string(dataset.join(format!("February_2022_{name}.jsonld")))
                .expect("artifact written")
        };
        let (base, osm) = (read("base"), read("osm"));
        assert!(base.contains("/location/town-q-"));
        assert!(!osm.contains("/location/town-q-"));

        let analytics = AnalyticsAggregator::load_range(&root.join("analytics"), month(1), month(3))
            .expect("load");
        let february = analytics.record(month(2)).expect("february persisted");
        assert_eq!(february.total, total);
        assert_eq!(february.days.get(&1).map(|d| d.events), Some(1));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn invalid_range_is_fatal() {
        let server = MockServer::start().await;
        let root = test_root();
        let config = test_config(&server, &root);
        let backwards = RunConfig::months(month(3), month(1));
        assert!(run(&config, &backwards, &SilentProgress).await.is_err());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn unopenable_cache_is_fatal() {
        let server = MockServer::start().await;
        let root = test_root();
        std::fs::create_dir_all(&root).expect("root");
        // A regular file where the cache directory should be.
        std::fs::write(root.join("blocker"), "not a directory").expect("blocker");
        let mut config = test_config(&server, &root);
        config.output.cache_path = root.join("blocker").join("eventgraph.db");

        assert!(RunController::open(&config).await.is_err());
        assert!(run(&config, &january_days(), &SilentProgress).await.is_err());
        assert!(server.received_requests().await.expect("recording").is_empty());
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn day_range_applies_to_every_month() {
        let config = RunConfig {
            days: Some(DayRange::new(1, 2).expect("days")),
            ..RunConfig::months(month(11), YearMonth::new(2023, 1).expect("month"))
        };
        let prefixes: Vec<String> =
            config.periods().expect("periods").iter().map(Period::prefix).collect();
        assert_eq!(
            prefixes,
            vec!["1_2_November_2022", "1_2_December_2022", "1_2_January_2023"]
        );

        let standard = RunConfig {
            days: Some(DayRange::new(1, 31).expect("days")),
            ..RunConfig::months(month(2), month(2))
        };
        assert!(standard.periods().expect("periods")[0].is_full_month());
    }
}
