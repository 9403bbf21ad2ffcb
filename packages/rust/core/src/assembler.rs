//! Graph assembler.
//!
//! Turns one period's enriched events, linked articles and one-hop facts
//! into the four URI-aligned documents:
//!
//! ```text
//! base  events, dates, categories, topics, sentences, mentions, articles
//!       with infobox rows, event types, entity links, location links
//! ohg   resolved entities, their one-hop facts and class labels
//! osm   geocoded locations and the OSM elements entities name
//! raw   events, topics and infoboxes with their source markup
//! ```
//!
//! Every URI is minted in one place, so the same event, entity or location
//! gets the same URI in all four documents.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDateTime, NaiveTime};
use tracing::{debug, instrument};

use eventgraph_artifacts::GraphDocument;
use eventgraph_artifacts::vocab::*;
use eventgraph_shared::{
    Article, EntityReference, Event, GraphType, InfoboxRow, InfoboxValue, LocationMention,
    OneHopFact, OsmElement, Term, article_key, sha256_hex, slugify,
};

use crate::onehop::{containing_locations, instance_classes, osm_refs};

/// Everything one period contributes to its documents.
#[derive(Debug, Default)]
pub struct PeriodData {
    pub events: Vec<Event>,
    /// Linked articles by [`article_key`].
    pub articles: BTreeMap<String, Article>,
    /// One-hop facts by entity id.
    pub facts: BTreeMap<String, Vec<OneHopFact>>,
    /// English labels of the classes event types point at, by entity id.
    pub class_labels: BTreeMap<String, String>,
    pub osm_elements: BTreeMap<(String, u64), OsmElement>,
}

impl PeriodData {
    pub fn entity_facts(&self, entity: &EntityReference) -> &[OneHopFact] {
        self.facts.get(&entity.id).map(Vec::as_slice).unwrap_or_default()
    }

    fn article_for(&self, link: &str) -> Option<&Article> {
        self.articles.get(article_key(link))
    }

    /// Knowledge-base classes, by entity id, of the innermost linked
    /// topic's article.
    pub fn event_types(&self, event: &Event) -> BTreeSet<String> {
        let entity = event
            .topics
            .iter()
            .rev()
            .filter_map(|topic| self.article_for(topic.link.as_deref()?))
            .find_map(|article| article.entity.as_ref());
        let Some(entity) = entity else {
            return BTreeSet::new();
        };
        let uri = entity.uri();
        instance_classes(self.entity_facts(entity), &uri)
            .filter_map(|class| class.strip_prefix(WD))
            .map(String::from)
            .collect()
    }

    /// Entities of the place articles an event links to, by id.
    fn place_entities<'a>(&'a self, event: &'a Event) -> BTreeMap<&'a str, &'a EntityReference> {
        event
            .mentions
            .iter()
            .filter_map(|m| self.article_for(m.link.as_deref()?))
            .filter(|article| article.is_place)
            .filter_map(|article| article.entity.as_ref())
            .map(|entity| (entity.id.as_str(), entity))
            .collect()
    }
}

/// Mints canonical URIs and builds graph documents.
#[derive(Debug, Clone)]
pub struct GraphAssembler {
    uri_base: String,
}

impl GraphAssembler {
    pub fn new(uri_base: impl Into<String>) -> Self {
        Self {
            uri_base: uri_base.into(),
        }
    }

    // -----------------------------------------------------------------------
    // Canonical URIs
    // -----------------------------------------------------------------------

    /// `{base}location/{slug}-{hash}`; the hash is over the normalized
    /// `name|hint` key, so homonyms in different areas stay apart.
    pub fn location_uri(&self, location: &LocationMention) -> String {
        let key = location.key();
        format!(
            "{}location/{}-{}",
            self.uri_base,
            slugify(&location.name),
            &sha256_hex(&key)[..12]
        )
    }

    pub fn category_uri(&self, category: &str) -> String {
        format!("{}category/{}", self.uri_base, slugify(category))
    }

    /// `{article}#ibrow_{label slug}`.
    pub fn infobox_row_uri(article: &Article, row: &InfoboxRow) -> String {
        format!("{}#ibrow_{}", article.url, slugify(&row.label))
    }

    pub fn graph_iri(&self, prefix: &str, graph_type: GraphType) -> String {
        format!("{}graph/{prefix}_{graph_type}", self.uri_base)
    }

    // -----------------------------------------------------------------------
    // Assembly
    // -----------------------------------------------------------------------

    /// Build the base, ohg, osm and raw documents, in that order.
    #[instrument(skip_all, fields(prefix = %prefix, events = data.events.len()))]
    pub fn assemble(&self, prefix: &str, data: &PeriodData) -> Vec<GraphDocument> {
        GraphType::ALL
            .iter()
            .map(|graph_type| {
                let mut doc = GraphDocument::new(*graph_type, self.graph_iri(prefix, *graph_type));
                match graph_type {
                    GraphType::Base => self.fill_base(&mut doc, data),
                    GraphType::Ohg => self.fill_ohg(&mut doc, data),
                    GraphType::Osm => self.fill_osm(&mut doc, data),
                    GraphType::Raw => self.fill_raw(&mut doc, data),
                }
                debug!(graph = %graph_type, quads = doc.len(), "assembled document");
                doc
            })
            .collect()
    }

    fn fill_base(&self, doc: &mut GraphDocument, data: &PeriodData) {
        for event in &data.events {
            self.add_event(doc, data, event);
        }
        for article in data.articles.values() {
            add_article(doc, article);
        }
    }

    fn add_event(&self, doc: &mut GraphDocument, data: &PeriodData, event: &Event) {
        let uri = event.uri();
        let date = Term::typed(event.date.format("%Y-%m-%d").to_string(), XSD_DATE);
        doc.add_iri(&uri, RDF_TYPE, COY_NEWS_SUMMARY);
        doc.add_iri(&uri, RDF_TYPE, SEM_EVENT);
        doc.add_iri(&uri, RDF_TYPE, NIF_CONTEXT);
        doc.add(&uri, NIF_IS_STRING, Term::lang(&event.text, "en"));
        doc.add(&uri, SEM_HAS_TIME_STAMP, date.clone());

        if let Some(category) = &event.category {
            let category_uri = self.category_uri(category);
            doc.add_iri(&uri, COY_HAS_CATEGORY, &category_uri);
            doc.add_iri(&category_uri, RDF_TYPE, COY_CATEGORY);
            doc.add(&category_uri, RDFS_LABEL, Term::lang(category, "en"));
        }

        // Topics run outermost first; each points at its parent.
        let mut parent: Option<String> = None;
        for topic in &event.topics {
            let topic_uri = event.topic_uri(topic);
            doc.add_iri(&topic_uri, RDF_TYPE, COY_TOPIC);
            doc.add(&topic_uri, RDFS_LABEL, Term::lang(&topic.text, "en"));
            doc.add(&topic_uri, COY_HAS_USAGE_DATE, date.clone());
            if let Some(link) = &topic.link {
                doc.add_iri(&topic_uri, COY_HAS_ARTICLE, article_key(link));
            }
            if let Some(parent) = &parent {
                doc.add_iri(&topic_uri, COY_HAS_TOPIC, parent);
            }
            parent = Some(topic_uri);
        }
        if let Some(innermost) = &parent {
            doc.add_iri(&uri, COY_HAS_TOPIC, innermost);
        }

        for class_id in data.event_types(event) {
            let class_uri = format!("{WD}{class_id}");
            doc.add_iri(&uri, COY_HAS_EVENT_TYPE, &class_uri);
            if let Some(label) = data.class_labels.get(&class_id) {
                doc.add(&class_uri, RDFS_LABEL, Term::lang(label, "en"));
            }
        }

        for (i, source) in event.sources.iter().enumerate() {
            let source_uri = format!("{uri}_s{i}");
            doc.add_iri(&uri, DCTERMS_SOURCE, &source_uri);
            doc.add(&source_uri, RDFS_LABEL, Term::plain(&source.label));
            doc.add_iri(&source_uri, RDFS_SEE_ALSO, &source.url);
        }

        for (i, fragment) in event.fragments.iter().enumerate() {
            let fragment_uri = format!("{uri}_{i}");
            doc.add_iri(&uri, COY_HAS_SENTENCE, &fragment_uri);
            doc.add_iri(&fragment_uri, RDF_TYPE, NIF_SENTENCE);
            doc.add_iri(&fragment_uri, NIF_REFERENCE_CONTEXT, &uri);
            doc.add(&fragment_uri, NIF_ANCHOR_OF, Term::plain(&fragment.text));
            add_offsets(doc, &fragment_uri, fragment.start, fragment.end);
        }

        let mut entity_by_link: BTreeMap<&str, &EntityReference> = BTreeMap::new();
        for (i, mention) in event.mentions.iter().enumerate() {
            let mention_uri = format!("{uri}_m{i}");
            doc.add_iri(&uri, COY_HAS_MENTION, &mention_uri);
            doc.add_iri(&mention_uri, RDF_TYPE, NIF_PHRASE);
            doc.add_iri(&mention_uri, NIF_REFERENCE_CONTEXT, &uri);
            doc.add(&mention_uri, NIF_ANCHOR_OF, Term::plain(&mention.text));
            if let Some((start, end)) = mention.span {
                add_offsets(doc, &mention_uri, start, end);
            }
            if let Some(link) = &mention.link {
                doc.add_iri(&mention_uri, COY_HAS_REFERENCE, article_key(link));
            }
            if let Some(entity) = &mention.entity {
                let entity_uri = entity.uri();
                doc.add_iri(&mention_uri, ITSRDF_TA_IDENT_REF, &entity_uri);
                doc.add_iri(&uri, COY_HAS_ENTITY, &entity_uri);
                doc.add(&entity_uri, RDFS_LABEL, Term::lang(&entity.label, "en"));
                if let Some(link) = mention.link.as_deref() {
                    entity_by_link.insert(link, entity);
                }
            }
        }

        for location in &event.locations {
            let location_uri = self.location_uri(location);
            doc.add_iri(&uri, SEM_HAS_PLACE, &location_uri);
            doc.add_iri(&location_uri, RDF_TYPE, COY_LOCATION);
            doc.add(&location_uri, RDFS_LABEL, Term::lang(&location.name, "en"));
            if let Some(hint) = &location.area_hint {
                doc.add(&location_uri, COY_AREA_HINT, Term::plain(hint));
            }
            let same_entity = location
                .link
                .as_deref()
                .and_then(|link| entity_by_link.get(link));
            if let Some(entity) = same_entity {
                doc.add_iri(&location_uri, OWL_SAME_AS, &entity.uri());
            }
        }

        // Places the event links to, nested by their knowledge-base claims.
        let places = data.place_entities(event);
        let place_uris: BTreeSet<String> = places.values().map(|e| e.uri()).collect();
        for place in places.values() {
            let place_uri = place.uri();
            for parent in containing_locations(data.entity_facts(place), &place_uri) {
                if parent != place_uri && place_uris.contains(parent) {
                    doc.add_iri(&place_uri, COY_HAS_PARENT_LOCATION, parent);
                }
            }
        }
    }

    fn fill_ohg(&self, doc: &mut GraphDocument, data: &PeriodData) {
        let entities = data
            .events
            .iter()
            .flat_map(Event::resolved_entities)
            .chain(data.articles.values().filter_map(|a| a.entity.as_ref()));
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for entity in entities {
            if !seen.insert(&entity.id) {
                continue;
            }
            let entity_uri = entity.uri();
            doc.add(&entity_uri, RDFS_LABEL, Term::lang(&entity.label, "en"));
            for fact in data.entity_facts(entity) {
                doc.add(&fact.subject, &fact.predicate, fact.object.clone());
            }
        }
        for (id, label) in &data.class_labels {
            doc.add(&format!("{WD}{id}"), RDFS_LABEL, Term::lang(label, "en"));
        }
    }

    fn fill_osm(&self, doc: &mut GraphDocument, data: &PeriodData) {
        for location in data.events.iter().flat_map(|e| e.locations.iter()) {
            let Some(place) = &location.location else {
                continue;
            };
            let location_uri = self.location_uri(location);
            let geometry_uri = format!("{location_uri}_geometry");

            doc.add_iri(&location_uri, RDF_TYPE, COY_LOCATION);
            doc.add_iri(&location_uri, RDF_TYPE, GEO_FEATURE);
            if !place.display_name.is_empty() {
                doc.add(&location_uri, RDFS_LABEL, Term::plain(&place.display_name));
            }
            doc.add_iri(&location_uri, GEO_HAS_GEOMETRY, &geometry_uri);
            doc.add(&geometry_uri, GEO_AS_WKT, Term::typed(&place.geometry, GEO_WKT_LITERAL));
            add_point(doc, &location_uri, place.centroid.lat, place.centroid.lon);
            for place_type in &place.place_types {
                doc.add(&location_uri, COY_PLACE_TYPE, Term::plain(place_type));
            }
            for area in &place.hierarchy {
                doc.add(&location_uri, COY_CONTAINED_IN, Term::plain(area));
            }
            if let Some(osm_url) = place.osm_url() {
                doc.add_iri(&location_uri, COY_OSM_ID, &osm_url);
            }
            if let Some(place_id) = place.place_id {
                doc.add(
                    &location_uri,
                    COY_OSM_PLACE_ID,
                    Term::typed(place_id.to_string(), XSD_INTEGER),
                );
            }
        }

        for article in data.articles.values() {
            let Some(entity) = &article.entity else {
                continue;
            };
            for osm_ref in osm_refs(data.entity_facts(entity), &entity.uri()) {
                let Some(element) = data.osm_elements.get(&osm_ref) else {
                    continue;
                };
                let element_uri = element.url();
                doc.add_iri(&article.url, COY_HAS_OSM_ELEMENT_FROM_WIKIDATA, &element_uri);
                doc.add_iri(&element_uri, RDF_TYPE, COY_OSM_ELEMENT);
                doc.add(&element_uri, COY_HAS_OSM_TYPE, Term::plain(&element.osm_type));
                doc.add(
                    &element_uri,
                    COY_OSM_ID,
                    Term::typed(element.osm_id.to_string(), XSD_INTEGER),
                );
                if let Some(wkt) = &element.geometry {
                    doc.add(&element_uri, COY_HAS_OSM_WKT, Term::typed(wkt, GEO_WKT_LITERAL));
                }
            }
        }
    }

    fn fill_raw(&self, doc: &mut GraphDocument, data: &PeriodData) {
        for event in &data.events {
            doc.add(&event.uri(), COY_RAW_HTML, Term::plain(&event.raw_html));
            for topic in event.topics.iter().filter(|t| !t.raw_html.is_empty()) {
                doc.add(&event.topic_uri(topic), COY_RAW_HTML, Term::plain(&topic.raw_html));
            }
        }
        for article in data.articles.values() {
            if let Some(infobox) = &article.infobox_html {
                doc.add(&article.url, COY_HAS_INFOBOX, Term::plain(infobox));
            }
        }
    }
}

fn add_article(doc: &mut GraphDocument, article: &Article) {
    let uri = article.url.as_str();
    doc.add_iri(uri, RDF_TYPE, COY_ARTICLE);
    if article.is_place {
        doc.add_iri(uri, RDF_TYPE, COY_LOCATION);
    }
    if let Some(entity) = &article.entity {
        doc.add_iri(uri, OWL_SAME_AS, &entity.uri());
    }
    if let Some(coordinates) = &article.coordinates {
        let point = format!("{uri}#coordinates");
        doc.add_iri(uri, COY_HAS_COORDINATES, &point);
        doc.add_iri(&point, RDF_TYPE, WGS_POINT);
        add_point(doc, &point, coordinates.lat, coordinates.lon);
    }
    if let Some(dtstart) = article.dtstart {
        doc.add(uri, COY_HAS_DTSTART, Term::typed(dtstart.to_string(), XSD_DATE));
    }
    if let Some(dtend) = article.dtend {
        doc.add(uri, COY_HAS_DTEND, Term::typed(dtend.to_string(), XSD_DATE));
    }

    for row in &article.rows {
        let row_uri = GraphAssembler::infobox_row_uri(article, row);
        doc.add_iri(uri, COY_HAS_INFOBOX_ROW, &row_uri);
        doc.add(&row_uri, RDFS_LABEL, Term::plain(&row.label));
        doc.add(&row_uri, COY_HAS_VALUE, Term::plain(&row.value));
        for link in &row.links {
            doc.add_iri(&row_uri, COY_HAS_LINK_AS_VALUE, article_key(link));
        }

        match &row.kind {
            InfoboxValue::Plain => doc.add_iri(&row_uri, RDF_TYPE, COY_INFOBOX_ROW),
            InfoboxValue::Location => doc.add_iri(&row_uri, RDF_TYPE, COY_INFOBOX_ROW_LOCATION),
            InfoboxValue::Date(span) => {
                doc.add_iri(&row_uri, RDF_TYPE, COY_INFOBOX_ROW_DATE);
                if let Some(start) = span.start {
                    doc.add(&row_uri, COY_HAS_DATE, date_time(start));
                }
                if let Some(end) = span.end {
                    doc.add(&row_uri, COY_HAS_END_DATE, date_time(end));
                } else if span.ongoing {
                    doc.add(&row_uri, COY_HAS_DATE_ONGOING, Term::typed("true", XSD_BOOLEAN));
                }
                if let Some(timezone) = &span.timezone {
                    doc.add(&row_uri, COY_HAS_TIMEZONE, Term::plain(timezone));
                }
            }
            InfoboxValue::Time(span) => {
                doc.add_iri(&row_uri, RDF_TYPE, COY_INFOBOX_ROW_TIME);
                let time = |t: NaiveTime| Term::typed(t.format("%H:%M:%S").to_string(), XSD_TIME);
                doc.add(&row_uri, COY_HAS_TIME, time(span.start));
                if let Some(end) = span.end {
                    doc.add(&row_uri, COY_HAS_END_TIME, time(end));
                }
                if let Some(timezone) = &span.timezone {
                    doc.add(&row_uri, COY_HAS_TIMEZONE, Term::plain(timezone));
                }
            }
        }
    }
}

fn date_time(value: NaiveDateTime) -> Term {
    Term::typed(value.format("%Y-%m-%dT%H:%M:%S").to_string(), XSD_DATE_TIME)
}

fn add_point(doc: &mut GraphDocument, subject: &str, lat: f64, lon: f64) {
    doc.add(subject, WGS_LAT, Term::typed(lat.to_string(), XSD_DOUBLE));
    doc.add(subject, WGS_LONG, Term::typed(lon.to_string(), XSD_DOUBLE));
}

fn add_offsets(doc: &mut GraphDocument, subject: &str, start: usize, end: usize) {
    doc.add(subject, NIF_BEGIN_INDEX, Term::typed(start.to_string(), XSD_INTEGER));
    doc.add(subject, NIF_END_INDEX, Term::typed(end.to_string(), XSD_INTEGER));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use eventgraph_shared::{
        Coordinate, DateSpan, EntityMention, LocationReference, SourceLink, TextFragment, Topic,
    };

    const BASE: &str = "https://data.example.org/events/";
    const WIKI: &str = "https://en.wikipedia.org/wiki/";

    fn entity(id: &str, label: &str) -> EntityReference {
        EntityReference {
            id: id.into(),
            label: label.into(),
        }
    }

    fn wd(id: &str) -> String {
        format!("{WD}{id}")
    }

    fn fact(subject: &str, property: &str, object: Term) -> OneHopFact {
        OneHopFact {
            subject: wd(subject),
            predicate: format!("{WDT}{property}"),
            object,
        }
    }

    fn midnight(y: i32, m: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(y, m, d)?.and_hms_opt(0, 0, 0)
    }

    fn sample_event() -> Event {
        let mut entity_mention =
            EntityMention::linked("Entity A", format!("{WIKI}Entity-A"), (0, 8));
        entity_mention.entity = Some(entity("Q100", "Entity-A"));

        let mut city = LocationMention::new(
            "City-X",
            Some("Region Y".into()),
            Some(format!("{WIKI}City-X")),
        );
        city.location = Some(LocationReference {
            key: city.key(),
            display_name: "City-X, Region Y".into(),
            geometry: "POLYGON((0 0,1 0,1 1,0 0))".into(),
            centroid: Coordinate { lat: 0.5, lon: 0.5 },
            place_types: vec!["city".into()],
            hierarchy: vec!["Region Y".into()],
            osm_type: Some("relation".into()),
            osm_id: Some(7),
            place_id: Some(11),
        });
        let village = LocationMention::new("Village Z", None, None);

        Event {
            date: NaiveDate::from_ymd_opt(2022, 1, 1).expect("date"),
            index: 0,
            source_url: format!("{WIKI}Portal:Current_events/2022_January_1"),
            category: Some("Disasters and accidents".into()),
            topics: vec![
                Topic {
                    text: "2022 floods".into(),
                    link: Some(format!("{WIKI}2022_floods")),
                    index: 0,
                    raw_html: "<li><a href=\"/wiki/2022_floods\">2022 floods</a><ul>".into(),
                },
                Topic {
                    text: "Relief".into(),
                    link: None,
                    index: 1,
                    raw_html: String::new(),
                },
            ],
            text: "Entity A visits City-X in Region-Y. Aid arrives.".into(),
            fragments: vec![
                TextFragment {
                    text: "Entity A visits City-X in Region-Y.".into(),
                    start: 0,
                    end: 35,
                },
                TextFragment {
                    text: "Aid arrives.".into(),
                    start: 36,
                    end: 48,
                },
            ],
            mentions: vec![
                entity_mention,
                EntityMention::linked("City-X", format!("{WIKI}City-X#History"), (16, 22)),
                EntityMention::linked("Region-Y", format!("{WIKI}Region-Y"), (26, 34)),
                EntityMention::unlinked("Aid arrives."),
            ],
            locations: vec![city, village],
            sources: vec![SourceLink {
                label: "Reuters".into(),
                url: "https://reuters.example/story".into(),
            }],
            raw_html: "<li>Entity A visits City-X in Region-Y.</li>".into(),
        }
    }

    fn sample_articles() -> BTreeMap<String, Article> {
        let floods = Article {
            url: format!("{WIKI}2022_floods"),
            infobox_html: Some("<table class=\"infobox vevent\"></table>".into()),
            rows: vec![
                InfoboxRow {
                    label: "Date".into(),
                    value: "1 – 9 January 2022".into(),
                    links: Vec::new(),
                    kind: InfoboxValue::Date(DateSpan {
                        start: midnight(2022, 1, 1),
                        end: midnight(2022, 1, 9),
                        ongoing: false,
                        timezone: None,
                    }),
                },
                InfoboxRow {
                    label: "Location".into(),
                    value: "City-X".into(),
                    links: vec![format!("{WIKI}City-X")],
                    kind: InfoboxValue::Location,
                },
            ],
            dtstart: NaiveDate::from_ymd_opt(2022, 1, 1),
            entity: Some(entity("Q900", "2022 floods")),
            ..Article::default()
        };
        let city = Article {
            url: format!("{WIKI}City-X"),
            is_place: true,
            coordinates: Some(Coordinate { lat: 0.5, lon: 0.5 }),
            entity: Some(entity("Q200", "City-X")),
            ..Article::default()
        };
        let region = Article {
            url: format!("{WIKI}Region-Y"),
            is_place: true,
            entity: Some(entity("Q300", "Region-Y")),
            ..Article::default()
        };
        [floods, city, region]
            .into_iter()
            .map(|a| (a.url.clone(), a))
            .collect()
    }

    fn sample_data(events: Vec<Event>) -> PeriodData {
        let mut facts = BTreeMap::new();
        facts.insert("Q100".to_string(), vec![fact("Q100", "P31", Term::iri(wd("Q5")))]);
        facts.insert("Q900".to_string(), vec![fact("Q900", "P31", Term::iri(wd("Q8065")))]);
        facts.insert(
            "Q200".to_string(),
            vec![
                fact("Q200", "P131", Term::iri(wd("Q300"))),
                fact("Q200", "P402", Term::plain("7001")),
            ],
        );
        let element = OsmElement {
            osm_type: "relation".into(),
            osm_id: 7001,
            geometry: Some("POLYGON((0 0,2 0,2 2,0 0))".into()),
        };
        PeriodData {
            events,
            articles: sample_articles(),
            facts,
            class_labels: [("Q8065".to_string(), "natural disaster".to_string())].into(),
            osm_elements: [(("relation".to_string(), 7001), element)].into(),
        }
    }

    fn assemble(events: &[Event]) -> Vec<GraphDocument> {
        GraphAssembler::new(BASE).assemble("1_2_January_2022", &sample_data(events.to_vec()))
    }

    #[test]
    fn produces_four_documents_in_order() {
        let docs = assemble(&[sample_event()]);
        let types: Vec<GraphType> = docs.iter().map(|d| d.graph_type).collect();
        assert_eq!(types, GraphType::ALL.to_vec());
        assert_eq!(
            docs[0].graph_iri,
            "https://data.example.org/events/graph/1_2_January_2022_base"
        );
    }

    #[test]
    fn uris_align_across_documents() {
        let event = sample_event();
        let docs = assemble(std::slice::from_ref(&event));
        let (base, ohg, osm, raw) = (&docs[0], &docs[1], &docs[2], &docs[3]);

        let entity = wd("Q100");
        assert!(base.mentions_iri(&entity));
        assert!(ohg.has_subject(&entity));
        assert!(ohg.mentions_iri(&wd("Q5")));

        let city = GraphAssembler::new(BASE).location_uri(&event.locations[0]);
        assert!(base.mentions_iri(&city));
        assert!(osm.has_subject(&city));

        assert!(base.has_subject(&event.uri()));
        assert!(raw.has_subject(&event.uri()));

        let topic = event.topic_uri(&event.topics[0]);
        assert!(base.has_subject(&topic));
        assert!(raw.has_subject(&topic));

        let floods = format!("{WIKI}2022_floods");
        assert!(base.has_subject(&floods));
        assert!(raw.has_subject(&floods));
        let city_article = format!("{WIKI}City-X");
        assert!(base.has_subject(&city_article));
        assert!(osm.has_subject(&city_article));
        assert!(ohg.has_subject(&wd("Q200")));
    }

    #[test]
    fn geometry_only_in_osm() {
        let docs = assemble(&[sample_event()]);
        for doc in &docs {
            let has_wkt = doc
                .quads()
                .any(|q| q.predicate == GEO_AS_WKT || q.predicate == COY_HAS_OSM_WKT);
            assert_eq!(has_wkt, doc.graph_type == GraphType::Osm, "{}", doc.graph_type);
        }
    }

    #[test]
    fn ungeocoded_locations_stay_in_base_only() {
        let event = sample_event();
        let docs = assemble(std::slice::from_ref(&event));
        let village = GraphAssembler::new(BASE).location_uri(&event.locations[1]);
        assert!(docs[0].has_subject(&village));
        assert!(!docs[2].mentions_iri(&village));
    }

    #[test]
    fn base_links_topics_categories_and_sameas() {
        let event = sample_event();
        let assembler = GraphAssembler::new(BASE);
        let docs = assemble(std::slice::from_ref(&event));
        let base = &docs[0];
        let uri = event.uri();

        let floods = event.topic_uri(&event.topics[0]);
        let relief = event.topic_uri(&event.topics[1]);
        assert_eq!(relief, format!("{WIKI}Portal:Current_events/2022_January_1#1_t1"));
        let topics: Vec<&Term> = base.objects(&uri, COY_HAS_TOPIC).collect();
        assert_eq!(topics, vec![&Term::iri(relief.clone())]);
        assert!(base.objects(&relief, COY_HAS_TOPIC).any(|t| *t == Term::iri(&floods)));
        assert!(
            base.objects(&floods, COY_HAS_ARTICLE)
                .any(|t| *t == Term::iri(format!("{WIKI}2022_floods")))
        );
        assert!(
            base.objects(&relief, COY_HAS_USAGE_DATE)
                .any(|t| *t == Term::typed("2022-01-01", XSD_DATE))
        );
        assert_eq!(base.objects(&relief, COY_HAS_ARTICLE).count(), 0);

        assert!(
            base.objects(&uri, COY_HAS_CATEGORY)
                .any(|t| *t == Term::iri(assembler.category_uri("Disasters and accidents")))
        );
        assert_eq!(base.objects(&uri, COY_HAS_SENTENCE).count(), 2);
        assert_eq!(base.objects(&uri, DCTERMS_SOURCE).count(), 1);

        // City-X's mention carries a fragment and has no resolved entity.
        let city = assembler.location_uri(&event.locations[0]);
        assert_eq!(base.objects(&city, OWL_SAME_AS).count(), 0);
        let city_mention = format!("{uri}_m1");
        assert!(
            base.objects(&city_mention, COY_HAS_REFERENCE)
                .any(|t| *t == Term::iri(format!("{WIKI}City-X")))
        );
    }

    #[test]
    fn articles_carry_entity_coordinates_and_typed_rows() {
        let docs = assemble(&[sample_event()]);
        let base = &docs[0];

        let city = format!("{WIKI}City-X");
        assert!(base.objects(&city, OWL_SAME_AS).any(|t| *t == Term::iri(wd("Q200"))));
        assert!(base.objects(&city, RDF_TYPE).any(|t| *t == Term::iri(COY_LOCATION)));
        let point = format!("{city}#coordinates");
        assert!(base.objects(&city, COY_HAS_COORDINATES).any(|t| *t == Term::iri(&point)));
        assert!(base.objects(&point, WGS_LAT).any(|t| *t == Term::typed("0.5", XSD_DOUBLE)));

        let floods = format!("{WIKI}2022_floods");
        assert!(
            base.objects(&floods, COY_HAS_DTSTART)
                .any(|t| *t == Term::typed("2022-01-01", XSD_DATE))
        );
        let date_row = format!("{floods}#ibrow_date");
        assert!(base.objects(&floods, COY_HAS_INFOBOX_ROW).any(|t| *t == Term::iri(&date_row)));
        assert!(
            base.objects(&date_row, RDF_TYPE)
                .any(|t| *t == Term::iri(COY_INFOBOX_ROW_DATE))
        );
        assert!(
            base.objects(&date_row, COY_HAS_END_DATE)
                .any(|t| *t == Term::typed("2022-01-09T00:00:00", XSD_DATE_TIME))
        );
        assert_eq!(base.objects(&date_row, COY_HAS_DATE_ONGOING).count(), 0);

        let location_row = format!("{floods}#ibrow_location");
        assert!(
            base.objects(&location_row, COY_HAS_LINK_AS_VALUE)
                .any(|t| *t == Term::iri(&city))
        );
    }

    #[test]
    fn event_types_and_parent_locations_come_from_claims() {
        let event = sample_event();
        let docs = assemble(std::slice::from_ref(&event));
        let (base, ohg) = (&docs[0], &docs[1]);

        let disaster = wd("Q8065");
        assert!(
            base.objects(&event.uri(), COY_HAS_EVENT_TYPE)
                .any(|t| *t == Term::iri(&disaster))
        );
        assert!(
            ohg.objects(&disaster, RDFS_LABEL)
                .any(|t| *t == Term::lang("natural disaster", "en"))
        );

        // Only parents the event itself links to count.
        let city = wd("Q200");
        let parents: Vec<&Term> = base.objects(&city, COY_HAS_PARENT_LOCATION).collect();
        assert_eq!(parents, vec![&Term::iri(wd("Q300"))]);
        assert_eq!(base.objects(&wd("Q300"), COY_HAS_PARENT_LOCATION).count(), 0);
    }

    #[test]
    fn wikidata_osm_elements_and_raw_markup() {
        let event = sample_event();
        let docs = assemble(std::slice::from_ref(&event));
        let (osm, raw) = (&docs[2], &docs[3]);

        let element = "https://www.openstreetmap.org/relation/7001";
        assert!(
            osm.objects(&format!("{WIKI}City-X"), COY_HAS_OSM_ELEMENT_FROM_WIKIDATA)
                .any(|t| *t == Term::iri(element))
        );
        assert!(osm.objects(element, COY_HAS_OSM_TYPE).any(|t| *t == Term::plain("relation")));
        assert_eq!(osm.objects(element, COY_HAS_OSM_WKT).count(), 1);

        let floods = format!("{WIKI}2022_floods");
        assert_eq!(raw.objects(&floods, COY_HAS_INFOBOX).count(), 1);
        let topic = event.topic_uri(&event.topics[0]);
        assert!(
            raw.objects(&topic, COY_RAW_HTML)
                .any(|t| *t == Term::plain(event.topics[0].raw_html.clone()))
        );
        // Topics without markup add nothing.
        assert!(!raw.has_subject(&event.topic_uri(&event.topics[1])));
    }

    #[test]
    fn location_uris_separate_homonyms() {
        let assembler = GraphAssembler::new(BASE);
        let a = LocationMention::new("Springfield", Some("Illinois".into()), None);
        let b = LocationMention::new("Springfield", Some("Missouri".into()), None);
        let a_again = LocationMention::new(" springfield", Some("ILLINOIS".into()), None);
        assert_ne!(assembler.location_uri(&a), assembler.location_uri(&b));
        assert_eq!(assembler.location_uri(&a), assembler.location_uri(&a_again));
    }
}
