//! One-hop neighbourhoods of resolved entities from a SPARQL endpoint.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

use eventgraph_crawler::ServiceClient;
use eventgraph_shared::{EntityReference, LookupFailure, OneHopFact, Term, WIKIDATA_ENTITY_NS};

/// Direct-claim namespace of fact predicates.
const WDT_NS: &str = "http://www.wikidata.org/prop/direct/";

/// `instance of`.
const INSTANCE_OF: &str = "P31";

/// Properties that place one location inside another: located in the
/// administrative territorial entity, country, location, located on terrain
/// feature, continent.
pub const PARENT_LOCATION_PROPERTIES: [&str; 5] = ["P131", "P17", "P276", "P706", "P30"];

/// OpenStreetMap relation id.
const OSM_RELATION_ID: &str = "P402";

/// OpenStreetMap object, `way/123` style.
const OSM_OBJECT: &str = "P10689";

/// Facts per entity id, plus the ids whose expansion failed.
#[derive(Debug, Default)]
pub struct Expansion {
    pub facts: BTreeMap<String, Vec<OneHopFact>>,
    pub failed: BTreeSet<String>,
}

impl Expansion {
    pub fn fact_count(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }
}

/// Fetches bounded one-hop facts for entities.
pub struct OneHopExpander {
    client: Arc<ServiceClient>,
    limit: u32,
}

impl OneHopExpander {
    pub fn new(client: Arc<ServiceClient>, limit: u32) -> Self {
        Self { client, limit }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Facts where `entity` is subject or object, at most `limit`, in the
    /// endpoint's own result order.
    #[instrument(skip_all, fields(entity = %entity.id))]
    pub async fn expand(&self, entity: &EntityReference) -> Result<Vec<OneHopFact>, LookupFailure> {
        let query = one_hop_query(&entity.id, self.limit);
        let key = format!("{}|{}", entity.id, self.limit);
        let endpoint = self.client.endpoint();

        let body = self
            .client
            .fetch_cached(&key, |client| {
                client
                    .get(endpoint)
                    .header("Accept", "application/sparql-results+json")
                    .query(&[("query", query.as_str()), ("format", "json")])
            })
            .await?;

        let results: SparqlResults<Row> = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Malformed(format!("one-hop {}: {e}", entity.id)))?;

        let mut facts: Vec<OneHopFact> = results
            .results
            .bindings
            .into_iter()
            .filter_map(|row| {
                let subject = match row.s? {
                    Binding::Uri { value } => value,
                    _ => return None,
                };
                let predicate = match row.p? {
                    Binding::Uri { value } => value,
                    _ => return None,
                };
                let object = row.o?.into_term()?;
                Some(OneHopFact {
                    subject,
                    predicate,
                    object,
                })
            })
            .collect();
        facts.truncate(self.limit as usize);
        Ok(facts)
    }

    /// Expand every distinct entity concurrently.
    #[instrument(skip_all, fields(entities))]
    pub async fn expand_all<'a, I>(self: &Arc<Self>, entities: I) -> Expansion
    where
        I: IntoIterator<Item = &'a EntityReference>,
    {
        let mut distinct: BTreeMap<String, EntityReference> = BTreeMap::new();
        for entity in entities {
            distinct
                .entry(entity.id.clone())
                .or_insert_with(|| entity.clone());
        }
        tracing::Span::current().record("entities", distinct.len());

        let mut tasks = JoinSet::new();
        for (id, entity) in distinct {
            let expander = Arc::clone(self);
            tasks.spawn(async move {
                let result = expander.expand(&entity).await;
                (id, result)
            });
        }

        let mut expansion = Expansion::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(facts))) => {
                    expansion.facts.insert(id, facts);
                }
                Ok((id, Err(failure))) => {
                    warn!(entity = %id, %failure, "one-hop expansion failed");
                    expansion.failed.insert(id);
                }
                Err(e) => warn!(error = %e, "one-hop task failed"),
            }
        }
        info!(
            facts = expansion.fact_count(),
            failed = expansion.failed.len(),
            "one-hop expansion complete"
        );
        expansion
    }

    /// English label of a knowledge-base class or entity id.
    #[instrument(skip_all, fields(entity = %id))]
    pub async fn label(&self, id: &str) -> Result<String, LookupFailure> {
        let query = label_query(id);
        let key = format!("label|{id}");
        let endpoint = self.client.endpoint();

        let body = self
            .client
            .fetch_cached(&key, |client| {
                client
                    .get(endpoint)
                    .header("Accept", "application/sparql-results+json")
                    .query(&[("query", query.as_str()), ("format", "json")])
            })
            .await?;

        let results: SparqlResults<LabelRow> = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Malformed(format!("label {id}: {e}")))?;
        results
            .results
            .bindings
            .into_iter()
            .find_map(|row| match row.label? {
                Binding::Literal { value, .. } | Binding::TypedLiteral { value, .. } => Some(value),
                _ => None,
            })
            .ok_or(LookupFailure::NoMatch)
    }

    /// Labels of every distinct id, fetched concurrently. Ids without a
    /// label are left out.
    #[instrument(skip_all, fields(ids = ids.len()))]
    pub async fn labels(self: &Arc<Self>, ids: BTreeSet<String>) -> BTreeMap<String, String> {
        let mut tasks = JoinSet::new();
        for id in ids {
            let expander = Arc::clone(self);
            tasks.spawn(async move {
                let result = expander.label(&id).await;
                (id, result)
            });
        }

        let mut labels = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(label))) => {
                    labels.insert(id, label);
                }
                Ok((id, Err(failure))) => warn!(entity = %id, %failure, "label lookup failed"),
                Err(e) => warn!(error = %e, "label task failed"),
            }
        }
        labels
    }
}

/// Objects of the direct claims `entity_uri wdt:{property} ?o`.
fn claims<'a>(
    facts: &'a [OneHopFact],
    entity_uri: &'a str,
    property: &'a str,
) -> impl Iterator<Item = &'a Term> + 'a {
    facts.iter().filter_map(move |fact| {
        let local = fact.predicate.strip_prefix(WDT_NS)?;
        (fact.subject == entity_uri && local == property).then_some(&fact.object)
    })
}

/// Classes `entity_uri` is an instance of, as entity URIs.
pub fn instance_classes<'a>(
    facts: &'a [OneHopFact],
    entity_uri: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    claims(facts, entity_uri, INSTANCE_OF).filter_map(|term| match term {
        Term::Iri(iri) if iri.starts_with(WIKIDATA_ENTITY_NS) => Some(iri.as_str()),
        _ => None,
    })
}

/// Locations `entity_uri` lies within, through any of the
/// [`PARENT_LOCATION_PROPERTIES`].
pub fn containing_locations<'a>(
    facts: &'a [OneHopFact],
    entity_uri: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    PARENT_LOCATION_PROPERTIES
        .iter()
        .flat_map(move |p| claims(facts, entity_uri, p))
        .filter_map(|term| match term {
            Term::Iri(iri) => Some(iri.as_str()),
            _ => None,
        })
}

/// OpenStreetMap objects named by `entity_uri`'s claims, as `(type, id)`.
pub fn osm_refs(facts: &[OneHopFact], entity_uri: &str) -> Vec<(String, u64)> {
    let literal = |term: &Term| match term {
        Term::Literal { value, .. } => Some(value.clone()),
        _ => None,
    };
    let relations = claims(facts, entity_uri, OSM_RELATION_ID)
        .filter_map(literal)
        .filter_map(|id| Some(("relation".to_string(), id.trim().parse().ok()?)));
    let objects = claims(facts, entity_uri, OSM_OBJECT)
        .filter_map(literal)
        .filter_map(|value| {
            let (kind, id) = value.trim().split_once('/')?;
            if !matches!(kind, "node" | "way" | "relation") {
                return None;
            }
            Some((kind.to_string(), id.parse().ok()?))
        });

    let mut refs: Vec<(String, u64)> = relations.chain(objects).collect();
    refs.sort();
    refs.dedup();
    refs
}

/// Both directions around `wd:{id}`, capped at `limit` rows.
pub fn one_hop_query(id: &str, limit: u32) -> String {
    format!(
        "PREFIX wd: <http://www.wikidata.org/entity/>\n\
         SELECT ?s ?p ?o WHERE {{\n  \
           {{ BIND(wd:{id} AS ?s) wd:{id} ?p ?o . }}\n  \
           UNION\n  \
           {{ BIND(wd:{id} AS ?o) ?s ?p wd:{id} . }}\n\
         }} LIMIT {limit}"
    )
}

/// English `rdfs:label` of `wd:{id}`.
pub fn label_query(id: &str) -> String {
    format!(
        "PREFIX wd: <http://www.wikidata.org/entity/>\n\
         PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>\n\
         SELECT ?label WHERE {{\n  \
           wd:{id} rdfs:label ?label .\n  \
           FILTER(LANG(?label) = \"en\")\n\
         }} LIMIT 1"
    )
}

// ---------------------------------------------------------------------------
// SPARQL JSON results
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SparqlResults<R> {
    results: SparqlBindings<R>,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings<R> {
    #[serde(default = "Vec::new")]
    bindings: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct LabelRow {
    label: Option<Binding>,
}

#[derive(Debug, Deserialize)]
struct Row {
    s: Option<Binding>,
    p: Option<Binding>,
    o: Option<Binding>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Binding {
    Uri {
        value: String,
    },
    Literal {
        value: String,
        datatype: Option<String>,
        #[serde(rename = "xml:lang")]
        lang: Option<String>,
    },
    TypedLiteral {
        value: String,
        datatype: Option<String>,
    },
    Bnode {},
}

impl Binding {
    fn into_term(self) -> Option<Term> {
        match self {
            Binding::Uri { value } => Some(Term::Iri(value)),
            Binding::Literal {
                value,
                datatype,
                lang,
            } => Some(Term::Literal {
                value,
                datatype,
                lang,
            }),
            Binding::TypedLiteral { value, datatype } => Some(Term::Literal {
                value,
                datatype,
                lang: None,
            }),
            Binding::Bnode {} => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventgraph_shared::ServiceConfig;
    use eventgraph_storage::CacheStore;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param_contains};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn expander_for(server: &MockServer, limit: u32) -> Arc<OneHopExpander> {
        let tmp = std::env::temp_dir().join(format!("eg_onehop_{}.db", Uuid::now_v7()));
        let cache = Arc::new(CacheStore::open(&tmp).await.expect("open cache"));
        let config = ServiceConfig {
            endpoint: format!("{}/sparql", server.uri()),
            concurrency: 1,
            request_spacing_ms: 0,
            max_retries: 0,
            timeout_secs: 5,
        };
        let client = ServiceClient::new("one_hop", &config, "test", cache).expect("client");
        Arc::new(OneHopExpander::new(Arc::new(client), limit))
    }

    fn entity(id: &str) -> EntityReference {
        EntityReference {
            id: id.into(),
            label: id.into(),
        }
    }

    fn results() -> serde_json::Value {
        let wd = "http://www.wikidata.org/entity/";
        serde_json::json!({
            "head": {"vars": ["s", "p", "o"]},
            "results": {"bindings": [
                {"s": {"type": "uri", "value": format!("{wd}Q100")},
                 "p": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P31"},
                 "o": {"type": "uri", "value": format!("{wd}Q5")}},
                {"s": {"type": "uri", "value": format!("{wd}Q100")},
                 "p": {"type": "uri", "value": "http://www.w3.org/2000/01/rdf-schema#label"},
                 "o": {"type": "literal", "value": "Entity A", "xml:lang": "en"}},
                {"s": {"type": "uri", "value": format!("{wd}Q100")},
                 "p": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P1082"},
                 "o": {"type": "literal", "value": "42",
                       "datatype": "http://www.w3.org/2001/XMLSchema#decimal"}},
                {"s": {"type": "uri", "value": format!("{wd}Q100")},
                 "p": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P1"},
                 "o": {"type": "bnode", "value": "t1"}},
                {"s": {"type": "uri", "value": format!("{wd}Q7")},
                 "p": {"type": "uri", "value": "http://www.wikidata.org/prop/direct/P50"},
                 "o": {"type": "uri", "value": format!("{wd}Q100")}}
            ]}
        })
    }

    #[tokio::test]
    async fn keeps_iris_and_literals_in_both_directions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .and(query_param_contains("query", "LIMIT 100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results()))
            .expect(1)
            .mount(&server)
            .await;

        let expander = expander_for(&server, 100).await;
        let facts = expander.expand(&entity("Q100")).await.expect("expanded");
        assert_eq!(facts.len(), 4, "blank node row dropped");
        assert_eq!(facts[1].object, Term::lang("Entity A", "en"));
        assert_eq!(
            facts[2].object,
            Term::typed("42", "http://www.w3.org/2001/XMLSchema#decimal")
        );
        assert_eq!(facts[3].subject, "http://www.wikidata.org/entity/Q7");

        // Cached per entity.
        expander.expand(&entity("Q100")).await.expect("cached");
    }

    #[tokio::test]
    async fn results_are_capped_at_the_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results()))
            .mount(&server)
            .await;

        let expander = expander_for(&server, 2).await;
        let facts = expander.expand(&entity("Q100")).await.expect("expanded");
        assert_eq!(facts.len(), 2);
    }

    #[tokio::test]
    async fn failures_leave_the_neighbourhood_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param_contains("query", "wd:Q100 ?p"))
            .respond_with(ResponseTemplate::new(200).set_body_json(results()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param_contains("query", "wd:Q9 ?p"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let expander = expander_for(&server, 100).await;
        let a = entity("Q100");
        let b = entity("Q9");
        let expansion = expander.expand_all([&a, &b, &a]).await;
        assert_eq!(expansion.facts.len(), 1);
        assert_eq!(expansion.fact_count(), 4);
        assert!(expansion.failed.contains("Q9"));
    }

    #[tokio::test]
    async fn labels_are_fetched_once_per_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param_contains("query", "wd:Q5 rdfs:label"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": {"bindings": [
                    {"label": {"type": "literal", "value": "human", "xml:lang": "en"}}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param_contains("query", "wd:Q404 rdfs:label"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"results": {"bindings": []}})),
            )
            .mount(&server)
            .await;

        let expander = expander_for(&server, 100).await;
        let ids: BTreeSet<String> = ["Q5".to_string(), "Q404".to_string()].into();
        let labels = expander.labels(ids.clone()).await;
        assert_eq!(labels.get("Q5").map(String::as_str), Some("human"));
        assert!(!labels.contains_key("Q404"));

        // Second pass is answered by the cache.
        assert_eq!(expander.labels(ids).await, labels);
    }

    #[test]
    fn fact_helpers_read_direct_claims() {
        let wd = "http://www.wikidata.org/entity/";
        let wdt = "http://www.wikidata.org/prop/direct/";
        let city = format!("{wd}Q200");
        let fact = |s: &str, p: &str, o: Term| OneHopFact {
            subject: s.to_string(),
            predicate: format!("{wdt}{p}"),
            object: o,
        };
        let facts = vec![
            fact(&city, "P31", Term::Iri(format!("{wd}Q515"))),
            fact(&city, "P17", Term::Iri(format!("{wd}Q232"))),
            fact(&city, "P402", Term::plain("62422")),
            fact(&city, "P10689", Term::plain("way/77")),
            fact(&city, "P10689", Term::plain("area/1")),
            // Incoming claims do not count.
            fact(&format!("{wd}Q9"), "P31", Term::Iri(city.clone())),
        ];

        let classes: Vec<&str> = instance_classes(&facts, &city).collect();
        assert_eq!(classes, vec!["http://www.wikidata.org/entity/Q515"]);
        let parents: Vec<&str> = containing_locations(&facts, &city).collect();
        assert_eq!(parents, vec!["http://www.wikidata.org/entity/Q232"]);
        assert_eq!(
            osm_refs(&facts, &city),
            vec![("relation".to_string(), 62422), ("way".to_string(), 77)]
        );
    }

    #[test]
    fn query_covers_both_directions() {
        let query = one_hop_query("Q42", 10);
        assert!(query.contains("wd:Q42 ?p ?o"));
        assert!(query.contains("?s ?p wd:Q42"));
        assert!(query.ends_with("LIMIT 10"));
    }
}
