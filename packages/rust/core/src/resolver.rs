//! Entity resolution: mentions to canonical knowledge-base identities.
//!
//! Linked mentions are looked up directly (article title to `wikibase_item`);
//! unlinked mentions are sent as free text to the disambiguation service and
//! its top candidate is accepted as-is. Failures are returned as values and
//! leave the mention unresolved.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use eventgraph_crawler::{ServiceClient, article_title};
use eventgraph_shared::{
    Article, EntityMention, EntityReference, Event, LookupFailure, normalize_whitespace,
};

/// Outcome of one entity lookup.
pub type Resolution = std::result::Result<EntityReference, LookupFailure>;

/// What a mention is resolved by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum LookupKey {
    /// Decoded article title.
    Title(String),
    /// Normalized free text.
    Text(String),
}

/// Resolves entity mentions through the knowledge-base lookup and
/// disambiguation services.
pub struct EntityResolver {
    kb_lookup: Arc<ServiceClient>,
    disambiguation: Arc<ServiceClient>,
    base_url: String,
}

impl EntityResolver {
    pub fn new(
        kb_lookup: Arc<ServiceClient>,
        disambiguation: Arc<ServiceClient>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            kb_lookup,
            disambiguation,
            base_url: base_url.into(),
        }
    }

    /// Resolve a single mention.
    #[instrument(skip_all, fields(mention = %mention.text))]
    pub async fn resolve(&self, mention: &EntityMention) -> Resolution {
        match self.key_for(mention) {
            Some(key) => self.resolve_key(&key).await,
            None => Err(LookupFailure::NoMatch),
        }
    }

    /// Resolve every mention of `events` in place, each distinct lookup once
    /// and distinct lookups concurrently. Returns `(resolved, failed)` mention counts.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn resolve_events(self: &Arc<Self>, events: &mut [Event]) -> (usize, usize) {
        let keys = events
            .iter()
            .flat_map(|e| e.mentions.iter())
            .filter_map(|m| self.key_for(m))
            .collect();
        let resolved = self.resolve_keys(keys).await;

        let (mut ok, mut failed) = (0, 0);
        for mention in events.iter_mut().flat_map(|e| e.mentions.iter_mut()) {
            mention.entity = self.key_for(mention).and_then(|key| resolved.get(&key).cloned());
            if mention.entity.is_some() {
                ok += 1;
            } else {
                failed += 1;
            }
        }
        info!(resolved = ok, failed, "entity resolution complete");
        (ok, failed)
    }

    /// Resolve the title of every inspected article in place. Titles already
    /// looked up for mentions are answered by the cache.
    #[instrument(skip_all, fields(articles = articles.len()))]
    pub async fn resolve_articles(self: &Arc<Self>, articles: &mut BTreeMap<String, Article>) {
        let keys = articles
            .keys()
            .filter_map(|url| article_title(url, &self.base_url).map(LookupKey::Title))
            .collect();
        let resolved = self.resolve_keys(keys).await;

        for (url, article) in articles.iter_mut() {
            article.entity = article_title(url, &self.base_url)
                .and_then(|title| resolved.get(&LookupKey::Title(title)).cloned());
        }
        let matched = articles.values().filter(|a| a.entity.is_some()).count();
        debug!(matched, "article resolution complete");
    }

    async fn resolve_keys(
        self: &Arc<Self>,
        mut keys: Vec<LookupKey>,
    ) -> HashMap<LookupKey, EntityReference> {
        keys.sort();
        keys.dedup();

        let mut tasks = JoinSet::new();
        for key in keys {
            let resolver = Arc::clone(self);
            tasks.spawn(async move {
                let resolution = resolver.resolve_key(&key).await;
                (key, resolution)
            });
        }

        let mut resolved: HashMap<LookupKey, EntityReference> = HashMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(entity))) => {
                    resolved.insert(key, entity);
                }
                Ok((key, Err(failure))) => {
                    debug!(?key, %failure, "lookup left unresolved");
                }
                Err(e) => warn!(error = %e, "resolution task failed"),
            }
        }
        resolved
    }

    fn key_for(&self, mention: &EntityMention) -> Option<LookupKey> {
        match mention.link.as_deref() {
            Some(link) => article_title(link, &self.base_url).map(LookupKey::Title),
            None => {
                let text = normalize_whitespace(&mention.text);
                (!text.is_empty()).then_some(LookupKey::Text(text))
            }
        }
    }

    async fn resolve_key(&self, key: &LookupKey) -> Resolution {
        let result = match key {
            LookupKey::Title(title) => self.lookup_title(title).await,
            LookupKey::Text(text) => self.disambiguate(text).await,
        };
        if let Err(failure) = &result {
            if !matches!(failure, LookupFailure::NoMatch) {
                warn!(?key, %failure, "entity lookup failed");
            }
        }
        result
    }

    /// Article title to `wikibase_item` through the MediaWiki API.
    async fn lookup_title(&self, title: &str) -> Resolution {
        let endpoint = self.kb_lookup.endpoint();
        let body = self
            .kb_lookup
            .fetch_cached(title, |client| {
                client.get(endpoint).query(&[
                    ("action", "query"),
                    ("prop", "pageprops"),
                    ("ppprop", "wikibase_item"),
                    ("redirects", "1"),
                    ("format", "json"),
                    ("formatversion", "2"),
                    ("titles", title),
                ])
            })
            .await?;

        let response: PagePropsResponse = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Malformed(format!("kb lookup for {title}: {e}")))?;

        let page = response
            .query
            .and_then(|q| q.pages.into_iter().next())
            .ok_or(LookupFailure::NoMatch)?;
        let id = page
            .pageprops
            .and_then(|p| p.wikibase_item)
            .ok_or(LookupFailure::NoMatch)?;

        Ok(EntityReference {
            id,
            label: page.title.unwrap_or_else(|| title.to_string()),
        })
    }

    /// Free text to the disambiguation service's top candidate.
    async fn disambiguate(&self, text: &str) -> Resolution {
        let cleaned: String = text.chars().filter(|c| *c != '"' && *c != '\'').collect();
        let endpoint = self.disambiguation.endpoint();
        let body = self
            .disambiguation
            .fetch_cached(&cleaned, |client| {
                client
                    .post(endpoint)
                    .json(&serde_json::json!({ "text": cleaned }))
            })
            .await?;

        let response: DisambiguationResponse = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Malformed(format!("disambiguation: {e}")))?;

        let top = response
            .entities_wikidata
            .into_iter()
            .next()
            .ok_or(LookupFailure::NoMatch)?;
        let (uri, surface) = top.into_parts();
        let id = entity_id_from_uri(&uri).ok_or_else(|| {
            LookupFailure::Malformed(format!("unexpected entity uri {uri}"))
        })?;

        Ok(EntityReference {
            id,
            label: surface.unwrap_or_else(|| text.to_string()),
        })
    }
}

/// `<http://www.wikidata.org/entity/Q42>` -> `Q42`.
pub fn entity_id_from_uri(uri: &str) -> Option<String> {
    let uri = uri.trim().trim_start_matches('<').trim_end_matches('>');
    let id = uri.rsplit('/').next()?;
    let mut chars = id.chars();
    let valid = matches!(chars.next(), Some('Q' | 'P' | 'L'))
        && chars.clone().next().is_some()
        && chars.all(|c| c.is_ascii_digit());
    valid.then(|| id.to_string())
}

// ---------------------------------------------------------------------------
// Wire formats
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PagePropsResponse {
    query: Option<PagePropsQuery>,
}

#[derive(Debug, Deserialize)]
struct PagePropsQuery {
    #[serde(default)]
    pages: Vec<PageProps>,
}

#[derive(Debug, Deserialize)]
struct PageProps {
    title: Option<String>,
    pageprops: Option<PagePropsItem>,
}

#[derive(Debug, Deserialize)]
struct PagePropsItem {
    wikibase_item: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisambiguationResponse {
    #[serde(default)]
    entities_wikidata: Vec<Candidate>,
}

/// Candidates come either as objects or as `[uri, surface form]` pairs.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Candidate {
    Object {
        #[serde(rename = "URI")]
        uri: String,
        #[serde(rename = "surface form")]
        surface_form: Option<String>,
    },
    Pair(Vec<String>),
}

impl Candidate {
    fn into_parts(self) -> (String, Option<String>) {
        match self {
            Candidate::Object { uri, surface_form } => (uri, surface_form),
            Candidate::Pair(mut parts) => {
                let surface = (parts.len() > 1).then(|| parts.remove(1));
                (parts.into_iter().next().unwrap_or_default(), surface)
            }
        }
    }
}
