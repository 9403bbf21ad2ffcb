//! Geocoding of location mentions through a Nominatim-compatible service.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use eventgraph_crawler::ServiceClient;
use eventgraph_shared::{
    Coordinate, Event, LocationReference, LookupFailure, OsmElement, location_key,
    normalize_whitespace,
};

/// Outcome of one geocoding lookup.
pub type Geocoding = std::result::Result<LocationReference, LookupFailure>;

/// Resolves place names (plus optional containing-area hint) to geometry.
pub struct GeocodingEnricher {
    client: Arc<ServiceClient>,
}

impl GeocodingEnricher {
    pub fn new(client: Arc<ServiceClient>) -> Self {
        Self { client }
    }

    /// Geocode a single place. The query is `name, hint` when a hint is given.
    #[instrument(skip_all, fields(name = %name, hint = ?area_hint))]
    pub async fn geocode(&self, name: &str, area_hint: Option<&str>) -> Geocoding {
        let key = location_key(name, area_hint);
        let query = match area_hint.map(normalize_whitespace) {
            Some(hint) if !hint.is_empty() => format!("{}, {hint}", normalize_whitespace(name)),
            _ => normalize_whitespace(name),
        };

        let url = format!("{}/search", self.client.endpoint().trim_end_matches('/'));
        let body = self
            .client
            .fetch_cached(&key, |client| {
                client.get(&url).query(&[
                    ("q", query.as_str()),
                    ("format", "jsonv2"),
                    ("limit", "1"),
                    ("polygon_text", "1"),
                ])
            })
            .await?;

        let places: Vec<NominatimPlace> = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Malformed(format!("geocoding {query}: {e}")))?;
        let place = places.into_iter().next().ok_or(LookupFailure::NoMatch)?;
        place.into_reference(key)
    }

    /// Geocode every location mention of `events` in place, one lookup per
    /// distinct place key. Returns `(geocoded, failed)` mention counts.
    #[instrument(skip_all, fields(events = events.len()))]
    pub async fn geocode_events(self: &Arc<Self>, events: &mut [Event]) -> (usize, usize) {
        let mut wanted: BTreeMap<String, (String, Option<String>)> = BTreeMap::new();
        for location in events.iter().flat_map(|e| e.locations.iter()) {
            wanted
                .entry(location.key())
                .or_insert_with(|| (location.name.clone(), location.area_hint.clone()));
        }

        let mut tasks = JoinSet::new();
        for (key, (name, hint)) in wanted {
            let enricher = Arc::clone(self);
            tasks.spawn(async move {
                let result = enricher.geocode(&name, hint.as_deref()).await;
                (key, result)
            });
        }

        let mut found: BTreeMap<String, LocationReference> = BTreeMap::new();
        let mut failed_keys: BTreeSet<String> = BTreeSet::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, Ok(reference))) => {
                    found.insert(key, reference);
                }
                Ok((key, Err(failure))) => {
                    match failure {
                        LookupFailure::NoMatch => debug!(%key, "no geocoding match"),
                        other => warn!(%key, failure = %other, "geocoding failed"),
                    }
                    failed_keys.insert(key);
                }
                Err(e) => warn!(error = %e, "geocoding task failed"),
            }
        }

        let (mut ok, mut failed) = (0, 0);
        for location in events.iter_mut().flat_map(|e| e.locations.iter_mut()) {
            location.location = found.get(&location.key()).cloned();
            if location.location.is_some() {
                ok += 1;
            } else {
                failed += 1;
            }
        }
        info!(
            geocoded = ok,
            failed,
            distinct_failures = failed_keys.len(),
            "geocoding complete"
        );
        (ok, failed)
    }

    /// Geometry of one OpenStreetMap object by type and id.
    #[instrument(skip_all, fields(osm_type = %osm_type, osm_id))]
    pub async fn lookup_osm(&self, osm_type: &str, osm_id: u64) -> Result<String, LookupFailure> {
        let prefix = match osm_type {
            "node" => 'N',
            "way" => 'W',
            "relation" => 'R',
            other => return Err(LookupFailure::Malformed(format!("osm type {other}"))),
        };
        let osm_ids = format!("{prefix}{osm_id}");
        let key = format!("osm|{osm_type}/{osm_id}");

        let url = format!("{}/lookup", self.client.endpoint().trim_end_matches('/'));
        let body = self
            .client
            .fetch_cached(&key, |client| {
                client.get(&url).query(&[
                    ("osm_ids", osm_ids.as_str()),
                    ("format", "jsonv2"),
                    ("polygon_text", "1"),
                ])
            })
            .await?;

        let places: Vec<NominatimPlace> = serde_json::from_str(&body)
            .map_err(|e| LookupFailure::Malformed(format!("osm lookup {osm_ids}: {e}")))?;
        let place = places.into_iter().next().ok_or(LookupFailure::NoMatch)?;
        place.geotext.ok_or(LookupFailure::NoMatch)
    }

    /// Every distinct `(type, id)` as an element, with geometry where the
    /// lookup found one.
    #[instrument(skip_all, fields(refs = refs.len()))]
    pub async fn lookup_osm_all(
        self: &Arc<Self>,
        refs: BTreeSet<(String, u64)>,
    ) -> BTreeMap<(String, u64), OsmElement> {
        let mut tasks = JoinSet::new();
        for (osm_type, osm_id) in refs {
            let enricher = Arc::clone(self);
            tasks.spawn(async move {
                let geometry = enricher.lookup_osm(&osm_type, osm_id).await;
                (osm_type, osm_id, geometry)
            });
        }

        let mut elements = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            let (osm_type, osm_id, geometry) = match joined {
                Ok(done) => done,
                Err(e) => {
                    warn!(error = %e, "osm lookup task failed");
                    continue;
                }
            };
            let geometry = match geometry {
                Ok(wkt) => Some(wkt),
                Err(LookupFailure::NoMatch) => None,
                Err(failure) => {
                    warn!(%osm_type, osm_id, %failure, "osm lookup failed");
                    None
                }
            };
            elements.insert(
                (osm_type.clone(), osm_id),
                OsmElement {
                    osm_type,
                    osm_id,
                    geometry,
                },
            );
        }
        elements
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: Option<u64>,
    osm_type: Option<String>,
    osm_id: Option<u64>,
    lat: String,
    lon: String,
    display_name: Option<String>,
    /// `class` in the plain `json` format.
    #[serde(alias = "class")]
    category: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    addresstype: Option<String>,
    geotext: Option<String>,
}

impl NominatimPlace {
    fn into_reference(self, key: String) -> Geocoding {
        let lat: f64 = self
            .lat
            .parse()
            .map_err(|_| LookupFailure::Malformed(format!("bad latitude {}", self.lat)))?;
        let lon: f64 = self
            .lon
            .parse()
            .map_err(|_| LookupFailure::Malformed(format!("bad longitude {}", self.lon)))?;

        let geometry = match self.geotext {
            Some(wkt) if is_area_wkt(&wkt) => wkt,
            _ => format!("POINT({lon} {lat})"),
        };

        let mut place_types: Vec<String> = Vec::new();
        for kind in [self.addresstype, self.kind, self.category].into_iter().flatten() {
            if !kind.is_empty() && !place_types.contains(&kind) {
                place_types.push(kind);
            }
        }

        let display_name = self.display_name.unwrap_or_default();
        let hierarchy = display_name
            .split(',')
            .skip(1)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect();

        Ok(LocationReference {
            key,
            display_name,
            geometry,
            centroid: Coordinate { lat, lon },
            place_types,
            hierarchy,
            osm_type: self.osm_type,
            osm_id: self.osm_id,
            place_id: self.place_id,
        })
    }
}

fn is_area_wkt(wkt: &str) -> bool {
    let upper = wkt.trim_start().to_ascii_uppercase();
    upper.starts_with("POLYGON") || upper.starts_with("MULTIPOLYGON")
}
