//! Application configuration for eventgraph.
//!
//! User config lives at `~/.eventgraph/eventgraph.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EventGraphError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "eventgraph.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".eventgraph";

/// Upper bound for `services.*.max_retries`; backoff doubles per retry.
pub const MAX_RETRIES_LIMIT: u32 = 10;

// ---------------------------------------------------------------------------
// Config structs (matching eventgraph.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Output locations and URI namespace.
    #[serde(default)]
    pub output: OutputConfig,

    /// Source portal settings.
    #[serde(default)]
    pub portal: PortalConfig,

    /// Per-service endpoints and limits.
    #[serde(default)]
    pub services: ServicesConfig,

    /// Maximum number of one-hop facts kept per entity.
    #[serde(default = "default_one_hop_limit")]
    pub one_hop_limit: u32,

    /// User-Agent sent to every external service.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            portal: PortalConfig::default(),
            services: ServicesConfig::default(),
            one_hop_limit: default_one_hop_limit(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_one_hop_limit() -> u32 {
    100
}
fn default_user_agent() -> String {
    concat!("eventgraph(bot)/", env!("CARGO_PKG_VERSION")).into()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving the `.jsonld` graph documents.
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,

    /// Directory receiving the per-month analytics records.
    #[serde(default = "default_analytics_dir")]
    pub analytics_dir: PathBuf,

    /// Path of the persistent service-response cache database.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,

    /// Namespace for minted location, category, topic and graph URIs.
    #[serde(default = "default_uri_base")]
    pub uri_base: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dataset_dir: default_dataset_dir(),
            analytics_dir: default_analytics_dir(),
            cache_path: default_cache_path(),
            uri_base: default_uri_base(),
        }
    }
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("./dataset")
}
fn default_analytics_dir() -> PathBuf {
    PathBuf::from("./analytics")
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("./cache/eventgraph.db")
}
fn default_uri_base() -> String {
    "https://data.coypu.org/wikipedia-current-events/".into()
}

/// `[portal]` section. The wiki root itself is `services.portal.endpoint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Fetch linked articles to detect places and read their infoboxes.
    #[serde(default = "default_true")]
    pub classify_locations: bool,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            classify_locations: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Limits and endpoint for one external service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service endpoint URL.
    pub endpoint: String,

    /// Maximum in-flight requests to this service.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Minimum ms between two requests to this service.
    #[serde(default)]
    pub request_spacing_ms: u64,

    /// Retries after the first attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ServiceConfig {
    fn with_endpoint(endpoint: &str, concurrency: u32, request_spacing_ms: u64) -> Self {
        Self {
            endpoint: endpoint.into(),
            concurrency,
            request_spacing_ms,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Per-request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Minimum spacing between requests as a [`Duration`].
    pub fn spacing(&self) -> Duration {
        Duration::from_millis(self.request_spacing_ms)
    }
}

fn default_concurrency() -> u32 {
    2
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[services]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    /// Wiki root serving portal day pages (under `Portal:Current_events/`)
    /// and linked article pages.
    #[serde(default = "default_portal_service")]
    pub portal: ServiceConfig,

    /// Link-target to knowledge-base id lookup (MediaWiki API).
    #[serde(default = "default_kb_lookup_service")]
    pub kb_lookup: ServiceConfig,

    /// Free-text entity disambiguation.
    #[serde(default = "default_disambiguation_service")]
    pub disambiguation: ServiceConfig,

    /// SPARQL endpoint for one-hop neighbourhoods.
    #[serde(default = "default_one_hop_service")]
    pub one_hop: ServiceConfig,

    /// Geocoding (Nominatim-compatible).
    #[serde(default = "default_geocoding_service")]
    pub geocoding: ServiceConfig,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            portal: default_portal_service(),
            kb_lookup: default_kb_lookup_service(),
            disambiguation: default_disambiguation_service(),
            one_hop: default_one_hop_service(),
            geocoding: default_geocoding_service(),
        }
    }
}

fn default_portal_service() -> ServiceConfig {
    ServiceConfig::with_endpoint("https://en.wikipedia.org/wiki/", 4, 100)
}
fn default_kb_lookup_service() -> ServiceConfig {
    ServiceConfig::with_endpoint("https://en.wikipedia.org/w/api.php", 4, 100)
}
fn default_disambiguation_service() -> ServiceConfig {
    ServiceConfig::with_endpoint("https://labs.tib.eu/falcon/falcon2/api?mode=long&db=1", 2, 0)
}
fn default_one_hop_service() -> ServiceConfig {
    ServiceConfig::with_endpoint("https://query.wikidata.org/sparql", 1, 2000)
}
fn default_geocoding_service() -> ServiceConfig {
    ServiceConfig::with_endpoint("https://nominatim.openstreetmap.org/", 1, 2000)
}

impl AppConfig {
    /// Point every service at one base URL (mock servers, mirrors).
    pub fn with_all_endpoints(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.services.portal.endpoint = format!("{base}/wiki/");
        self.services.kb_lookup.endpoint = format!("{base}/w/api.php");
        self.services.disambiguation.endpoint = format!("{base}/falcon/api?mode=long&db=1");
        self.services.one_hop.endpoint = format!("{base}/sparql");
        self.services.geocoding.endpoint = format!("{base}/nominatim/");
        self
    }

    /// Reject settings that would make every lookup fail.
    pub fn validate(&self) -> Result<()> {
        let services = [
            ("portal", &self.services.portal),
            ("kb_lookup", &self.services.kb_lookup),
            ("disambiguation", &self.services.disambiguation),
            ("one_hop", &self.services.one_hop),
            ("geocoding", &self.services.geocoding),
        ];
        for (name, service) in services {
            if service.concurrency == 0 {
                return Err(EventGraphError::config(format!(
                    "services.{name}.concurrency must be at least 1"
                )));
            }
            if service.max_retries > MAX_RETRIES_LIMIT {
                return Err(EventGraphError::config(format!(
                    "services.{name}.max_retries must be at most {MAX_RETRIES_LIMIT}"
                )));
            }
            url::Url::parse(&service.endpoint).map_err(|e| {
                EventGraphError::config(format!(
                    "services.{name}.endpoint '{}' is not a URL: {e}",
                    service.endpoint
                ))
            })?;
        }
        if !self.services.portal.endpoint.ends_with('/') {
            return Err(EventGraphError::config(
                "services.portal.endpoint must end with '/'",
            ));
        }
        if !self.output.uri_base.ends_with('/') && !self.output.uri_base.ends_with('#') {
            return Err(EventGraphError::config(
                "output.uri_base must end with '/' or '#'",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.eventgraph/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EventGraphError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.eventgraph/eventgraph.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| EventGraphError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        EventGraphError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EventGraphError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EventGraphError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EventGraphError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
