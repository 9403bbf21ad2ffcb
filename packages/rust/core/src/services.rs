//! One [`ServiceClient`] per external service, sharing a single cache.

use std::sync::Arc;

use eventgraph_crawler::{ServiceClient, ServiceStats};
use eventgraph_shared::{AppConfig, Result, ServiceConfig};
use eventgraph_storage::CacheStore;

pub struct Services {
    pub portal: Arc<ServiceClient>,
    pub kb_lookup: Arc<ServiceClient>,
    pub disambiguation: Arc<ServiceClient>,
    pub one_hop: Arc<ServiceClient>,
    pub geocoding: Arc<ServiceClient>,
}

impl Services {
    pub fn new(config: &AppConfig, cache: Arc<CacheStore>) -> Result<Self> {
        let build = |name: &str, service: &ServiceConfig| -> Result<Arc<ServiceClient>> {
            Ok(Arc::new(ServiceClient::new(
                name,
                service,
                &config.user_agent,
                Arc::clone(&cache),
            )?))
        };
        let s = &config.services;
        Ok(Self {
            portal: build("portal", &s.portal)?,
            kb_lookup: build("kb_lookup", &s.kb_lookup)?,
            disambiguation: build("disambiguation", &s.disambiguation)?,
            one_hop: build("one_hop", &s.one_hop)?,
            geocoding: build("geocoding", &s.geocoding)?,
        })
    }

    fn all(&self) -> [&Arc<ServiceClient>; 5] {
        [
            &self.portal,
            &self.kb_lookup,
            &self.disambiguation,
            &self.one_hop,
            &self.geocoding,
        ]
    }

    /// Requests and cache hits summed over every service.
    pub fn stats(&self) -> ServiceStats {
        self.all().iter().fold(ServiceStats::default(), |acc, client| {
            let s = client.stats();
            ServiceStats {
                requests: acc.requests + s.requests,
                cache_hits: acc.cache_hits + s.cache_hits,
            }
        })
    }
}
