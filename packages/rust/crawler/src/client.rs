//! Rate-limited, retrying HTTP client fronted by the persistent cache.
//!
//! Every external call in the pipeline (portal pages, knowledge-base lookup,
//! disambiguation, one-hop SPARQL, geocoding) goes through one
//! [`ServiceClient`] per service.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, warn};

use eventgraph_shared::{EventGraphError, Result, ServiceConfig};
use eventgraph_storage::{CacheStore, CachedResponse};

/// Delay before the first retry; doubled on every further attempt.
const RETRY_BASE: Duration = Duration::from_millis(500);

/// Statuses that mean the resource does not exist and will not come back.
const CACHED_FAILURE_STATUSES: [u16; 2] = [404, 410];

/// Backoff before retry number `attempt + 1`: `base * 2^attempt`, saturating.
pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Request and cache-hit tallies for one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// HTTP requests actually sent, retries included.
    pub requests: u64,
    pub cache_hits: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    cache_hits: AtomicU64,
}

/// HTTP client for a single external service.
pub struct ServiceClient {
    name: String,
    endpoint: String,
    client: Client,
    cache: Arc<CacheStore>,
    semaphore: Arc<Semaphore>,
    spacing: Duration,
    /// Earliest instant the next request may be sent.
    next_slot: Mutex<Instant>,
    max_retries: u32,
    retry_base: Duration,
    counters: Counters,
}

impl ServiceClient {
    /// Build a client for `name` from its `[services.<name>]` config.
    pub fn new(
        name: &str,
        config: &ServiceConfig,
        user_agent: &str,
        cache: Arc<CacheStore>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                EventGraphError::network(format!("failed to build HTTP client: {e}"), false)
            })?;

        Ok(Self {
            name: name.to_string(),
            endpoint: config.endpoint.clone(),
            client,
            cache,
            semaphore: Arc::new(Semaphore::new(config.concurrency.max(1) as usize)),
            spacing: config.spacing(),
            next_slot: Mutex::new(Instant::now()),
            max_retries: config.max_retries,
            retry_base: RETRY_BASE,
            counters: Counters::default(),
        })
    }

    /// Override the first retry delay.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Return the cached response for `params`, or send the request built by
    /// `build` and cache the outcome.
    ///
    /// Transient failures (timeouts, connection errors, 429, 5xx) are retried
    /// up to `max_retries` times with exponential backoff and never cached.
    /// Other 4xx statuses fail immediately; 404 and 410 are cached so the
    /// same permanent error is returned later without a request.
    pub async fn fetch_cached<F>(&self, params: &str, build: F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        match self.cache.lookup(&self.name, params).await? {
            Some(CachedResponse::Body(body)) => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(service = %self.name, key = params, "cache hit");
                return Ok(body);
            }
            Some(CachedResponse::Failed { status, message }) => {
                self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
                debug!(service = %self.name, key = params, status, "cached failure");
                return Err(EventGraphError::service(&self.name, status, message));
            }
            None => {}
        }

        let result = self.send_with_retries(params, &build).await;

        let stored = match &result {
            Ok(body) => self.cache.put(&self.name, params, body).await,
            Err(EventGraphError::Service {
                status, message, ..
            }) if CACHED_FAILURE_STATUSES.contains(status) => {
                self.cache
                    .put_failure(&self.name, params, *status, message)
                    .await
            }
            Err(_) => Ok(()),
        };
        if let Err(e) = stored {
            warn!(service = %self.name, key = params, error = %e, "failed to cache response");
        }
        result
    }

    async fn send_with_retries<F>(&self, params: &str, build: &F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(build).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    let backoff = backoff_delay(self.retry_base, attempt);
                    attempt += 1;
                    warn!(
                        service = %self.name,
                        key = params,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    debug!(
                        service = %self.name,
                        key = params,
                        attempt,
                        error = %e,
                        "request failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    async fn send_once<F>(&self, build: &F) -> Result<String>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EventGraphError::network("request semaphore closed", false))?;

        self.wait_for_slot().await;
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        let response = build(&self.client).send().await.map_err(|e| {
            EventGraphError::network(format!("{}: {e}", self.name), e.is_timeout())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            EventGraphError::network(
                format!("{}: body read failed: {e}", self.name),
                e.is_timeout(),
            )
        })?;

        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(EventGraphError::service(&self.name, status.as_u16(), snippet));
        }
        Ok(body)
    }

    /// Sleep until this service's minimum request spacing has elapsed.
    async fn wait_for_slot(&self) {
        if self.spacing.is_zero() {
            return;
        }
        let slot = {
            let mut next = self.next_slot.lock().await;
            let slot = (*next).max(Instant::now());
            *next = slot + self.spacing;
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_cache() -> Arc<CacheStore> {
        let tmp = std::env::temp_dir().join(format!("eg_client_{}.db", Uuid::now_v7()));
        Arc::new(CacheStore::open(&tmp).await.expect("open cache"))
    }

    fn service_config(endpoint: &str, max_retries: u32) -> ServiceConfig {
        ServiceConfig {
            endpoint: endpoint.to_string(),
            concurrency: 2,
            request_spacing_ms: 0,
            max_retries,
            timeout_secs: 5,
        }
    }

    fn client_for(name: &str, config: &ServiceConfig, cache: Arc<CacheStore>) -> ServiceClient {
        ServiceClient::new(name, config, "test", cache)
            .expect("client")
            .with_retry_base(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "Berlin"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[1]"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/search", server.uri());
        let client = client_for("geocoding", &service_config(&url, 0), test_cache().await);

        for _ in 0..2 {
            let body = client
                .fetch_cached("berlin", |c| c.get(&url).query(&[("q", "Berlin")]))
                .await
                .expect("fetch");
            assert_eq!(body, "[1]");
        }

        assert_eq!(client.stats(), ServiceStats { requests: 1, cache_hits: 1 });
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let url = server.uri();
        let client = client_for("one_hop", &service_config(&url, 2), test_cache().await);

        let body = client.fetch_cached("Q1", |c| c.get(&url)).await.expect("fetch");
        assert_eq!(body, "ok");
        assert_eq!(client.stats().requests, 2);
    }

    #[tokio::test]
    async fn exhausted_retries_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let url = server.uri();
        let cache = test_cache().await;
        let client = client_for("one_hop", &service_config(&url, 2), Arc::clone(&cache));

        let err = client.fetch_cached("Q2", |c| c.get(&url)).await.unwrap_err();
        assert!(err.is_transient());
        assert!(cache.get("one_hop", "Q2").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn not_found_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
            .expect(1)
            .mount(&server)
            .await;

        let url = server.uri();
        let client = client_for("portal", &service_config(&url, 3), test_cache().await);

        let err = client.fetch_cached("day", |c| c.get(&url)).await.unwrap_err();
        assert!(matches!(err, EventGraphError::Service { status: 404, .. }));
        assert_eq!(client.stats().requests, 1);
    }

    #[tokio::test]
    async fn not_found_is_cached_as_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such day"))
            .expect(1)
            .mount(&server)
            .await;

        let url = server.uri();
        let cache = test_cache().await;
        let client = client_for("portal", &service_config(&url, 3), Arc::clone(&cache));

        for _ in 0..2 {
            let err = client.fetch_cached("day", |c| c.get(&url)).await.unwrap_err();
            assert!(matches!(err, EventGraphError::Service { status: 404, .. }));
        }
        assert_eq!(client.stats(), ServiceStats { requests: 1, cache_hits: 1 });

        // A fresh client on the same cache answers without the network.
        let again = client_for("portal", &service_config(&url, 3), cache);
        let err = again.fetch_cached("day", |c| c.get(&url)).await.unwrap_err();
        assert!(matches!(err, EventGraphError::Service { status: 404, .. }));
        assert_eq!(again.stats(), ServiceStats { requests: 0, cache_hits: 1 });
    }

    #[tokio::test]
    async fn concurrency_one_serializes_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("ok")
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(3)
            .mount(&server)
            .await;

        let url = server.uri();
        let mut config = service_config(&url, 0);
        config.concurrency = 1;
        let client = client_for("kb_lookup", &config, test_cache().await);

        let started = std::time::Instant::now();
        let (a, b, c) = tokio::join!(
            client.fetch_cached("a", |c| c.get(&url)),
            client.fetch_cached("b", |c| c.get(&url)),
            client.fetch_cached("c", |c| c.get(&url)),
        );
        for result in [a, b, c] {
            assert_eq!(result.expect("fetch"), "ok");
        }
        // Three 100ms responses that never overlap.
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(client.stats().requests, 3);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let base = Duration::from_millis(500);
        assert_eq!(backoff_delay(base, 0), base);
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(base, 40), base.saturating_mul(u32::MAX));
        assert_eq!(backoff_delay(Duration::MAX, 2), Duration::MAX);
    }
}
