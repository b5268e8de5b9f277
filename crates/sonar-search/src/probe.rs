//! Reachability probing for `is_active`.

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use sonar_core::ProbeConfig;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Result of probing one link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Whether any HTTP response came back
    pub is_active: bool,
    /// Final status code, empty when unreachable
    pub status_code: String,
}

/// Reachability probe service.
///
/// Probes never fail: an unreachable link is reported as inactive.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe `url`, following at most `depth` redirects.
    async fn probe(&self, url: &str, depth: u32) -> ProbeOutcome;
}

/// reqwest-backed [`Prober`].
///
/// One client is built per redirect depth and reused, so probes share
/// connection pools.
pub struct HttpProber {
    timeout: Duration,
    clients: Mutex<HashMap<u32, Client>>,
}

impl HttpProber {
    /// Create a prober from the `[probe]` config section.
    #[must_use]
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Cached client for `depth`, built on first use.
    fn client(&self, depth: u32) -> reqwest::Result<Client> {
        let mut clients = self.clients.lock().expect("probe client cache poisoned");
        if let Some(client) = clients.get(&depth) {
            return Ok(client.clone());
        }
        let client = self.build_client(depth)?;
        clients.insert(depth, client.clone());
        Ok(client)
    }

    /// Client that follows at most `depth` redirects and then reports the
    /// redirect response itself instead of failing.
    fn build_client(&self, depth: u32) -> reqwest::Result<Client> {
        let hops = usize::try_from(depth).unwrap_or(usize::MAX);
        Client::builder()
            .timeout(self.timeout)
            .redirect(Policy::custom(move |attempt| {
                if attempt.previous().len() > hops {
                    attempt.stop()
                } else {
                    attempt.follow()
                }
            }))
            .danger_accept_invalid_certs(true)
            .build()
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new(&ProbeConfig::default())
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, depth: u32) -> ProbeOutcome {
        let target = if url.contains("://") {
            url.to_string()
        } else {
            format!("http://{url}")
        };

        let client = match self.client(depth) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Failed to build probe client: {}", e);
                return ProbeOutcome::default();
            }
        };

        match client.get(&target).send().await {
            Ok(response) => ProbeOutcome {
                is_active: true,
                status_code: response.status().as_u16().to_string(),
            },
            Err(e) => {
                tracing::debug!(url = %target, "probe failed: {}", e);
                ProbeOutcome::default()
            }
        }
    }
}
