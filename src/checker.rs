//! Probe engine
//!
//! Fans out one header-only HTTP probe per link in a task, classifies each
//! outcome, and writes results back through the store. Individual probe
//! failures never abort the batch.

use crate::store::{LinkStatus, Task, TaskStore};
use crate::ServerConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

const USER_AGENT: &str = concat!("linkwatch/", env!("CARGO_PKG_VERSION"));
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Reachability checker sharing one pooled HTTP client across all probes.
#[derive(Clone)]
pub struct LinkChecker {
    store: TaskStore,
    client: reqwest::Client,
    /// Ceiling on simultaneous probes, `None` when unbounded
    probe_limit: Option<Arc<Semaphore>>,
}

impl LinkChecker {
    pub fn new(store: TaskStore, config: &ServerConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;

        let probe_limit = match config.max_concurrent_probes {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        Ok(Self {
            store,
            client,
            probe_limit,
        })
    }

    /// Probe every link in the task concurrently and record the outcomes.
    ///
    /// Returns only after every probe has resolved and its status landed in
    /// the store; the final snapshot covers the whole store, not just this
    /// task, and its failure is logged rather than raised.
    pub async fn check_links(&self, task: &Task) {
        tracing::info!("Checking task #{} ({} links)", task.id, task.links.len());

        let mut probes = JoinSet::new();
        for link in task.links.keys() {
            let checker = self.clone();
            let link = link.clone();
            let task_id = task.id;
            probes.spawn(async move {
                let _permit = match &checker.probe_limit {
                    Some(limit) => limit.clone().acquire_owned().await.ok(),
                    None => None,
                };
                let status = checker.check_single_link(&link).await;
                checker.store.update_link_status(task_id, &link, status).await;
            });
        }
        while probes.join_next().await.is_some() {}

        if let Err(e) = self.store.save_state().await {
            tracing::error!("Failed to save state after task #{}: {}", task.id, e);
        }
        tracing::info!("Finished task #{}", task.id);
    }

    /// Probe one link and classify the outcome.
    ///
    /// One HEAD request, no retries: a link that cannot be turned into a
    /// probeable URL is `Error`, a transport failure (DNS, connect, TLS,
    /// timeout) is `Unavailable`, and a received status code decides the
    /// rest.
    pub async fn check_single_link(&self, link: &str) -> LinkStatus {
        let Some(normalized) = normalize_link(link) else {
            tracing::warn!("Link {} has a non-HTTP scheme", link);
            return LinkStatus::Error;
        };
        let url = match reqwest::Url::parse(&normalized) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Malformed link {}: {}", link, e);
                return LinkStatus::Error;
            }
        };

        let start = Instant::now();
        match self.client.head(url).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                tracing::debug!(
                    "Link {}: status {} ({:?})",
                    link,
                    code,
                    start.elapsed()
                );
                classify_status(code)
            }
            Err(e) => {
                tracing::debug!(
                    "Link {} unreachable: {} ({:?})",
                    link,
                    e,
                    start.elapsed()
                );
                LinkStatus::Unavailable
            }
        }
    }
}

/// Prepend the default secure scheme when the link carries none.
///
/// A link that already names a scheme other than `http`/`https` cannot be
/// probed and returns `None`; prepending `https://` to it would yield a
/// URL that parses with the foreign scheme buried in the path.
fn normalize_link(link: &str) -> Option<String> {
    if link.starts_with("http://") || link.starts_with("https://") {
        return Some(link.to_string());
    }
    if link.contains("://") {
        return None;
    }
    Some(format!("https://{}", link))
}

/// 2xx and 3xx are reachable; everything else received is not.
fn classify_status(code: u16) -> LinkStatus {
    if (200..400).contains(&code) {
        LinkStatus::Available
    } else {
        LinkStatus::Unavailable
    }
}
