use std::time::Duration;
use log::{debug, info, warn};
use tokio::sync::watch;

pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(14 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Health URL pinged by the keep-alive loop. `None` when no public host is known.
pub fn health_url(host: Option<&str>) -> Option<String> {
    let host = host.map(str::trim).filter(|h| !h.is_empty())?;
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        Some(format!("{}/api/health", host))
    } else {
        Some(format!("https://{}/api/health", host))
    }
}

/// Ping our own health endpoint so free hosting tiers don't idle the
/// process. Returns when `shutdown` flips to `true`.
pub async fn run_keep_alive(url: String, interval: Duration, mut shutdown: watch::Receiver<bool>) {
    let client = match reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Keep-alive disabled, could not build HTTP client: {}", e);
            return;
        }
    };

    info!("Keep-alive pinging {} every {} minutes", url, interval.as_secs() / 60);
    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; the server is still starting.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match client.get(&url).send().await {
                    Ok(response) => debug!("Keep-alive ping: {}", response.status()),
                    Err(e) => warn!("Keep-alive ping failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("Keep-alive task stopped");
}
