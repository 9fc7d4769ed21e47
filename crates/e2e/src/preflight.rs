//! Reachability check for the sites under test

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Delay between attempts
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Poll `url` until it answers with any HTTP status below 500.
///
/// The sites are public demos; a 4xx still proves the host is up.
pub async fn wait_for_reachable(url: &str, timeout_duration: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!("{} reachable ({})", url, resp.status());
                return Ok(());
            }
            Ok(resp) => {
                warn!("{} returned {}", url, resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} ...", url);
                }
                if !e.is_connect() && !e.is_timeout() {
                    warn!("Reachability check error: {}", e);
                }
            }
        }

        if start.elapsed() + RETRY_DELAY >= timeout_duration {
            break;
        }
        sleep(RETRY_DELAY).await;
    }

    Err(E2eError::Unreachable {
        url: url.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = format!("http://127.0.0.1:{port}/");
        let err = wait_for_reachable(&url, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Unreachable { attempts, .. } if attempts >= 1));
    }
}
