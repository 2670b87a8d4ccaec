//! Per-endpoint lease keepalive streams

use etcd_client::{LeaseKeepAliveStream, LeaseKeeper};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A live keepalive stream bound to one endpoint's lease.
///
/// The task renews the lease well inside its TTL and records each renewal.
/// When the stream closes or a renewal fails, the task exits and the lease
/// is left to expire; the next `register` call for the endpoint starts a
/// fresh lifecycle.
pub(crate) struct Heartbeat {
    pub lease_id: i64,
    last_renewal: Arc<Mutex<Instant>>,
    pub task: JoinHandle<()>,
}

impl Heartbeat {
    /// Spawn the renewal task for an open keepalive stream.
    pub fn spawn(
        keeper: LeaseKeeper,
        stream: LeaseKeepAliveStream,
        lease_seconds: i64,
        endpoint_key: String,
    ) -> Self {
        let lease_id = keeper.id();
        let last_renewal = Arc::new(Mutex::new(Instant::now()));
        let renewal_clock = Arc::clone(&last_renewal);
        let task = tokio::spawn(run(keeper, stream, lease_seconds, endpoint_key, renewal_clock));
        Self {
            lease_id,
            last_renewal,
            task,
        }
    }

    /// Time since the lease was last renewed (or granted).
    pub fn last_renewal_age(&self) -> Duration {
        self.last_renewal
            .lock()
            .map(|stamp| stamp.elapsed())
            .unwrap_or_default()
    }
}

async fn run(
    mut keeper: LeaseKeeper,
    mut stream: LeaseKeepAliveStream,
    lease_seconds: i64,
    endpoint_key: String,
    last_renewal: Arc<Mutex<Instant>>,
) {
    // Renew at a third of the TTL so a single stalled request cannot kill
    // the lease.
    let period = Duration::from_secs((lease_seconds.max(1) as u64 / 3).max(1));
    let mut ticker = tokio::time::interval(period);
    // The first tick completes immediately; the lease was just granted.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Err(err) = keeper.keep_alive().await {
            warn!("Keepalive send failed for {endpoint_key}: {err}");
            break;
        }
        match stream.message().await {
            Ok(Some(response)) if response.ttl() > 0 => {
                if let Ok(mut stamp) = last_renewal.lock() {
                    *stamp = Instant::now();
                }
                debug!(
                    "Renewed lease {} for {endpoint_key} (ttl {}s)",
                    response.id(),
                    response.ttl()
                );
            }
            Ok(Some(response)) => {
                warn!(
                    "Lease {} for {endpoint_key} expired before renewal",
                    response.id()
                );
                break;
            }
            Ok(None) => {
                warn!("Keepalive stream for {endpoint_key} closed");
                break;
            }
            Err(err) => {
                warn!("Keepalive stream error for {endpoint_key}: {err}");
                break;
            }
        }
    }
}
