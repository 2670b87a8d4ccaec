//! etcd client factory
//!
//! Connection establishment is retried aggressively under exponential
//! backoff: in a fresh deployment the etcd infrastructure may start
//! *after* the services that need it, and requiring a particular startup
//! order would be a deployment hazard. Only failures that retrying cannot
//! fix, such as unknown hosts, abort the loop early.

use crate::config::GsrConfig;
use crate::error::{classify, classify_validation_read, Disposition, GsrError};
use crate::registry::keys;
use crate::retry::ExponentialBackoff;
use crate::tls;
use etcd_client::{Client, ConnectOptions, GetOptions};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Connect to etcd, retrying transient failures until the configured
/// connect timeout elapses.
pub(crate) async fn connect(config: &GsrConfig) -> Result<Client, GsrError> {
    let mut options = ConnectOptions::new()
        .with_connect_timeout(config.dial_timeout)
        .with_timeout(config.request_timeout)
        .with_keep_alive(Duration::from_secs(30), Duration::from_secs(10));
    if config.use_tls {
        options = options.with_tls(tls::tls_options(config)?);
    }

    info!("Connecting to etcd endpoints: {:?}", config.etcd_endpoints);
    let backoff = ExponentialBackoff::default();
    let started = Instant::now();
    let mut attempt: u32 = 0;

    loop {
        match try_connect(config, options.clone()).await {
            Ok(client) => {
                info!("Connected to etcd after {} attempt(s)", attempt + 1);
                return Ok(client);
            }
            Err((err, Disposition::Fatal)) => {
                return Err(GsrError::Connection(format!(
                    "Failed to connect to etcd: {err}"
                )));
            }
            Err((err, Disposition::Retriable)) => {
                let delay = backoff.delay(attempt);
                if started.elapsed() + delay >= config.connect_timeout {
                    return Err(GsrError::Timeout(format!(
                        "Gave up connecting to etcd after {} attempt(s) over {:.1?}: {err}",
                        attempt + 1,
                        started.elapsed()
                    )));
                }
                debug!(
                    "etcd connection attempt {} failed ({err}); retrying in {delay:?}",
                    attempt + 1
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// One connection attempt in two steps, each with its own failure rule.
///
/// The dial classifies under the general transport rule. The validation
/// read (a prefix read of the services subtree; an empty result is
/// success, a fresh deployment has no services yet) is stricter: only a
/// cancelled request or an exceeded deadline is worth retrying, anything
/// else after a successful dial is fatal.
async fn try_connect(
    config: &GsrConfig,
    options: ConnectOptions,
) -> Result<Client, (etcd_client::Error, Disposition)> {
    let mut client = Client::connect(&config.etcd_endpoints, Some(options))
        .await
        .map_err(|err| {
            let disposition = classify(&err);
            (err, disposition)
        })?;
    match client
        .get(
            keys::services_key(&config.key_prefix),
            Some(GetOptions::new().with_prefix().with_keys_only()),
        )
        .await
    {
        Ok(_) => Ok(client),
        Err(err) => {
            let disposition = classify_validation_read(&err);
            Err((err, disposition))
        }
    }
}
