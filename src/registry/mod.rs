//! The registry handle: endpoint lifecycle and discovery queries

pub(crate) mod keys;

mod heartbeat;
mod watch;

use crate::client;
use crate::config::GsrConfig;
use crate::error::GsrError;
use crate::types::Endpoint;
use crate::GsrResult;
use etcd_client::{
    Client, Compare, CompareOp, GetOptions, PutOptions, SortOrder, SortTarget, Txn, TxnOp,
    WatchOptions, Watcher,
};
use heartbeat::Heartbeat;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tonic::Code;
use tracing::{debug, info, warn};

/// Process-wide handle onto the service registry.
///
/// The handle owns the etcd client, one background task draining the watch
/// stream over the services subtree, and one keepalive task per endpoint
/// registered through it. Registered endpoints stay visible to other
/// processes for as long as their leases are renewed; when this process
/// dies, the leases expire and the store drops the keys on its own.
pub struct Registry {
    config: GsrConfig,
    client: Client,
    heartbeats: Arc<RwLock<HashMap<String, Heartbeat>>>,
    watcher: Watcher,
    watch_task: JoinHandle<()>,
}

impl Registry {
    /// Construct a handle with configuration resolved from `GSR_*`
    /// environment variables: connect to etcd and subscribe to registry
    /// changes.
    pub async fn new() -> GsrResult<Self> {
        Self::with_config(GsrConfig::from_env()).await
    }

    /// Construct a handle from an explicit configuration.
    pub async fn with_config(config: GsrConfig) -> GsrResult<Self> {
        let client = client::connect(&config).await?;

        let services_key = keys::services_key(&config.key_prefix);
        let mut watch_client = client.clone();
        let (watcher, stream) = watch_client
            .watch(
                services_key.as_str(),
                Some(WatchOptions::new().with_prefix()),
            )
            .await
            .map_err(|err| {
                GsrError::Watch(format!("Failed to subscribe to {services_key}: {err}"))
            })?;
        let watch_task = tokio::spawn(watch::drain(stream, config.key_prefix.clone()));
        info!("Watching registry changes under {services_key}");

        Ok(Self {
            config,
            client,
            heartbeats: Arc::new(RwLock::new(HashMap::new())),
            watcher,
            watch_task,
        })
    }

    /// Register an endpoint.
    ///
    /// Grants a lease with the configured TTL, writes the endpoint key
    /// bound to it when no writer holds the key yet, and starts a
    /// keepalive stream renewing the lease until `unregister` or handle
    /// shutdown. Re-registering an endpoint whose heartbeat is still
    /// running is a no-op; losing the write race to a concurrent process
    /// is not an error, since the winner keeps the key alive.
    pub async fn register(&self, endpoint: &Endpoint) -> GsrResult<()> {
        validate_endpoint(endpoint)?;
        let key = keys::endpoint_key(&self.config.key_prefix, &endpoint.service, &endpoint.address);

        {
            let heartbeats = self.heartbeats.read().await;
            if let Some(existing) = heartbeats.get(&key) {
                if !existing.task.is_finished() {
                    debug!(
                        "Endpoint {endpoint} already registered (lease {}, renewed {:.1?} ago)",
                        existing.lease_id,
                        existing.last_renewal_age()
                    );
                    return Ok(());
                }
            }
        }

        let mut client = self.client.clone();
        let grant = client
            .lease_grant(self.config.lease_seconds, None)
            .await
            .map_err(|err| GsrError::Lease(format!("Failed to grant lease for {endpoint}: {err}")))?;
        let lease_id = grant.id();

        let txn = Txn::new()
            .when(vec![Compare::version(key.as_str(), CompareOp::Equal, 0)])
            .and_then(vec![TxnOp::put(
                key.as_str(),
                "",
                Some(PutOptions::new().with_lease(lease_id)),
            )]);
        let committed = client.txn(txn).await.map_err(|err| {
            GsrError::Registration(format!("Transaction failed writing {key}: {err}"))
        })?;
        if !committed.succeeded() {
            // A concurrent writer owns the key. The unused lease has no
            // keys bound to it and expires on its own within one TTL.
            warn!(
                "Endpoint {endpoint} already registered by another writer; leaving lease {lease_id} to expire"
            );
            return Ok(());
        }

        let (keeper, stream) = client.lease_keep_alive(lease_id).await.map_err(|err| {
            GsrError::Lease(format!("Failed to open keepalive for lease {lease_id}: {err}"))
        })?;
        let heartbeat =
            Heartbeat::spawn(keeper, stream, self.config.lease_seconds, key.clone());

        let mut heartbeats = self.heartbeats.write().await;
        if let Some(stale) = heartbeats.insert(key.clone(), heartbeat) {
            stale.task.abort();
        }
        info!("Registered endpoint {endpoint} under {key} (lease {lease_id})");
        Ok(())
    }

    /// Unregister an endpoint previously registered through this handle.
    ///
    /// Revokes the lease, which deletes the key atomically and fans a
    /// delete event out to all watchers. Unregistering an endpoint this
    /// handle does not know is a no-op.
    pub async fn unregister(&self, endpoint: &Endpoint) -> GsrResult<()> {
        let key = keys::endpoint_key(&self.config.key_prefix, &endpoint.service, &endpoint.address);
        let heartbeat = match self.heartbeats.write().await.remove(&key) {
            Some(heartbeat) => heartbeat,
            None => {
                debug!("Endpoint {endpoint} not registered with this handle");
                return Ok(());
            }
        };
        heartbeat.task.abort();

        let mut client = self.client.clone();
        match client.lease_revoke(heartbeat.lease_id).await {
            Ok(_) => {
                info!(
                    "Unregistered endpoint {endpoint} (revoked lease {})",
                    heartbeat.lease_id
                );
                Ok(())
            }
            Err(etcd_client::Error::GRpcStatus(status)) if status.code() == Code::NotFound => {
                debug!(
                    "Lease {} for {endpoint} already expired",
                    heartbeat.lease_id
                );
                Ok(())
            }
            Err(err) => Err(GsrError::Deregistration(format!(
                "Failed to revoke lease {} for {endpoint}: {err}",
                heartbeat.lease_id
            ))),
        }
    }

    /// Current endpoints for a named service, sorted by (service, address).
    ///
    /// The empty service name returns the union across all services.
    /// Discovery is best-effort: transport failures are logged and yield
    /// an empty list rather than an error.
    pub async fn endpoints(&self, service: &str) -> Vec<Endpoint> {
        let prefix = if service.is_empty() {
            keys::services_key(&self.config.key_prefix)
        } else {
            keys::service_key(&self.config.key_prefix, service)
        };
        let options = GetOptions::new()
            .with_prefix()
            .with_sort(SortTarget::Key, SortOrder::Ascend)
            .with_keys_only();

        let mut client = self.client.clone();
        let response = match client.get(prefix.as_str(), Some(options)).await {
            Ok(response) => response,
            Err(err) => {
                warn!("Failed to read endpoints under {prefix}: {err}");
                return Vec::new();
            }
        };

        let mut endpoints = Vec::with_capacity(response.kvs().len());
        for kv in response.kvs() {
            let key = match kv.key_str() {
                Ok(key) => key,
                Err(_) => continue,
            };
            if let Some((service, address)) = keys::parts_from_key(&self.config.key_prefix, key) {
                endpoints.push(Endpoint::new(service, address));
            }
        }
        endpoints
    }

    /// The immutable configuration this handle was constructed with.
    pub fn config(&self) -> &GsrConfig {
        &self.config
    }

    /// Shut the handle down: close all heartbeat streams and cancel the
    /// watch subscription. Keys registered through this handle disappear
    /// once their leases expire, at most one TTL later.
    pub async fn close(mut self) {
        let mut heartbeats = self.heartbeats.write().await;
        for (key, heartbeat) in heartbeats.drain() {
            heartbeat.task.abort();
            debug!("Closed heartbeat stream for {key}");
        }
        drop(heartbeats);

        if let Err(err) = self.watcher.cancel().await {
            debug!("Watch cancel failed during close: {err}");
        }
        self.watch_task.abort();
        info!("Registry handle closed");
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.watch_task.abort();
        if let Ok(mut heartbeats) = self.heartbeats.try_write() {
            for (_, heartbeat) in heartbeats.drain() {
                heartbeat.task.abort();
            }
        }
    }
}

fn validate_endpoint(endpoint: &Endpoint) -> GsrResult<()> {
    if endpoint.service.is_empty() || endpoint.service.contains('/') {
        return Err(GsrError::Validation(format!(
            "Invalid service name {:?}: must be non-empty and contain no '/'",
            endpoint.service
        )));
    }
    if endpoint.address.is_empty() || endpoint.address.contains('/') {
        return Err(GsrError::Validation(format!(
            "Invalid endpoint address {:?}: must be non-empty and contain no '/'",
            endpoint.address
        )));
    }
    Ok(())
}
