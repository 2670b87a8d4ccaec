//! Watch stream drain for the services subtree
//!
//! One subscription per registry handle covers the whole services prefix.
//! Change events are surfaced at debug verbosity only; lookups re-read the
//! store on demand, so no state is maintained here. If the stream ends the
//! task exits and change events stop until the handle is rebuilt.

use crate::registry::keys;
use etcd_client::{Event, EventType, WatchStream};
use tracing::{debug, warn};

/// Drain the watch stream until it ends or errors.
pub(crate) async fn drain(mut stream: WatchStream, key_prefix: String) {
    loop {
        match stream.message().await {
            Ok(Some(response)) => {
                let revision = response.header().map(|h| h.revision()).unwrap_or(0);
                for event in response.events() {
                    handle_event(event, &key_prefix, revision);
                }
            }
            Ok(None) => {
                warn!(
                    "Watch stream for {} closed; registry change events suspended",
                    keys::services_key(&key_prefix)
                );
                break;
            }
            Err(err) => {
                warn!("Watch stream error: {err}; registry change events suspended");
                break;
            }
        }
    }
}

fn handle_event(event: &Event, key_prefix: &str, revision: i64) {
    let kv = match event.kv() {
        Some(kv) => kv,
        None => return,
    };
    let key = match kv.key_str() {
        Ok(key) => key,
        Err(_) => return,
    };
    let (service, address) = match keys::parts_from_key(key_prefix, key) {
        Some(parts) => parts,
        None => {
            debug!("Ignoring change event for foreign key {key}");
            return;
        }
    };
    match event.event_type() {
        EventType::Put => {
            debug!("Endpoint {address} registered for service {service} (revision {revision})");
        }
        EventType::Delete => {
            debug!("Endpoint {address} removed from service {service} (revision {revision})");
        }
    }
}
