//! Public data types for the registry

use serde::{Deserialize, Serialize};
use std::fmt;

/// A network-reachable address under which a service instance accepts
/// requests.
///
/// The service name is the discovery key; the address is an opaque
/// `host:port` string. Neither may be empty or contain `/`. All semantic
/// data rides in the registry key itself, so endpoints carry nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Name of the service class this endpoint belongs to.
    pub service: String,

    /// Opaque `host:port` address.
    pub address: String,
}

impl Endpoint {
    /// Create an endpoint descriptor for a service name and address.
    pub fn new(service: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_service_and_address() {
        let endpoint = Endpoint::new("web", "192.168.1.12:80");
        assert_eq!(endpoint.to_string(), "web/192.168.1.12:80");
    }

    #[test]
    fn endpoints_compare_by_value() {
        let a = Endpoint::new("web", "10.0.0.1:80");
        let b = Endpoint::new("web", "10.0.0.1:80");
        assert_eq!(a, b);
    }
}
