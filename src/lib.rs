//! gsr - a client-side service registry backed by etcd
//!
//! Processes link this library to publish their own network endpoints and
//! discover endpoints published by others. Each registered endpoint is a
//! key of the form `<prefix>services/<service>/<address>` bound to a
//! renewable lease: a background keepalive stream renews the lease for as
//! long as the process lives, and the store drops the key on its own when
//! the process dies. A background watch over the services subtree surfaces
//! registry changes; lookups always re-read the store, so discovery never
//! returns state older than the last range read.
//!
//! ```no_run
//! use gsr::{Endpoint, Registry};
//!
//! #[tokio::main]
//! async fn main() -> gsr::GsrResult<()> {
//!     let registry = Registry::new().await?;
//!     registry
//!         .register(&Endpoint::new("web", "192.168.1.12:8080"))
//!         .await?;
//!     for endpoint in registry.endpoints("web").await {
//!         println!("{endpoint}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod types;

mod client;
mod retry;
mod tls;

pub use config::GsrConfig;
pub use error::GsrError;
pub use registry::Registry;
pub use types::Endpoint;

/// Library version
pub const GSR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result type for registry operations
pub type GsrResult<T> = Result<T, GsrError>;
