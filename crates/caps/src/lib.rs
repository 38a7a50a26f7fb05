//! Client capability advertisement for the micro HTTP client.
//!
//! A capability names something this client can do, with a version and
//! a value, advertised to the server as `X-Client-Capability` request
//! headers. Capabilities are registered programmatically or loaded from
//! `name(version)=value` declarations in a configuration directory.
//!
//! # Example
//!
//! ```
//! use micro_client_caps::{Capability, CapabilityRegistry};
//!
//! let mut registry = CapabilityRegistry::new();
//! registry.register(
//!     "packages.rollBack",
//!     Capability { version: "1".to_string(), value: "1".to_string() },
//! );
//!
//! let headers = registry.header_entries().unwrap();
//! assert_eq!(headers[0].1, "packages.rollBack(1)=1");
//! ```

mod error;
mod registry;

pub use error::CapsError;
pub use registry::{CAPABILITY_HEADER, Capability, CapabilityRegistry};
