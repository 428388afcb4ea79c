//! Lens module
//!
//! Lenses combine business logic with output formatting and are reused by
//! the CLI and the HTTP server.
//!
//! | Lens | Purpose |
//! |------|---------|
//! | `IpLens` | Registration/geolocation metadata for an address |
//! | `RelayLens` | Egress range membership, merged with metadata |
//!
//! ```rust,ignore
//! use relaycheck::lens::ip::IpLens;
//! use relaycheck::lens::relay::RelayLens;
//! ```

pub mod ip;
pub mod relay;
pub mod utils;
