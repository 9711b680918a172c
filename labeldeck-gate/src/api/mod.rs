//! HTTP API handlers for labeldeck-gate
//!
//! Thin layer over the core services. Every route except `/health` needs a
//! [`Principal`](crate::access::Principal), resolved by [`principal`].

pub mod anr;
pub mod artists;
pub mod exports;
pub mod health;
pub mod integrations;
pub mod principal;

pub use anr::anr_routes;
pub use artists::artist_routes;
pub use exports::export_routes;
pub use health::health_routes;
pub use integrations::integration_routes;
