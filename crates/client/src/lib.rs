//! Outbound HTTP implementation of the auth API boundary.
//!
//! The session crate only sees the `AuthApi` trait; everything
//! endpoint-shaped lives here.

pub mod http_api;

pub use http_api::HttpAuthApi;
