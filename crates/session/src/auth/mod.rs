//! Auth module: domain states, collaborator boundaries, and the session
//! controller.
//!
//! This module centralizes login, registration and logout state handling
//! under the session crate.

pub mod api;
pub mod controller;
pub mod domain;
pub mod errors;
pub mod store;

pub use controller::AuthSessionController;
