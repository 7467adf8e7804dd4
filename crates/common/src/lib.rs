//! Shared plumbing for the workspace: logging initialization and
//! startup environment checks. Kept free of domain types on purpose.

pub mod env;
pub mod utils;
