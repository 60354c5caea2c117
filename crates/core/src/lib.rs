//! Karachi Coffee Culture dashboard core types and utilities

pub mod types;
pub mod validation;

pub use types::{CredentialPair, Environment, SameSite};
