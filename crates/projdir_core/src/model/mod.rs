//! Domain records shared by repositories, services and the HTTP surface.
//!
//! # Invariants
//! - Every record is identified by a store-assigned UUID.
//! - Serialized field names are camelCase to match the public JSON API.

pub mod account;
pub mod project;
