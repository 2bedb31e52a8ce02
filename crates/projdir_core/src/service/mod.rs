//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep the HTTP layer decoupled from storage details.
//!
//! Services are generic over repository traits so tests can inject fakes.

pub mod engagement_service;
pub mod identity_service;
pub mod project_service;
