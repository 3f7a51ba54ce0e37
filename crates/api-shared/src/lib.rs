//! # API Shared
//!
//! Shared utilities and definitions for the COREP reporting APIs.
//!
//! Contains:
//! - Wire contract types (`wire` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//!
//! Used by `corep-core` to shape answers and by `api-rest` to publish them.

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
