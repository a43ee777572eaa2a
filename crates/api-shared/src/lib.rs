//! # API Shared
//!
//! Request and response bodies exchanged between the form controller and a
//! persistence backend.
//!
//! Contains:
//! - JSON wire types (`wire` module), also used for the OpenAPI schema
//! - Shared services like `HealthService`
//!
//! Used by `medforms-core` (client side of the persistence seam), `medforms-store`
//! (the file-backed implementation) and `api-rest` (the HTTP surface).

pub mod health;
pub mod wire;

pub use health::HealthService;
pub use wire::*;
