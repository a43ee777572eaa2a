//! # MedForms Core
//!
//! Editing logic for the medical record and Form №100.
//!
//! This crate contains the in-memory side of a form session:
//! - Form schemas, field stores and date handling (`fields`)
//! - Card number → registration number synchronisation (`sync`)
//! - Document switching and the medical record → Form №100 merge (`selector`)
//! - Template save/list/apply/delete (`templates`)
//! - The session controller that ties them to a persistence service and a display
//!   surface (`controller`)
//!
//! **No storage or transport**: files live in `medforms-store`, HTTP in `api-rest`. This
//! crate only talks to them through the [`PersistenceService`] trait.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod fields;
pub mod persistence;
pub mod presentation;
pub mod selector;
pub mod session;
pub mod signature;
pub mod sync;
pub mod templates;
pub mod validation;

#[cfg(test)]
pub(crate) mod testing;

pub use config::CoreConfig;
pub use controller::FormsController;
pub use error::{FormsError, FormsResult};
pub use fields::{DocumentType, FieldStore, Form, FormSchema};
pub use persistence::PersistenceService;
pub use presentation::{MessageKind, PresentationSurface};
pub use selector::{Activation, DocumentTypeSelector, FormReady, MergeOutcome, MergeReport};
pub use session::DocumentSession;
pub use sync::{FieldFlags, FieldRef, FieldSynchronizer, SyncOutcome};
pub use templates::{ApplyReport, Template, TemplateEngine, TemplateId};
