//! # Credit Intake Core
//!
//! Pure observation-provenance and resolution engine for credit report
//! intake: data models, anchoring, the observation factory, the completeness
//! guard, resolution, quality assessment, the field registry and the store
//! abstraction.
//!
//! This crate contains no tokio, filesystem I/O, PDF decoding or HTTP
//! dependencies. Everything except the store trait is a pure function over
//! in-memory observations.

pub mod anchor;
pub mod completeness;
pub mod entities;
pub mod error;
pub mod models;
pub mod observation;
pub mod precedence;
pub mod quality;
pub mod registry;
pub mod resolution;
pub mod store;

pub use error::CoreError;
