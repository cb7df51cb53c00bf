//! # Credit Intake
//!
//! Ingestion, storage and HTTP surfaces for the credit report observation
//! engine in [`credit_intake_core`].
//!
//! A PDF upload becomes one ingestion run: page text is extracted and
//! normalised, document facts and page diagnostics are recorded, identity
//! fields are parsed heuristically, and the completeness guard fills every
//! required field that produced nothing. The run's observations are appended
//! to the document's history, which is never rewritten. Resolved profiles,
//! quality reports and entity summaries are recomputed from that history on
//! every read.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────────┐   ┌────────────────┐
//! │ PDF bytes│──▶│ extract/identity │──▶│ JSON dir store │
//! └──────────┘   │ + observations   │   │ (append-only)  │
//!                └──────────────────┘   └───────┬────────┘
//!                                               │
//!                           ┌───────────────────┤
//!                           ▼                   ▼
//!                      ┌──────────┐       ┌──────────┐
//!                      │   CLI    │       │   HTTP   │
//!                      │ (intake) │       │  (axum)  │
//!                      └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | Per-page PDF text extraction and diagnostics |
//! | [`bureau`] | Bureau detection |
//! | [`identity`] | Heuristic name and address parser |
//! | [`inquiry`] | Credit inquiry parser |
//! | [`ingest`] | Upload pipeline producing one ingestion run |
//! | [`store_fs`] | JSON directory observation store |
//! | [`documents`] | Read-side views shared by CLI and server |
//! | [`server`] | HTTP server |

pub mod bureau;
pub mod config;
pub mod documents;
pub mod extract;
pub mod identity;
pub mod ingest;
pub mod inquiry;
pub mod server;
pub mod store_fs;
