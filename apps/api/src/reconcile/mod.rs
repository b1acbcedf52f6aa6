//! Reconciler: promotes reviewed drafts into the production résumé store and
//! links them into the recruiting pipeline.
//!
//! Fields cross from draft to production only through the allow-lists in
//! `field_map`. The production insert is one transaction; the pipeline link
//! is a separate step whose failure is reported with the created id and never
//! undoes the insert.

pub mod field_map;
pub mod handlers;
pub mod pipeline;
pub mod production;
pub mod reconciler;

pub use pipeline::{PgPipelineStore, PipelineStore};
pub use production::{PgProductionStore, ProductionStore};
pub use reconciler::{ReconcileError, Reconciler};
