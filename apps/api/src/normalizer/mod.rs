//! Normalizer Client: turns a raw résumé document into a `NormalizedRecord`
//! through the external extraction service, plus the intake endpoints that
//! stage the result as a draft.

pub mod client;
pub mod handlers;
pub mod liepin;
pub mod mapping;
pub mod schedule;

pub use client::{NormalizeError, Normalizer, NormalizerConfig};
