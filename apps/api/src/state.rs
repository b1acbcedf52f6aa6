use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;

use crate::config::Config;
use crate::correlation::CorrelationCache;
use crate::drafts::DraftStore;
use crate::normalizer::Normalizer;
use crate::reconcile::{PipelineStore, ProductionStore, Reconciler};
use crate::triggers::TriggerQueue;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Every store is a trait object so handlers run unchanged against the
/// in-memory fakes in tests.
#[derive(Clone)]
pub struct AppState {
    pub drafts: Arc<dyn DraftStore>,
    pub correlation: Arc<dyn CorrelationCache>,
    pub production: Arc<dyn ProductionStore>,
    pub pipeline: Arc<dyn PipelineStore>,
    pub triggers: Arc<dyn TriggerQueue>,
    pub normalizer: Normalizer,
    /// Shares the draft, production and pipeline stores above.
    pub reconciler: Reconciler,
    /// Raw document archive.
    pub s3: S3Client,
    pub config: Config,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        drafts: Arc<dyn DraftStore>,
        correlation: Arc<dyn CorrelationCache>,
        production: Arc<dyn ProductionStore>,
        pipeline: Arc<dyn PipelineStore>,
        triggers: Arc<dyn TriggerQueue>,
        normalizer: Normalizer,
        s3: S3Client,
        config: Config,
    ) -> Self {
        let reconciler = Reconciler::new(drafts.clone(), production.clone(), pipeline.clone());
        Self {
            drafts,
            correlation,
            production,
            pipeline,
            triggers,
            normalizer,
            reconciler,
            s3,
            config,
        }
    }
}
