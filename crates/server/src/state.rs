use std::sync::Arc;

use veridoc_analysis::{FieldExtractor, RiskAnalyzer};
use veridoc_core::Config;
use veridoc_storage::AnalysisStore;

use crate::jobs::JobRegistry;

pub struct AppState {
    pub config: Config,
    pub store: Arc<AnalysisStore>,
    /// Document-understanding service; optional so deployments without one
    /// still produce risk reports (with no structured fields).
    pub extractor: Option<Arc<dyn FieldExtractor>>,
    pub analyzer: Arc<RiskAnalyzer>,
    pub jobs: JobRegistry,
}
