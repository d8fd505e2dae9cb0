use std::sync::Arc;

use crate::cache::SummaryStore;
use crate::config::AppConfig;
use crate::services::{CodeHostService, LanguageModelService};

#[derive(Clone)]
pub struct AppContext {
    pub config: AppConfig,
    pub code_host: Arc<dyn CodeHostService>,
    pub language_model: Arc<dyn LanguageModelService>,
    pub summaries: Option<Arc<dyn SummaryStore>>,
    pub prompt_template: String,
}

impl AppContext {
    pub fn new(
        config: AppConfig,
        code_host: Arc<dyn CodeHostService>,
        language_model: Arc<dyn LanguageModelService>,
        summaries: Option<Arc<dyn SummaryStore>>,
        prompt_template: String,
    ) -> Self {
        Self {
            config,
            code_host,
            language_model,
            summaries,
            prompt_template,
        }
    }
}
