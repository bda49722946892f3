//! Application state.

use std::sync::Arc;

use mconv_media::Downloader;
use mconv_store::SharedStatusStore;
use mconv_worker::TaskProcessor;

use crate::config::ServiceConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub store: SharedStatusStore,
    pub processor: TaskProcessor,
}

impl AppState {
    /// Wire the processor to an already selected status store.
    pub fn new(config: ServiceConfig, store: SharedStatusStore) -> Self {
        let processor = TaskProcessor::new(config.worker_config(), store.clone());
        Self {
            config: Arc::new(config),
            store,
            processor,
        }
    }

    pub fn downloader(&self) -> &Downloader {
        self.processor.downloader()
    }
}
