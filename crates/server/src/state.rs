use std::sync::Arc;

use services::services::{
    block_store::BlockStore, config::Config, editor::EditorSessionService,
    events::PageEvents, extractor::ContentExtractor, migration::LegacyImporter,
    storage::StorageService,
};
use tokio::sync::RwLock;

/// Shared handle to every service, cloned into each request handler.
#[derive(Clone)]
pub struct AppState {
    config: Arc<RwLock<Config>>,
    events: PageEvents,
    blocks: BlockStore,
    extractor: Arc<ContentExtractor>,
    editors: EditorSessionService,
    importer: Arc<LegacyImporter>,
    storage: StorageService,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        events: PageEvents,
        blocks: BlockStore,
        extractor: ContentExtractor,
        editors: EditorSessionService,
        importer: LegacyImporter,
        storage: StorageService,
    ) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            events,
            blocks,
            extractor: Arc::new(extractor),
            editors,
            importer: Arc::new(importer),
            storage,
        }
    }

    pub fn config(&self) -> &Arc<RwLock<Config>> {
        &self.config
    }

    pub fn events(&self) -> &PageEvents {
        &self.events
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn extractor(&self) -> &ContentExtractor {
        &self.extractor
    }

    pub fn editors(&self) -> &EditorSessionService {
        &self.editors
    }

    pub fn importer(&self) -> &LegacyImporter {
        &self.importer
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }
}
