use std::sync::Arc;

use parley_core::{FlushCoordinator, MessageService, PipelineConfig, ReactionRegistry};
use parley_db::Database;
use parley_gateway::Dispatcher;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub service: MessageService,
    pub reactions: ReactionRegistry,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
}

impl AppStateInner {
    /// Wire the core services over one database and one dispatcher.
    pub fn new(
        db: Arc<Database>,
        dispatcher: Dispatcher,
        config: &PipelineConfig,
        jwt_secret: String,
    ) -> AppState {
        let pipeline = Arc::new(FlushCoordinator::from_config(config, db.clone()));
        let service = MessageService::new(
            db.clone(),
            db.clone(),
            db.clone(),
            Arc::new(dispatcher.clone()),
            pipeline,
            config,
        );
        let reactions = ReactionRegistry::new(db.clone(), db.clone());

        Arc::new(Self {
            db,
            service,
            reactions,
            dispatcher,
            jwt_secret,
        })
    }

    pub fn pipeline(&self) -> Arc<FlushCoordinator> {
        self.service.pipeline().clone()
    }
}
