use std::sync::Arc;

use revolve_engine::TaskRunner;
use revolve_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub runner: Arc<TaskRunner>,
    pub auth_token: Arc<String>,
}
