use std::sync::Arc;

use crate::clients::{CredentialStore, HierarchyConnector, RunStateStore, TaskQueue, Warehouse};
use crate::config::ControllerConfig;

/// Per-process wiring. Each run loads its own credentials and run state, so
/// nothing here is mutated across requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ControllerConfig>,
    pub credentials: Arc<dyn CredentialStore>,
    pub run_state: Arc<dyn RunStateStore>,
    pub hierarchy: Arc<dyn HierarchyConnector>,
    pub queue: Arc<dyn TaskQueue>,
    pub warehouse: Arc<dyn Warehouse>,
}
