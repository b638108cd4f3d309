use std::sync::Arc;

use crate::clients::{CredentialStore, ReportSource, WarehouseSink};

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<dyn CredentialStore>,
    pub reports: Arc<dyn ReportSource>,
    pub sink: Arc<dyn WarehouseSink>,
}
