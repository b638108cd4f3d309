use std::time::Duration;

use agency_common::env_or;

/// Controller settings sourced from the environment. Project and location are
/// opaque deployment identifiers passed through to the Google clients.
#[derive(Clone)]
pub struct ControllerConfig {
    pub project: String,
    pub location: String,
    pub report_queue: String,
    pub audit_queue: String,
    pub report_handler_url: String,
    pub audit_handler_url: String,
    pub drain_poll: Duration,
    pub drain_max_attempts: u32,
}

impl ControllerConfig {
    pub fn from_env(project: String, location: String) -> Self {
        let report_handler_url = std::env::var("ADS_TASK_HANDLER_URL")
            .unwrap_or_else(|_| format!("http://ads-task-handler.{project}.appspot.com"));
        let audit_handler_url = std::env::var("LH_TASK_HANDLER_URL")
            .unwrap_or_else(|_| format!("http://lh-task-handler.{project}.appspot.com"));

        Self {
            report_queue: env_or("ADS_QUEUE", "ads-queue".to_string()),
            audit_queue: env_or("LH_QUEUE", "lh-queue".to_string()),
            drain_poll: Duration::from_secs(env_or("DRAIN_POLL_SECS", 30u64)),
            drain_max_attempts: env_or("DRAIN_MAX_ATTEMPTS", 240u32),
            report_handler_url,
            audit_handler_url,
            project,
            location,
        }
    }
}
