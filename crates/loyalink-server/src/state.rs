use crate::config::ServerConfig;
use crate::registration::{EnrollmentWorkflow, RegistrationService};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registration: Arc<RegistrationService>,
    pub workflow: Arc<EnrollmentWorkflow>,
    pub start_time: DateTime<Utc>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn locale(&self) -> &str {
        &self.config.locale
    }
}
