use std::time::Duration;

/// Default base URL of the room/account service.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// Default origin of the web app, used when building shareable links.
pub const DEFAULT_APP_URL: &str = "http://localhost:5173";

/// Collaborator service configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL the `/api/...` paths are appended to.
    pub base_url: String,
    /// Origin used for room links handed to other participants.
    pub app_url: String,
    /// Optional request timeout.
    pub timeout: Option<Duration>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            app_url: DEFAULT_APP_URL.to_string(),
            timeout: None,
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = app_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
