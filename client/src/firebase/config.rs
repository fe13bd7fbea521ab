//! Firebase project configuration loaded from environment.

/// Connection settings shared by the Firebase adapters.
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    /// Web API key.
    pub api_key: String,
    /// Project id, e.g. `nube-demo`.
    pub project_id: String,
    /// App id used when registering installations. Optional — only needed
    /// for device token issuance.
    pub app_id: Option<String>,
    /// VAPID public key for web push token issuance.
    pub vapid_key: Option<String>,
}

impl FirebaseConfig {
    /// Load from `FIREBASE_API_KEY`, `FIREBASE_PROJECT_ID`,
    /// `FIREBASE_APP_ID`, `FIREBASE_VAPID_KEY`.
    /// Returns `None` if the required values are missing.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("FIREBASE_API_KEY").ok()?;
        let project_id = std::env::var("FIREBASE_PROJECT_ID").ok()?;
        let app_id = std::env::var("FIREBASE_APP_ID").ok();
        let vapid_key = std::env::var("FIREBASE_VAPID_KEY").ok();
        Some(Self { api_key, project_id, app_id, vapid_key })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
