//! Application constants
//!
//! Centralized location for magic strings and configuration defaults.

/// Default base URL of the medical record API
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Environment variable that overrides the base URL
pub const BASE_URL_ENV: &str = "PRONTUI_BASE_URL";

/// Application name
#[allow(dead_code)]
pub const APP_NAME: &str = "Prontui";

/// Application version
#[allow(dead_code)]
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Resolve the API base URL from the environment, falling back to the default
pub fn base_url() -> String {
    std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string())
}
