//! Configuration for the identity verification demo.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;

/// Demo configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Where users land once verification is complete
    pub final_url: String,
    /// Where the cancel action sends users
    pub cancel_url: String,
    /// Log filter (trace, debug, info, warn, error)
    pub log_level: String,
}

impl DemoConfig {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            host: env::var("WAYPOINT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("WAYPOINT_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3000),
            final_url: env::var("WAYPOINT_FINAL_URL").unwrap_or_else(|_| "/account".to_string()),
            cancel_url: env::var("WAYPOINT_CANCEL_URL")
                .unwrap_or_else(|_| "https://www.example.gov/account".to_string()),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| {
                "identity_verification=info,waypoint_web=info,waypoint_core=info".to_string()
            }),
        }
    }

    /// Socket address to bind, `host:port`.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            final_url: "/account".to_string(),
            cancel_url: "https://www.example.gov/account".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = DemoConfig {
            port: 8081,
            ..DemoConfig::default()
        };

        assert_eq!(config.bind_addr(), "127.0.0.1:8081");
    }
}
