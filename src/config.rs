//! Configuration for the abuse-protection gate.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{GateError, Result};

/// Environment variable prefix for [`GateConfig::from_env`].
const ENV_PREFIX: &str = "ABUSEGATE";

/// A fixed-window request ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Window length in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// Maximum requests allowed per window.
    #[serde(default = "default_max_requests")]
    pub max_requests: i64,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            max_requests: default_max_requests(),
        }
    }
}

fn default_window_seconds() -> u64 {
    10
}

fn default_max_requests() -> i64 {
    50
}

/// A stricter (or looser) limit applied to a specific path prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathLimit {
    /// Path prefix the limit applies to.
    pub prefix: String,
    /// The limit for matching paths.
    pub limit: RateLimit,
}

/// Blocklist policy driven by observed authentication failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailurePolicy {
    /// Rolling window for counting failures, in seconds.
    #[serde(default = "default_failure_window_seconds")]
    pub window_seconds: u64,
    /// Failures within the window that trigger a block.
    #[serde(default = "default_max_failures")]
    pub max_failures: i64,
    /// Block duration in seconds once triggered.
    #[serde(default = "default_block_seconds")]
    pub block_seconds: u64,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            window_seconds: default_failure_window_seconds(),
            max_failures: default_max_failures(),
            block_seconds: default_block_seconds(),
        }
    }
}

fn default_failure_window_seconds() -> u64 {
    60
}

fn default_max_failures() -> i64 {
    15
}

fn default_block_seconds() -> u64 {
    600
}

/// Main configuration for the gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Boot-time default for whether gating is active. The runtime flag in
    /// the counter store, when set, wins over this.
    #[serde(default)]
    pub enabled: bool,

    /// Status code for blocklist and rate-limit denials.
    #[serde(default = "default_block_status")]
    pub block_status: u16,

    /// Key namespace prefix for every record the gate writes.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Path prefixes subject to gating; everything else bypasses the gate.
    #[serde(default = "default_protected_prefixes")]
    pub protected_prefixes: Vec<String>,

    /// Identities exempt from both rate limiting and blocklisting.
    #[serde(default = "default_allowlist")]
    pub allowlist: Vec<String>,

    /// Limit applied when no path override matches.
    #[serde(default)]
    pub default_limit: RateLimit,

    /// Per-path limit overrides, matched by longest prefix.
    #[serde(default = "default_overrides")]
    pub overrides: Vec<PathLimit>,

    /// Auth-failure blocklist policy.
    #[serde(default)]
    pub failure: FailurePolicy,

    /// Deadline for each counter store call, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Secret required by the administrative toggle. When unset, the toggle
    /// rejects every call.
    #[serde(default)]
    pub toggle_secret: Option<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            block_status: default_block_status(),
            namespace: default_namespace(),
            protected_prefixes: default_protected_prefixes(),
            allowlist: default_allowlist(),
            default_limit: RateLimit::default(),
            overrides: default_overrides(),
            failure: FailurePolicy::default(),
            store_timeout_ms: default_store_timeout_ms(),
            toggle_secret: None,
        }
    }
}

fn default_block_status() -> u16 {
    403
}

fn default_namespace() -> String {
    "abusegate".to_string()
}

fn default_protected_prefixes() -> Vec<String> {
    vec!["/api/auth/".to_string(), "/api/secure/".to_string()]
}

fn default_allowlist() -> Vec<String> {
    vec!["127.0.0.1".to_string(), "::1".to_string()]
}

fn default_overrides() -> Vec<PathLimit> {
    // The token endpoint attracts credential-stuffing traffic, so it gets
    // half the default ceiling out of the box.
    vec![PathLimit {
        prefix: "/api/auth/token".to_string(),
        limit: RateLimit {
            window_seconds: default_window_seconds(),
            max_requests: (default_max_requests() / 2).max(10),
        },
    }]
}

fn default_store_timeout_ms() -> u64 {
    250
}

impl GateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self> {
        info!(path = %path, "Loading gate configuration");
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| GateError::Config(format!("Failed to parse gate config: {}", e)))?;
        Ok(config.normalized())
    }

    /// Load configuration from `ABUSEGATE_*` environment variables, layered
    /// over the defaults (e.g. `ABUSEGATE_ENABLED`, `ABUSEGATE_BLOCK_STATUS`,
    /// `ABUSEGATE_DEFAULT_LIMIT__MAX_REQUESTS`).
    pub fn from_env() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&GateConfig::default()).map_err(map_config_err)?)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(map_config_err)?;

        let config: GateConfig = config.try_deserialize().map_err(map_config_err)?;
        Ok(config.normalized())
    }

    /// Coerce misconfigured values to safe minimums instead of failing.
    ///
    /// A window of zero seconds would divide by zero when computing the
    /// window index, so window lengths are clamped to at least one second.
    pub fn normalized(mut self) -> Self {
        self.default_limit = normalize_limit(self.default_limit, "default");
        for over in &mut self.overrides {
            over.limit = normalize_limit(over.limit, &over.prefix);
        }
        if self.failure.window_seconds == 0 {
            warn!("failure window of 0s coerced to 1s");
            self.failure.window_seconds = 1;
        }
        self
    }

    /// The store call deadline as a [`std::time::Duration`].
    pub fn store_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.store_timeout_ms)
    }
}

fn normalize_limit(mut limit: RateLimit, scope: &str) -> RateLimit {
    if limit.window_seconds == 0 {
        warn!(scope = %scope, "window of 0s coerced to 1s");
        limit.window_seconds = 1;
    }
    limit
}

fn map_config_err(e: config::ConfigError) -> GateError {
    GateError::Config(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();

        assert!(!config.enabled);
        assert_eq!(config.block_status, 403);
        assert_eq!(config.default_limit.window_seconds, 10);
        assert_eq!(config.default_limit.max_requests, 50);
        assert_eq!(config.failure.max_failures, 15);
        assert_eq!(config.failure.block_seconds, 600);
        assert!(config
            .allowlist
            .iter()
            .any(|identity| identity == "127.0.0.1"));
        assert!(config.toggle_secret.is_none());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
enabled: true
block_status: 429
protected_prefixes:
  - /api/
default_limit:
  window_seconds: 5
  max_requests: 20
overrides:
  - prefix: /api/auth/token
    limit:
      window_seconds: 60
      max_requests: 5
failure:
  window_seconds: 30
  max_failures: 10
  block_seconds: 120
toggle_secret: s3cret
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();

        assert!(config.enabled);
        assert_eq!(config.block_status, 429);
        assert_eq!(config.protected_prefixes, vec!["/api/".to_string()]);
        assert_eq!(config.default_limit.max_requests, 20);
        assert_eq!(config.overrides.len(), 1);
        assert_eq!(config.failure.block_seconds, 120);
        assert_eq!(config.toggle_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = GateConfig::from_yaml("enabled: true").unwrap();

        assert!(config.enabled);
        assert_eq!(config.block_status, 403);
        assert_eq!(config.default_limit.max_requests, 50);
        assert_eq!(config.overrides.len(), 1);
    }

    #[test]
    fn test_zero_window_is_coerced() {
        let yaml = r#"
default_limit:
  window_seconds: 0
  max_requests: 5
failure:
  window_seconds: 0
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.default_limit.window_seconds, 1);
        assert_eq!(config.failure.window_seconds, 1);
    }

    #[test]
    fn test_invalid_yaml_is_a_config_error() {
        let result = GateConfig::from_yaml("block_status: [not a number]");

        assert!(matches!(result, Err(GateError::Config(_))));
    }

    #[test]
    fn test_default_override_is_stricter_than_default() {
        let config = GateConfig::default();
        let token_limit = &config.overrides[0];

        assert!(token_limit.prefix.starts_with("/api/auth/token"));
        assert!(token_limit.limit.max_requests < config.default_limit.max_requests);
    }
}
