//! Runtime policy: the enable flag, protected prefixes, and per-path limits.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::warn;

use crate::config::{GateConfig, RateLimit};
use crate::store::CounterStore;

/// Holds the gating policy and answers the per-request policy questions.
///
/// The configuration is an explicit object handed in at construction, never
/// process-global state. The enable flag is re-read from the store on every
/// request so an operator can flip protection during a live run without a
/// restart; everything else comes from the config snapshot.
pub struct PolicyController<S> {
    store: Arc<S>,
    config: RwLock<GateConfig>,
}

impl<S: CounterStore> PolicyController<S> {
    /// Create a controller over `store` with the given configuration.
    pub fn new(store: Arc<S>, config: GateConfig) -> Self {
        Self {
            store,
            config: RwLock::new(config),
        }
    }

    /// The store key holding the runtime enable flag.
    pub fn enabled_key(&self) -> String {
        format!("{}:enabled", self.config.read().namespace)
    }

    /// Whether gating is currently active.
    ///
    /// The runtime flag in the store wins when present; absence or a store
    /// error falls back to the boot-time default.
    pub async fn is_enabled(&self) -> bool {
        let boot_default = self.config.read().enabled;
        let key = self.enabled_key();
        match self.store.get(&key).await {
            Ok(Some(value)) => value != 0,
            Ok(None) => boot_default,
            Err(e) => {
                warn!(key = %key, error = %e, "Store error reading enable flag, using boot default");
                boot_default
            }
        }
    }

    /// Whether `path` is subject to gating at all.
    pub fn is_protected(&self, path: &str) -> bool {
        self.config
            .read()
            .protected_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }

    /// Whether `identity` is exempt from every check.
    pub fn is_allowlisted(&self, identity: &str) -> bool {
        self.config
            .read()
            .allowlist
            .iter()
            .any(|entry| entry == identity)
    }

    /// The limit for `path`: longest matching override prefix, else the
    /// default limit.
    pub fn limit_for(&self, path: &str) -> RateLimit {
        let config = self.config.read();
        config
            .overrides
            .iter()
            .filter(|over| path.starts_with(over.prefix.as_str()))
            .max_by_key(|over| over.prefix.len())
            .map(|over| over.limit)
            .unwrap_or(config.default_limit)
    }

    /// Status code for deny responses.
    pub fn block_status(&self) -> u16 {
        self.config.read().block_status
    }

    /// Key namespace for store records.
    pub fn namespace(&self) -> String {
        self.config.read().namespace.clone()
    }

    /// Replace the configuration snapshot.
    pub fn set_config(&self, config: GateConfig) {
        let mut current = self.config.write();
        *current = config;
    }

    /// The current configuration snapshot.
    pub fn config(&self) -> GateConfig {
        self.config.read().clone()
    }
}
