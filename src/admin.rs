//! Administrative controls: the runtime enable toggle and manual unblock.
//!
//! These are operator actions, authenticated by a shared secret that is
//! separate from anything the gate itself checks. The embedding gateway
//! exposes them on an admin surface and passes the presented secret
//! through; a `Forbidden` result maps to a 403 there.

use std::sync::Arc;

use tracing::info;

use crate::error::{GateError, Result};
use crate::store::CounterStore;

/// Secret-gated administrative handle over the gate's runtime state.
pub struct AdminToggle<S> {
    store: Arc<S>,
    namespace: String,
    secret: Option<String>,
}

impl<S: CounterStore> AdminToggle<S> {
    /// Create a toggle writing under `namespace`, guarded by `secret`.
    ///
    /// With no secret configured, every call is refused. A deployment that
    /// forgets to set one gets a dead toggle, not an open one.
    pub fn new(store: Arc<S>, namespace: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            secret,
        }
    }

    fn authorize(&self, presented: Option<&str>) -> Result<()> {
        let expected = match self.secret.as_deref() {
            Some(secret) if !secret.is_empty() => secret,
            _ => {
                return Err(GateError::Forbidden(
                    "no administrative secret configured".to_string(),
                ))
            }
        };
        match presented {
            Some(got) if got == expected => Ok(()),
            _ => Err(GateError::Forbidden(
                "missing or invalid administrative secret".to_string(),
            )),
        }
    }

    /// Set the runtime enable flag, overriding the boot-time default for
    /// every worker sharing the store. The flag carries no TTL.
    pub async fn set_enabled(&self, presented: Option<&str>, enabled: bool) -> Result<()> {
        self.authorize(presented)?;
        let key = format!("{}:enabled", self.namespace);
        self.store
            .set(&key, i64::from(enabled), None)
            .await
            .map_err(GateError::Store)?;
        info!(enabled = enabled, "Runtime gating flag updated");
        Ok(())
    }

    /// Remove `identity` from the blocklist ahead of its TTL.
    pub async fn clear_block(&self, presented: Option<&str>, identity: &str) -> Result<()> {
        self.authorize(presented)?;
        let key = format!("{}:block:{}", self.namespace, identity);
        self.store.remove(&key).await.map_err(GateError::Store)?;
        info!(identity = %identity, "Block entry cleared by administrator");
        Ok(())
    }
}
