//! Abusegate - Abuse-Protection Gate for API Gateways
//!
//! This crate implements the request-gating layer of an API gateway: on
//! every inbound request it decides whether the request may proceed, must
//! be throttled, or must be blocked outright. Requests are counted per
//! client identity and path in fixed time windows, and repeated
//! authentication failures promote an identity into a TTL-bounded
//! blocklist. All cross-worker state lives in a shared counter store
//! reached through the [`store::CounterStore`] trait, so any number of
//! worker processes enforce one global policy; every store failure
//! degrades to allowing the request rather than taking the protected API
//! down with it.

pub mod admin;
pub mod config;
pub mod error;
pub mod gate;
pub mod metrics;
pub mod request;
pub mod store;
