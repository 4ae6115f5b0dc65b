//! Request gating: policy, rate limiting, blocklisting, and orchestration.

mod limiter;
mod pipeline;
mod policy;
mod tracker;

pub use limiter::{Admission, CountPath, WindowCheck, WindowRateLimiter};
pub use pipeline::{Gate, Handler};
pub use policy::PolicyController;
pub use tracker::{AuthFailureTracker, FailureRecord};
