//! HTTP access to the accounting and POS systems.

pub mod accounting;
pub mod pipeline;
pub mod pos;
pub mod retry;
pub mod types;

pub use accounting::AccountingClient;
pub use pipeline::UpstreamPipeline;
pub use pos::PosClient;
pub use retry::RetryPolicy;

use crate::error::{CogsError, Result};

pub(crate) fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| CogsError::MissingEnv(name.to_string()))
}
