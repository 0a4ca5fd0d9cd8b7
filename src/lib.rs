pub mod allocation;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod flow;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{AllocationError, Result};

/// Install the default tracing subscriber for hosts that have none.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fairshare=debug,info".into()),
        )
        .init();
}
