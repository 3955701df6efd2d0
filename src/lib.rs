pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod okta;
pub mod payload;
pub mod pipeline;
pub mod schema;
pub mod test_support;

pub use config::ImportConfig;
pub use error::{ApiError, ImportError, ImportResult};
pub use okta::{OktaClient, UserApi};
pub use pipeline::{ImportRun, RunSummary};

use env_logger::Env;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}
