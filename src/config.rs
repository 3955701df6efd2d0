use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::credentials::{PasswordMode, PasswordSettings, SaltOrder};
use crate::error::{ImportError, ImportResult};

const DEFAULT_CONCURRENCY: usize = 10;
const DEFAULT_NOTIFY_EVERY: usize = 100;
const DEFAULT_LOG_FILE: &str = "log.csv";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Everything a run needs, loaded once before the pipeline starts.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub org_url: String,
    pub api_token: String,
    pub concurrency: usize,
    pub csv_file: PathBuf,
    pub group_id: String,
    pub notify_every: usize,
    /// Percentage of the rate limit window the run may consume before it
    /// pauses on its own. 100 disables self-throttling.
    pub throttle_percent: u8,
    pub password: PasswordSettings,
    pub activate: bool,
    /// Fixed wait after a 429. Zero means wait for the advertised reset.
    pub rate_limit_cooldown: Duration,
    pub log_file: PathBuf,
    pub request_timeout: Duration,
}

struct Lookup<F> {
    get: F,
}

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str) -> Option<String> {
        (self.get)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> ImportResult<String> {
        self.string(key)
            .ok_or_else(|| ImportError::Config(format!("{key} is required")))
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> ImportResult<T> {
        match self.string(key) {
            Some(value) => value
                .parse::<T>()
                .map_err(|_| ImportError::Config(format!("{key} has invalid value '{value}'"))),
            None => Ok(default),
        }
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.string(key)
            .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(default)
    }
}

impl ImportConfig {
    pub fn from_env() -> ImportResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(get: F) -> ImportResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Lookup { get };

        let concurrency = vars.parsed("OKTA_MAX_CONCURRENT_SESSIONS", DEFAULT_CONCURRENCY)?;
        if concurrency == 0 {
            return Err(ImportError::Config(
                "OKTA_MAX_CONCURRENT_SESSIONS must be at least 1".into(),
            ));
        }

        let throttle_percent: u8 = vars.parsed("OKTA_SPEED", 100)?;
        if throttle_percent > 100 {
            return Err(ImportError::Config("OKTA_SPEED must be between 0 and 100".into()));
        }

        let mode = match vars.string("OKTA_PASSWORD_TYPE") {
            Some(value) => PasswordMode::from_str(&value)
                .map_err(|_| ImportError::UnknownPasswordMode(value))?,
            None => PasswordMode::Empty,
        };
        let work_factor = match vars.string("OKTA_WORK_FACTOR") {
            Some(value) => Some(value.parse::<u32>().map_err(|_| {
                ImportError::Config(format!("OKTA_WORK_FACTOR has invalid value '{value}'"))
            })?),
            None => None,
        };
        let salt_order = match vars.string("OKTA_SALT_ORDER") {
            Some(value) => Some(SaltOrder::from_str(&value).map_err(|_| {
                ImportError::Config(format!("OKTA_SALT_ORDER has invalid value '{value}'"))
            })?),
            None => None,
        };

        Ok(Self {
            org_url: vars
                .required("OKTA_ORG_URL")?
                .trim_end_matches('/')
                .to_string(),
            api_token: vars.required("OKTA_API_TOKEN")?,
            concurrency,
            csv_file: vars
                .string("OKTA_IMPORT_CSV_FILE")
                .map(PathBuf::from)
                .unwrap_or_default(),
            group_id: vars.required("OKTA_GROUP_ID")?,
            notify_every: vars.parsed("OKTA_NOTIFY", DEFAULT_NOTIFY_EVERY)?,
            throttle_percent,
            password: PasswordSettings {
                mode,
                work_factor,
                salt_order,
            },
            activate: vars.bool("OKTA_ACTIVATE", false),
            rate_limit_cooldown: Duration::from_secs(
                vars.parsed("OKTA_RESET_TIME_IN_SECONDS", 0u64)?,
            ),
            log_file: vars
                .string("OKTA_IMPORT_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
            request_timeout: Duration::from_secs(
                vars.parsed("OKTA_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            ),
        })
    }

    /// Final checks once command-line overrides have been applied.
    pub fn validate(&self) -> ImportResult<()> {
        if self.csv_file.as_os_str().is_empty() {
            return Err(ImportError::Config(
                "no input file given (set OKTA_IMPORT_CSV_FILE or pass --csv-file)".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(ImportError::Config("concurrency must be at least 1".into()));
        }
        Ok(())
    }
}
