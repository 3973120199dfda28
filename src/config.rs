//! Configuration types for sage-extract

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default Sage Intacct XML gateway endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.intacct.com/ia/xml/xmlgw.phtml";

/// Gateway credentials and request policy
///
/// Credential fields map 1:1 to the `SAGE_*` environment variables read by
/// [`Config::from_env`]. All five credentials are required; absence of any
/// is a startup-time configuration error.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SageConfig {
    /// Company id for the web services login
    pub company_id: String,

    /// User id for the web services login
    pub user_id: String,

    /// Password for the web services user
    pub user_password: String,

    /// Sender id carried in every request's control block
    pub sender_id: String,

    /// Password for the sender id
    pub sender_password: String,

    /// Gateway endpoint URL (default: the production Intacct gateway)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Records per page for `readByQuery` (default: 1000)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Per-attempt request timeout in seconds (default: 600)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Total send attempts on connection-level failure (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl SageConfig {
    /// Per-attempt request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Durable storage layout for extracted pages
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory (or filesystem/container name) pages are written under
    /// (default: "landing-zone")
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Collection prefix inside the root under which entity directories live
    /// (default: "Sage_Intacct/data_download")
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            collection: default_collection(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Gateway credentials and request policy
    pub sage: SageConfig,
    /// Durable storage layout
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from process environment variables.
    ///
    /// Required: `SAGE_COMPANY_ID`, `SAGE_USER_ID`, `SAGE_USER_PASSWORD`,
    /// `SAGE_SENDER_ID`, `SAGE_SENDER_PASSWORD`.
    /// Optional: `SAGE_ENDPOINT`, `SAGE_STORAGE_ROOT`, `SAGE_STORAGE_COLLECTION`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an injected variable lookup.
    ///
    /// [`Config::from_env`] is this with [`std::env::var`]; tests inject a
    /// map-backed closure instead of mutating the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::Config {
                    message: format!("required environment variable {key} is not set"),
                    key: Some(key.to_string()),
                })
        };

        let sage = SageConfig {
            company_id: require("SAGE_COMPANY_ID")?,
            user_id: require("SAGE_USER_ID")?,
            user_password: require("SAGE_USER_PASSWORD")?,
            sender_id: require("SAGE_SENDER_ID")?,
            sender_password: require("SAGE_SENDER_PASSWORD")?,
            endpoint: lookup("SAGE_ENDPOINT").unwrap_or_else(default_endpoint),
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            max_attempts: default_max_attempts(),
        };

        let storage = StorageConfig {
            root: lookup("SAGE_STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(default_storage_root),
            collection: lookup("SAGE_STORAGE_COLLECTION").unwrap_or_else(default_collection),
        };

        Ok(Self { sage, storage })
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_page_size() -> u32 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_max_attempts() -> u32 {
    3
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("landing-zone")
}

fn default_collection() -> String {
    "Sage_Intacct/data_download".to_string()
}
