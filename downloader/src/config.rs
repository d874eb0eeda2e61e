//! Start-up configuration.
//!
//! | Env var                | Default                                  |
//! |------------------------|------------------------------------------|
//! | `DOWNLOADER_ADDR`      | `0.0.0.0:8501`                           |
//! | `SOLAREDGE_BASE_URL`   | `https://monitoringapi.solaredge.com`    |
//! | `OPERATOR_LOG_DIR`     | unset (no operator log file)             |
//!
//! Secrets (Bitwarden id override → env fallback):
//!
//! | Secret           | Id override var                 | Env fallback            |
//! |------------------|---------------------------------|-------------------------|
//! | API key          | `BWS_SOLAREDGE_API_KEY_ID`      | `SOLAREDGE_API_KEY`     |
//! | Usernames        | `BWS_DOWNLOADER_USERNAMES_ID`   | `DOWNLOADER_USERNAMES`  |
//! | Passwords        | `BWS_DOWNLOADER_PASSWORDS_ID`   | `DOWNLOADER_PASSWORDS`  |

use std::path::PathBuf;

use solaredge::gateway::DEFAULT_BASE_URL;
use tracing::warn;

use crate::credentials::CredentialTable;
use crate::secrets::{split_list, SecretsClient, API_KEY, PASSWORDS, USERNAMES};

pub struct Settings {
    pub bind_addr: String,
    pub base_url: String,
    /// `None` leaves the gateway unable to call anything.
    pub api_key: Option<String>,
    pub credentials: CredentialTable,
}

/// Settings that come from plain environment variables, read before tracing
/// is initialised.
#[derive(Debug, Clone)]
pub struct Env {
    pub bind_addr: String,
    pub base_url: String,
    pub operator_log_dir: Option<PathBuf>,
}

impl Env {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("DOWNLOADER_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8501".to_string()),
            base_url: std::env::var("SOLAREDGE_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            operator_log_dir: std::env::var_os("OPERATOR_LOG_DIR").map(PathBuf::from),
        }
    }
}

impl Settings {
    /// Resolve secrets. Missing secrets are logged, never fatal.
    pub async fn load(env: Env, secrets: &SecretsClient) -> Self {
        let api_key = match secrets.resolve(&API_KEY).await {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(error = %e, "every API call will fail");
                None
            }
        };

        let credentials = match (secrets.resolve(&USERNAMES).await, secrets.resolve(&PASSWORDS).await) {
            (Ok(u), Ok(p)) => CredentialTable::new(split_list(&u), split_list(&p)),
            (u, p) => {
                if let Err(e) = u.and(p) {
                    warn!(error = %e, "nobody can log in");
                }
                CredentialTable::default()
            }
        };

        Self {
            bind_addr: env.bind_addr,
            base_url: env.base_url,
            api_key,
            credentials,
        }
    }
}
