//! Secret resolution for the API key and the credential table.
//!
//! Each secret is looked up in Bitwarden Secrets Manager when
//! `BWS_ACCESS_TOKEN` is set, and in a plain environment variable otherwise
//! or when the vault has no usable answer.

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum SecretError {
    #[error("{name} is not configured (vault id '{vault_id}', env var '{env_var}')")]
    Unset {
        name: &'static str,
        vault_id: String,
        env_var: &'static str,
    },
}

/// Where one secret may live.
#[derive(Debug, Clone, Copy)]
pub struct SecretRef {
    /// Human-readable name used in logs.
    pub name: &'static str,
    /// Env var that overrides `vault_id`.
    pub vault_id_var: &'static str,
    pub vault_id: &'static str,
    /// Env var read when the vault is unavailable.
    pub env_var: &'static str,
}

pub const API_KEY: SecretRef = SecretRef {
    name: "API key",
    vault_id_var: "BWS_SOLAREDGE_API_KEY_ID",
    vault_id: "solaredge-api-key",
    env_var: "SOLAREDGE_API_KEY",
};

pub const USERNAMES: SecretRef = SecretRef {
    name: "username list",
    vault_id_var: "BWS_DOWNLOADER_USERNAMES_ID",
    vault_id: "downloader-usernames",
    env_var: "DOWNLOADER_USERNAMES",
};

pub const PASSWORDS: SecretRef = SecretRef {
    name: "password list",
    vault_id_var: "BWS_DOWNLOADER_PASSWORDS_ID",
    vault_id: "downloader-passwords",
    env_var: "DOWNLOADER_PASSWORDS",
};

#[derive(Deserialize)]
struct VaultSecret {
    value: String,
}

pub struct SecretsClient {
    access_token: Option<String>,
    api_url: String,
    http: reqwest::Client,
}

impl SecretsClient {
    /// Reads `BWS_ACCESS_TOKEN` and `BWS_API_URL` from the environment.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("BWS_ACCESS_TOKEN").ok(),
            std::env::var("BWS_API_URL").unwrap_or_else(|_| "https://api.bitwarden.com".to_string()),
        )
    }

    pub fn new(access_token: Option<String>, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            api_url: api_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub async fn resolve(&self, secret: &SecretRef) -> Result<String, SecretError> {
        let vault_id = std::env::var(secret.vault_id_var)
            .unwrap_or_else(|_| secret.vault_id.to_string());

        if let Some(value) = self.from_vault(secret.name, &vault_id).await {
            return Ok(value);
        }

        match std::env::var(secret.env_var) {
            Ok(value) => {
                debug!(secret = secret.name, source = secret.env_var, "secret read from environment");
                Ok(value)
            }
            Err(_) => Err(SecretError::Unset {
                name: secret.name,
                vault_id,
                env_var: secret.env_var,
            }),
        }
    }

    /// `None` when no token is configured or the vault lookup failed.
    async fn from_vault(&self, name: &str, vault_id: &str) -> Option<String> {
        let token = self.access_token.as_deref()?;
        let url = format!("{}/secrets/{}", self.api_url, vault_id);

        let lookup = async {
            self.http
                .get(&url)
                .bearer_auth(token)
                .send()
                .await?
                .error_for_status()?
                .json::<VaultSecret>()
                .await
        };

        match lookup.await {
            Ok(secret) => Some(secret.value),
            Err(e) => {
                let e = e.without_url();
                warn!(secret = name, vault_id, error = %e, "vault lookup failed");
                None
            }
        }
    }
}

/// Split a comma-separated secret into entries, keeping positions so that
/// parallel lists stay aligned.
pub fn split_list(value: &str) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }
    value.split(',').map(|s| s.trim().to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn unset(name: &'static str) -> SecretRef {
        SecretRef {
            name,
            vault_id_var: "TEST_UNSET_VAULT_ID_OVERRIDE",
            vault_id: "test-secret",
            env_var: "TEST_UNSET_SECRET_FALLBACK",
        }
    }

    #[test]
    fn split_list_trims_and_keeps_positions() {
        assert_eq!(split_list(" alice, ,bob "), vec!["alice", "", "bob"]);
    }

    #[test]
    fn split_list_of_blank_is_empty() {
        assert!(split_list("  ").is_empty());
    }

    #[tokio::test]
    async fn vault_value_is_used_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/secrets/test-secret"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"value": "from-vault"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = SecretsClient::new(Some("tok".into()), format!("{}/", server.uri()));
        assert_eq!(client.resolve(&unset("token test")).await.unwrap(), "from-vault");
    }

    #[tokio::test]
    async fn vault_error_without_env_is_unset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = SecretsClient::new(Some("tok".into()), server.uri());
        let err = client.resolve(&unset("missing")).await.unwrap_err();
        assert_eq!(
            err,
            SecretError::Unset {
                name: "missing",
                vault_id: "test-secret".into(),
                env_var: "TEST_UNSET_SECRET_FALLBACK",
            }
        );
    }

    #[tokio::test]
    async fn blank_token_skips_the_vault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = SecretsClient::new(Some("  ".into()), server.uri());
        assert!(client.resolve(&unset("no token")).await.is_err());
    }
}
