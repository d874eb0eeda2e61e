//! Credential check against the configured allow-list.

use thiserror::Error;

/// The only failure surfaced to callers, whatever the cause.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("invalid username or password")]
    InvalidCredentials,
}

impl CredentialError {
    pub fn user_message(&self) -> &'static str {
        "Invalid username or password"
    }
}

/// Parallel username/password lists; the password for `usernames[i]` is
/// `passwords[i]`.
#[derive(Clone, Default)]
pub struct CredentialTable {
    usernames: Vec<String>,
    passwords: Vec<String>,
}

impl std::fmt::Debug for CredentialTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialTable")
            .field("usernames", &self.usernames)
            .field("passwords", &format_args!("<{} redacted>", self.passwords.len()))
            .finish()
    }
}

impl CredentialTable {
    /// Usernames are stored lowercased.
    pub fn new(usernames: Vec<String>, passwords: Vec<String>) -> Self {
        if usernames.len() != passwords.len() {
            tracing::warn!(
                usernames = usernames.len(),
                passwords = passwords.len(),
                "credential lists differ in length"
            );
        }
        Self {
            usernames: usernames.into_iter().map(|u| u.to_lowercase()).collect(),
            passwords,
        }
    }

    pub fn len(&self) -> usize {
        self.usernames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usernames.is_empty()
    }

    /// Case-insensitive on the username, exact on the password.
    pub fn verify(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let username = username.to_lowercase();
        if username.is_empty() || password.is_empty() {
            return Err(CredentialError::InvalidCredentials);
        }

        let index = self
            .usernames
            .iter()
            .position(|u| *u == username)
            .ok_or(CredentialError::InvalidCredentials)?;
        match self.passwords.get(index) {
            Some(expected) if expected == password => Ok(()),
            _ => Err(CredentialError::InvalidCredentials),
        }
    }
}
