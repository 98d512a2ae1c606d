//! Incoming benchmark requests and their authentication

use crate::error::RequestError;
use crate::storage::Visibility;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Body of `POST /benchmark`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkRequest {
    pub git_repo_url: String,
    #[serde(default)]
    pub alert_emails: Vec<String>,
    #[serde(default)]
    pub secret: String,
    #[serde(default)]
    pub public: bool,
}

static SEGMENT: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
static ADDRESS: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn pattern_matches(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
    text: &str,
) -> bool {
    match cell.get_or_init(|| Regex::new(pattern)) {
        Ok(re) => re.is_match(text),
        Err(_) => false,
    }
}

/// A repository reference is used verbatim as an object-key prefix, so it
/// must be a relative path of plain segments.
pub fn is_safe_repository(repository: &str) -> bool {
    !repository.is_empty()
        && !repository.starts_with('/')
        && repository.split('/').all(|segment| {
            segment != "."
                && segment != ".."
                && pattern_matches(&SEGMENT, r"^[A-Za-z0-9._-]+$", segment)
        })
}

/// Every recipient, trimmed, must look like `local@domain`
pub fn validate_recipients(emails: &[String]) -> Result<(), RequestError> {
    match emails
        .iter()
        .find(|email| !pattern_matches(&ADDRESS, r"^[^@\s]+@[^@\s]+$", email.trim()))
    {
        Some(email) => Err(RequestError::InvalidRecipient(email.clone())),
        None => Ok(()),
    }
}

impl BenchmarkRequest {
    pub fn repository(&self) -> &str {
        self.git_repo_url.trim()
    }

    pub fn visibility(&self) -> Visibility {
        Visibility::from(self.public)
    }

    pub fn recipients(&self) -> Vec<String> {
        self.alert_emails.iter().map(|e| e.trim().to_string()).collect()
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        let repository = self.repository();
        if repository.is_empty() {
            return Err(RequestError::MissingRepository);
        }
        if !is_safe_repository(repository) {
            return Err(RequestError::UnsafeRepository(repository.to_string()));
        }

        if self.alert_emails.is_empty() {
            return Err(RequestError::NoRecipients);
        }
        validate_recipients(&self.alert_emails)
    }
}

/// Lowercase hex SHA-256 of `secret`
pub fn secret_digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Checks request secrets against per-repository SHA-256 digests
#[derive(Debug, Clone, Default)]
pub struct SecretVerifier {
    digests: BTreeMap<String, String>,
    require_secret: bool,
}

impl SecretVerifier {
    pub fn new(digests: BTreeMap<String, String>, require_secret: bool) -> Self {
        let digests = digests
            .into_iter()
            .map(|(repo, digest)| (repo, digest.to_ascii_lowercase()))
            .collect();
        Self {
            digests,
            require_secret,
        }
    }

    /// Whether `secret` authorizes a run for `repository`
    ///
    /// Repositories without a stored digest are accepted unless
    /// `require_secret` is set.
    pub fn verify(&self, repository: &str, secret: &str) -> bool {
        match self.digests.get(repository) {
            Some(expected) => constant_time_eq(
                secret_digest(secret).as_bytes(),
                expected.as_bytes(),
            ),
            None => !self.require_secret,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
