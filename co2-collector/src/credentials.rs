//! API credentials and round-robin rotation.
//!
//! co2signal allows 30 requests per hour per token, so the collector spreads
//! its requests over every loaded token. Rotation ignores whether the
//! previous request succeeded.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// One API token and the user it was issued to.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(rename = "user")]
    pub owner: String,
    pub token: String,
}

impl Credential {
    pub fn new(owner: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            token: token.into(),
        }
    }
}

// Tokens stay out of logs and panics.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("owner", &self.owner)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Fixed set of credentials handed out in load order, cycling forever.
#[derive(Debug, Default)]
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    cursor: AtomicU64,
}

impl CredentialRotator {
    /// Builds a rotator; a repeated owner keeps its first position and takes the last token.
    pub fn new(credentials: Vec<Credential>) -> Self {
        let mut unique: Vec<Credential> = Vec::with_capacity(credentials.len());
        for credential in credentials {
            match unique.iter_mut().find(|c| c.owner == credential.owner) {
                Some(existing) => {
                    warn!(owner = %credential.owner, "duplicate token owner, keeping the last token");
                    existing.token = credential.token;
                }
                None => unique.push(credential),
            }
        }

        Self {
            credentials: unique,
            cursor: AtomicU64::new(0),
        }
    }

    /// Loads `[{"user": ..., "token": ...}]` from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let credentials: Vec<Credential> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?;

        let rotator = Self::new(credentials);
        info!(count = rotator.len(), path = %path.display(), "loaded API tokens");
        Ok(rotator)
    }

    /// Next credential in round-robin order, `None` when no token is loaded.
    pub fn next(&self) -> Option<&Credential> {
        if self.credentials.is_empty() {
            return None;
        }
        let c = self.cursor.fetch_add(1, Ordering::Relaxed);
        let index = (c % self.credentials.len() as u64) as usize;
        self.credentials.get(index)
    }

    /// Number of credentials handed out so far.
    pub fn issued(&self) -> u64 {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    pub fn owners(&self) -> impl Iterator<Item = &str> {
        self.credentials.iter().map(|c| c.owner.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rotator(n: usize) -> CredentialRotator {
        CredentialRotator::new(
            (0..n)
                .map(|i| Credential::new(format!("user{i}"), format!("token{i}")))
                .collect(),
        )
    }

    #[test]
    fn test_each_credential_used_twice_over_two_cycles() {
        let n = 5;
        let rotator = rotator(n);
        let mut uses: HashMap<String, usize> = HashMap::new();

        for _ in 0..2 * n {
            let credential = rotator.next().unwrap();
            *uses.entry(credential.owner.clone()).or_default() += 1;
        }

        assert_eq!(uses.len(), n);
        assert!(uses.values().all(|&count| count == 2));
        assert_eq!(rotator.issued(), 2 * n as u64);
    }

    #[test]
    fn test_cycle_follows_load_order() {
        let rotator = rotator(3);
        let owners: Vec<String> = (0..4).map(|_| rotator.next().unwrap().owner.clone()).collect();
        assert_eq!(owners, vec!["user0", "user1", "user2", "user0"]);
    }

    #[test]
    fn test_empty_rotator_yields_nothing() {
        let rotator = CredentialRotator::new(Vec::new());
        assert!(rotator.next().is_none());
        assert!(rotator.is_empty());
        assert_eq!(rotator.issued(), 0);
    }

    #[test]
    fn test_duplicate_owner_keeps_last_token() {
        let rotator = CredentialRotator::new(vec![
            Credential::new("alice", "old"),
            Credential::new("bob", "b"),
            Credential::new("alice", "new"),
        ]);
        assert_eq!(rotator.len(), 2);
        let first = rotator.next().unwrap();
        assert_eq!(first.owner, "alice");
        assert_eq!(first.token, "new");
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", Credential::new("alice", "s3cr3t"));
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[tokio::test]
    async fn test_load_from_json_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(
            &path,
            r#"[{"user": "alice", "token": "t1"}, {"user": "bob", "token": "t2"}]"#,
        )
        .unwrap();

        let rotator = CredentialRotator::load(&path).await.unwrap();
        assert_eq!(rotator.owners().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_load_rejects_invalid_json() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokens.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = CredentialRotator::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
    }
}
