//! Persisted OAuth credentials.
//!
//! The credential record is a single JSON object on disk:
//! `{clientId, clientSecret, redirectUri, accessToken?, refreshToken?}`.
//! Values in the file take priority over the environment fallback; identity
//! fields may come from either source. Writes merge into the existing record
//! and replace the file through a rename, so readers never see a partial file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::error::SpotifyError;
use crate::core::config::{DEFAULT_REDIRECT_URI, SpotifyConfig};

/// Message returned when no client identity can be found.
const MISSING_IDENTITY: &str = "Credentials not configured. Use spotifyAuth with \
     accion=\"configurar\", clientId=\"your_id\", clientSecret=\"your_secret\"";

/// Fully resolved credentials.
///
/// Absent tokens mean "not authenticated yet": the client falls back to
/// app-only (client-credentials) mode.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Whether both tokens of a user session are present.
    pub fn has_session(&self) -> bool {
        matches!(
            (&self.access_token, &self.refresh_token),
            (Some(access), Some(refresh)) if !access.is_empty() && !refresh.is_empty()
        )
    }

    /// Client id shortened for display (`abcdefgh...wxyz`).
    pub fn masked_client_id(&self) -> String {
        mask(&self.client_id)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.masked_client_id())
            .field("client_secret", &"[REDACTED]")
            .field("redirect_uri", &self.redirect_uri)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Shorten a client id to its first 8 and last 4 characters.
pub fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 12 {
        return format!("{}...", chars.iter().take(4).collect::<String>());
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// The on-disk record. Every field is optional so partial files still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// A partial update merged into the stored record.
///
/// Fields left untouched keep their persisted value. Token fields can also be
/// cleared explicitly.
#[derive(Debug, Clone, Default)]
pub struct CredentialsPatch {
    client_id: Option<String>,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    access_token: Option<Option<String>>,
    refresh_token: Option<Option<String>>,
}

impl CredentialsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client identity.
    pub fn identity(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self.redirect_uri = Some(redirect_uri.into());
        self
    }

    /// Store a freshly obtained token pair.
    pub fn tokens(mut self, access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        self.access_token = Some(Some(access_token.into()));
        self.refresh_token = Some(Some(refresh_token.into()));
        self
    }

    /// Remove both tokens (logout).
    pub fn clear_tokens(mut self) -> Self {
        self.access_token = Some(None);
        self.refresh_token = Some(None);
        self
    }

    fn apply(self, record: &mut StoredCredentials) {
        if let Some(client_id) = self.client_id {
            record.client_id = Some(client_id);
        }
        if let Some(client_secret) = self.client_secret {
            record.client_secret = Some(client_secret);
        }
        if let Some(redirect_uri) = self.redirect_uri {
            record.redirect_uri = Some(redirect_uri);
        }
        if let Some(access_token) = self.access_token {
            record.access_token = access_token;
        }
        if let Some(refresh_token) = self.refresh_token {
            record.refresh_token = refresh_token;
        }
    }
}

/// Environment values used when the credential file lacks identity fields.
#[derive(Debug, Clone, Default)]
pub struct IdentityFallback {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

/// Key-value store over the credential file.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    fallback: IdentityFallback,
}

impl CredentialStore {
    /// Create a store for `path` with the given environment fallback.
    pub fn new(path: impl Into<PathBuf>, fallback: IdentityFallback) -> Self {
        Self {
            path: path.into(),
            fallback,
        }
    }

    /// Create a store from server configuration.
    pub fn from_config(config: &SpotifyConfig) -> Self {
        Self::new(
            config.credentials_path.clone(),
            IdentityFallback {
                client_id: config.client_id.clone(),
                client_secret: config.client_secret.clone(),
                redirect_uri: config.redirect_uri.clone(),
            },
        )
    }

    /// Path of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and resolve credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyError::Configuration`] when no client id or secret is
    /// available from either the file or the environment.
    pub fn load(&self) -> Result<Credentials, SpotifyError> {
        let stored = match self.read() {
            Ok(record) => record,
            Err(e) if e.is_configuration() => {
                warn!("Ignoring credential file: {}", e);
                StoredCredentials::default()
            }
            Err(e) => return Err(e),
        };

        let client_id = non_empty(stored.client_id).or_else(|| self.fallback.client_id.clone());
        let client_secret =
            non_empty(stored.client_secret).or_else(|| self.fallback.client_secret.clone());

        let (Some(client_id), Some(client_secret)) = (client_id, client_secret) else {
            return Err(SpotifyError::configuration(MISSING_IDENTITY));
        };

        let redirect_uri = non_empty(stored.redirect_uri)
            .or_else(|| self.fallback.redirect_uri.clone())
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());

        Ok(Credentials {
            client_id,
            client_secret,
            redirect_uri,
            access_token: non_empty(stored.access_token),
            refresh_token: non_empty(stored.refresh_token),
        })
    }

    /// Merge `patch` into the stored record and write it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written, or
    /// [`SpotifyError::Configuration`] if the existing file is not a valid
    /// record. The file is left untouched in that case.
    pub fn save(&self, patch: CredentialsPatch) -> Result<(), SpotifyError> {
        let mut record = self.read()?;
        patch.apply(&mut record);
        self.write(&record)
    }

    fn read(&self) -> Result<StoredCredentials, SpotifyError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No credential file at {:?}", self.path);
                return Ok(StoredCredentials::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map_err(|e| {
            SpotifyError::configuration(format!(
                "Credential file {} is not valid JSON ({e}). Fix or delete it, then configure again",
                self.path.display()
            ))
        })
    }

    fn write(&self, record: &StoredCredentials) -> Result<(), SpotifyError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_string_pretty(record)?)?;
        restrict_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Saved credentials to {:?}", self.path);
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir, fallback: IdentityFallback) -> CredentialStore {
        CredentialStore::new(dir.path().join("tokens.json"), fallback)
    }

    fn env_identity() -> IdentityFallback {
        IdentityFallback {
            client_id: Some("env_client_id".to_string()),
            client_secret: Some("env_secret".to_string()),
            redirect_uri: None,
        }
    }

    #[test]
    fn test_load_without_identity_is_configuration_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, IdentityFallback::default());
        let err = store.load().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("configurar"));
    }

    #[test]
    fn test_load_falls_back_to_environment() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, env_identity());
        let creds = store.load().unwrap();
        assert_eq!(creds.client_id, "env_client_id");
        assert_eq!(creds.redirect_uri, DEFAULT_REDIRECT_URI);
        assert!(!creds.has_session());
    }

    #[test]
    fn test_file_takes_priority_over_environment() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, env_identity());
        store
            .save(CredentialsPatch::new().identity("file_id", "file_secret", "http://localhost:9000/cb"))
            .unwrap();

        let creds = store.load().unwrap();
        assert_eq!(creds.client_id, "file_id");
        assert_eq!(creds.client_secret, "file_secret");
        assert_eq!(creds.redirect_uri, "http://localhost:9000/cb");
    }

    #[test]
    fn test_save_merges_instead_of_replacing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, IdentityFallback::default());
        store
            .save(CredentialsPatch::new().identity("id", "secret", DEFAULT_REDIRECT_URI))
            .unwrap();
        store
            .save(CredentialsPatch::new().tokens("access", "refresh"))
            .unwrap();

        let creds = store.load().unwrap();
        assert_eq!(creds.client_id, "id");
        assert_eq!(creds.access_token.as_deref(), Some("access"));
        assert_eq!(creds.refresh_token.as_deref(), Some("refresh"));
        assert!(creds.has_session());
    }

    #[test]
    fn test_clear_tokens_keeps_identity() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, IdentityFallback::default());
        store
            .save(
                CredentialsPatch::new()
                    .identity("id", "secret", DEFAULT_REDIRECT_URI)
                    .tokens("access", "refresh"),
            )
            .unwrap();
        store.save(CredentialsPatch::new().clear_tokens()).unwrap();

        let creds = store.load().unwrap();
        assert_eq!(creds.client_id, "id");
        assert!(creds.access_token.is_none());
        assert!(creds.refresh_token.is_none());

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("accessToken"));
        assert!(raw.contains("clientId"));
    }

    #[test]
    fn test_unreadable_file_is_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, env_identity());
        fs::write(store.path(), "not json").unwrap();
        let creds = store.load().unwrap();
        assert_eq!(creds.client_id, "env_client_id");
    }

    #[test]
    fn test_save_refuses_to_overwrite_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, env_identity());
        fs::write(store.path(), "not json").unwrap();

        let err = store
            .save(CredentialsPatch::new().tokens("access", "refresh"))
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("tokens.json"));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "not json");
    }

    #[test]
    fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir, IdentityFallback::default());
        store
            .save(CredentialsPatch::new().identity("id", "secret", DEFAULT_REDIRECT_URI))
            .unwrap();
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_mask_client_id() {
        assert_eq!(mask("0123456789abcdefWXYZ"), "01234567...WXYZ");
        assert_eq!(mask("short"), "shor...");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = Credentials {
            client_id: "0123456789abcdefWXYZ".to_string(),
            client_secret: "very_secret".to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            access_token: Some("token_value".to_string()),
            refresh_token: None,
        };
        let debug_str = format!("{:?}", creds);
        assert!(!debug_str.contains("very_secret"));
        assert!(!debug_str.contains("token_value"));
    }
}
