//! Session state and credential persistence.
//!
//! Stores the bearer token in `<home>/auth.json` with restricted permissions
//! (0600). The token is never logged in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::{self, ApiError};
use crate::config::paths;

/// Minimum accepted password length, checked before any network call.
const MIN_PASSWORD_LEN: usize = 8;

const LOGIN_FALLBACK: &str = "Login failed";
const REGISTER_FALLBACK: &str = "Registration failed";

/// Persisted credential file structure.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TokenCache {
    /// The bearer token, absent when logged out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl TokenCache {
    /// Returns the default path to the credential file.
    pub fn cache_path() -> PathBuf {
        paths::auth_path()
    }

    /// Loads the credential cache from a path.
    /// Returns an empty cache if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {}", path.display()))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {}", path.display()))
    }

    /// Saves the credential cache to a path with restricted permissions (0600).
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(self).context("Failed to serialize credentials")?;

        // Write with restricted permissions
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(path)
                .with_context(|| format!("Failed to open {} for writing", path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(path, contents)
                .with_context(|| format!("Failed to write to {}", path.display()))?;
        }

        Ok(())
    }

    /// Returns the stored token, if any.
    pub fn get(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Replaces the stored token.
    pub fn set(&mut self, token: &str) {
        self.token = Some(token.to_string());
    }

    /// Removes the stored token, returning it if one was present.
    pub fn remove(&mut self) -> Option<String> {
        self.token.take()
    }
}

/// Authenticated user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Backend-assigned identifier.
    #[serde(alias = "_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

/// Where the session stands relative to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    /// Not yet checked against persisted state.
    #[default]
    Unknown,
    /// A validated token and user profile are held.
    Authenticated,
    /// No usable credential.
    Unauthenticated,
}

/// Result of a login or registration attempt.
///
/// These operations never propagate errors as `Err`; the calling screen
/// displays the message and lets the user retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Session established and credential persisted.
    Success,
    /// Attempt rejected; existing session state is untouched.
    Failure {
        /// Human-readable message for display.
        message: String,
    },
}

impl AuthOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    /// Returns true for the success variant.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    user: User,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: User,
}

/// Single source of truth for "am I logged in, and as whom".
///
/// Owns the bearer token and user profile, and persists/clears the credential
/// as a side effect of its operations. One instance is created at startup and
/// handed to every caller that needs authentication.
pub struct SessionStore {
    http: reqwest::Client,
    base_url: String,
    cache_path: PathBuf,
    status: SessionStatus,
    token: Option<String>,
    user: Option<User>,
    loading: bool,
}

impl SessionStore {
    /// Creates a session store talking to the given backend.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_cache_path(base_url, TokenCache::cache_path())
    }

    /// Creates a session store with an explicit credential file path.
    ///
    /// Used by tests to avoid touching the real home directory.
    pub fn with_cache_path(base_url: impl Into<String>, cache_path: PathBuf) -> Self {
        let base_url = base_url.into();
        api::guard_real_api(&base_url);

        Self {
            http: reqwest::Client::new(),
            base_url,
            cache_path,
            status: SessionStatus::Unknown,
            token: None,
            user: None,
            loading: true,
        }
    }

    /// Current session status.
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The validated user profile, present iff authenticated.
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// The bearer token, present iff authenticated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// True until `bootstrap` has run to completion.
    ///
    /// Dependent screens must not render while this is set.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// True when a validated session is held.
    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    /// Restores session state from the persisted credential.
    ///
    /// A persisted token is validated against the profile endpoint. Any
    /// failure (missing token, network error, rejected token) ends in
    /// `Unauthenticated` with the stale credential cleared; nothing is
    /// surfaced to the user since this runs before any screen is shown.
    pub async fn bootstrap(&mut self) {
        let stored = match TokenCache::load_from(&self.cache_path) {
            Ok(cache) => cache.token,
            Err(err) => {
                tracing::warn!("failed to read credential cache: {err:#}");
                None
            }
        };

        let Some(token) = stored else {
            self.status = SessionStatus::Unauthenticated;
            self.loading = false;
            return;
        };

        match self.fetch_profile(&token).await {
            Ok(user) => {
                tracing::debug!(user = %user.email, "session restored");
                self.token = Some(token);
                self.user = Some(user);
                self.status = SessionStatus::Authenticated;
            }
            Err(err) => {
                // Token and user are cleared together; a credential that
                // failed validation must not linger on disk.
                tracing::debug!(kind = %err.kind, "auth check failed: {err}");
                self.clear_persisted_token();
                self.token = None;
                self.user = None;
                self.status = SessionStatus::Unauthenticated;
            }
        }

        self.loading = false;
    }

    /// Exchanges credentials for a session.
    ///
    /// On success the token is persisted and the store becomes authenticated.
    /// On failure existing session state is left untouched and the returned
    /// message comes from the backend (or a generic fallback).
    pub async fn login(&mut self, email: &str, password: &str) -> AuthOutcome {
        if let Some(message) = validate_credentials(email, password) {
            return AuthOutcome::failure(message);
        }

        let body = serde_json::json!({
            "email": email,
            "password": password,
        });
        self.authenticate("/auth/login", &body, LOGIN_FALLBACK).await
    }

    /// Registers a new account; the backend auto-logs-in on success.
    ///
    /// Same contract as `login`.
    pub async fn register(&mut self, name: &str, email: &str, password: &str) -> AuthOutcome {
        if name.trim().is_empty() {
            return AuthOutcome::failure("Name is required");
        }
        if let Some(message) = validate_credentials(email, password) {
            return AuthOutcome::failure(message);
        }

        let body = serde_json::json!({
            "name": name,
            "email": email,
            "password": password,
        });
        self.authenticate("/auth/register", &body, REGISTER_FALLBACK)
            .await
    }

    /// Tears down the session: clears the persisted token and in-memory
    /// state unconditionally. Does not contact the backend; cannot fail.
    pub fn logout(&mut self) {
        self.clear_persisted_token();
        self.token = None;
        self.user = None;
        self.status = SessionStatus::Unauthenticated;
    }

    async fn authenticate(
        &mut self,
        endpoint: &str,
        body: &serde_json::Value,
        fallback: &str,
    ) -> AuthOutcome {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = match self
            .http
            .post(&url)
            .header(reqwest::header::USER_AGENT, api::USER_AGENT)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!("auth request failed: {err}");
                return AuthOutcome::failure(fallback);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ApiError::from_status(status, &body, fallback);
            tracing::debug!(kind = %err.kind, "auth rejected: {err}");
            return AuthOutcome::failure(err.message);
        }

        let auth: AuthResponse = match response.json().await {
            Ok(auth) => auth,
            Err(err) => {
                tracing::debug!("auth response parse failed: {err}");
                return AuthOutcome::failure(fallback);
            }
        };

        self.persist_token(&auth.token);
        self.token = Some(auth.token);
        self.user = Some(auth.user);
        self.status = SessionStatus::Authenticated;
        AuthOutcome::Success
    }

    async fn fetch_profile(&self, token: &str) -> api::ApiResult<User> {
        let url = format!("{}/auth/me", self.base_url);
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, api::USER_AGENT)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| ApiError::from_transport(&err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, &body, "Auth check failed"));
        }

        let profile: ProfileResponse = response
            .json()
            .await
            .map_err(|_| ApiError::unexpected("Malformed profile response"))?;
        Ok(profile.user)
    }

    /// Persistence failures are logged, not surfaced: the in-memory session
    /// stays valid for this process either way.
    fn persist_token(&self, token: &str) {
        let mut cache = TokenCache::load_from(&self.cache_path).unwrap_or_default();
        cache.set(token);
        if let Err(err) = cache.save_to(&self.cache_path) {
            tracing::warn!("failed to persist token: {err:#}");
        }
    }

    fn clear_persisted_token(&self) {
        let cache = match TokenCache::load_from(&self.cache_path) {
            Ok(mut cache) => {
                if cache.remove().is_none() {
                    return;
                }
                cache
            }
            // An unreadable or corrupt cache file still gets overwritten;
            // whatever credential text it held must not survive on disk.
            Err(err) => {
                tracing::warn!("failed to read credential cache: {err:#}");
                TokenCache::default()
            }
        };
        if let Err(err) = cache.save_to(&self.cache_path) {
            tracing::warn!("failed to clear persisted token: {err:#}");
        }
    }
}

/// Local gate applied before any network call.
///
/// Returns a rejection message, or `None` when the credentials may be sent.
fn validate_credentials(email: &str, password: &str) -> Option<String> {
    if !looks_like_email(email) {
        return Some("Please enter a valid email address".to_string());
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Some(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    None
}

/// Minimal `local@domain` shape check.
fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
}

/// Returns a masked version of a token for display (first 8 chars + ...).
///
/// Counts characters, not bytes; tokens are backend-supplied and opaque.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 12 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(8).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: credential cache serialization roundtrip (in-memory, no fs).
    #[test]
    fn test_token_cache_serialization() {
        let mut cache = TokenCache::default();
        cache.set("jwt-token-value");

        let json = serde_json::to_string(&cache).unwrap();
        let loaded: TokenCache = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.get(), Some("jwt-token-value"));
    }

    /// Test: credential cache remove.
    #[test]
    fn test_token_cache_remove() {
        let mut cache = TokenCache::default();
        cache.set("jwt");
        assert_eq!(cache.remove().as_deref(), Some("jwt"));
        assert!(cache.get().is_none());
        assert!(cache.remove().is_none());
    }

    /// Test: credential cache file roundtrip with restricted permissions.
    #[test]
    fn test_token_cache_file_roundtrip() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("auth.json");

        let mut cache = TokenCache::default();
        cache.set("persisted-token");
        cache.save_to(&path).unwrap();

        let loaded = TokenCache::load_from(&path).unwrap();
        assert_eq!(loaded.get(), Some("persisted-token"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    /// Test: loading a missing cache file yields an empty cache.
    #[test]
    fn test_token_cache_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let cache = TokenCache::load_from(&temp.path().join("auth.json")).unwrap();
        assert!(cache.get().is_none());
    }

    /// Test: email shape gate.
    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("user@example.com"));
        assert!(looks_like_email("a@b"));
        assert!(!looks_like_email("no-at-sign"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("user@"));
        assert!(!looks_like_email("user name@example.com"));
    }

    /// Test: short passwords are rejected before any network call.
    #[tokio::test]
    async fn test_login_rejects_short_password_locally() {
        let temp = tempfile::tempdir().unwrap();
        // Unroutable base URL: a network attempt would fail differently
        // than the local gate message asserted below.
        let mut store =
            SessionStore::with_cache_path("http://127.0.0.1:1", temp.path().join("auth.json"));

        let outcome = store.login("user@example.com", "short").await;
        let AuthOutcome::Failure { message } = outcome else {
            panic!("short password must be rejected");
        };
        assert!(message.contains("at least 8 characters"));
        assert_eq!(store.status(), SessionStatus::Unknown);
        assert!(store.token().is_none());
    }

    /// Test: malformed email is rejected before any network call.
    #[tokio::test]
    async fn test_login_rejects_bad_email_locally() {
        let temp = tempfile::tempdir().unwrap();
        let mut store =
            SessionStore::with_cache_path("http://127.0.0.1:1", temp.path().join("auth.json"));

        let outcome = store.login("not-an-email", "longenough").await;
        assert!(!outcome.is_success());
        assert_eq!(store.status(), SessionStatus::Unknown);
    }

    /// Test: register requires a name.
    #[tokio::test]
    async fn test_register_requires_name() {
        let temp = tempfile::tempdir().unwrap();
        let mut store =
            SessionStore::with_cache_path("http://127.0.0.1:1", temp.path().join("auth.json"));

        let outcome = store.register("  ", "user@example.com", "longenough").await;
        let AuthOutcome::Failure { message } = outcome else {
            panic!("blank name must be rejected");
        };
        assert!(message.contains("Name"));
    }

    /// Test: token masking.
    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("eyJhbGciOiJIUzI1NiJ9"), "eyJhbGci...");
        assert_eq!(mask_token("short"), "***");
    }

    /// Test: masking counts characters, so multi-byte tokens never split
    /// mid-character.
    #[test]
    fn test_mask_token_multibyte() {
        // 10 chars, 30 bytes: fully masked.
        assert_eq!(mask_token("トークン値あいうえお"), "***");
        // 13 chars: first 8 chars kept, regardless of byte offsets.
        assert_eq!(mask_token("トークン値あいうえおかきく"), "トークン値あいう...");
    }

    /// Test: logout overwrites a corrupt cache file instead of leaving the
    /// stale credential text on disk.
    #[test]
    fn test_logout_overwrites_corrupt_cache() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("auth.json");
        fs::write(&path, r#"{"token": "stale-jwt" garbage"#).unwrap();

        let mut store = SessionStore::with_cache_path("http://127.0.0.1:1", path.clone());
        store.logout();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(
            !contents.contains("stale-jwt"),
            "credential text must not survive logout: {contents}"
        );
        let cache = TokenCache::load_from(&path).unwrap();
        assert!(cache.get().is_none());
    }
}
