//! Session commands: login, register, logout, whoami.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use aqualog_core::session::{AuthOutcome, SessionStore, TokenCache, mask_token};

/// Logs in and persists the session credential.
pub async fn login(base_url: &str, email: &str, password: Option<String>) -> Result<()> {
    let password = resolve_password(password)?;

    let mut store = SessionStore::new(base_url);
    match store.login(email, &password).await {
        AuthOutcome::Success => {
            let user = store.user().context("missing user after login")?;
            println!("Logged in as {} <{}>", user.name, user.email);
            Ok(())
        }
        AuthOutcome::Failure { message } => anyhow::bail!("{message}"),
    }
}

/// Registers an account; the backend auto-logs-in on success.
pub async fn register(
    base_url: &str,
    name: &str,
    email: &str,
    password: Option<String>,
) -> Result<()> {
    let password = resolve_password(password)?;

    let mut store = SessionStore::new(base_url);
    match store.register(name, email, &password).await {
        AuthOutcome::Success => {
            let user = store.user().context("missing user after registration")?;
            println!("Account created. Logged in as {} <{}>", user.name, user.email);
            Ok(())
        }
        AuthOutcome::Failure { message } => anyhow::bail!("{message}"),
    }
}

/// Clears the persisted credential. Never contacts the backend.
pub fn logout(base_url: &str) -> Result<()> {
    let had_token = TokenCache::load_from(&TokenCache::cache_path())
        .map(|cache| cache.get().is_some())
        .unwrap_or(false);

    let mut store = SessionStore::new(base_url);
    store.logout();

    if had_token {
        println!("Logged out");
    } else {
        println!("Not logged in");
    }
    Ok(())
}

/// Validates the persisted session and prints who owns it.
pub async fn whoami(base_url: &str) -> Result<()> {
    let mut store = SessionStore::new(base_url);
    store.bootstrap().await;

    match store.user() {
        Some(user) => {
            let token = store.token().context("missing token for valid session")?;
            println!("{} <{}>", user.name, user.email);
            println!("Token: {}", mask_token(token));
            Ok(())
        }
        None => anyhow::bail!("Not logged in. Run `aqualog login` first."),
    }
}

/// Uses the flag value when given, otherwise prompts on stdin.
fn resolve_password(arg: Option<String>) -> Result<String> {
    if let Some(password) = arg {
        return Ok(password);
    }

    eprint!("Password: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password must not be empty");
    }
    Ok(password)
}
