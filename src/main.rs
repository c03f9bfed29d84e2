#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use anyhow::Context;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use respect_client::config::{Command, Config};
use respect_client::{
    ApiClient, ApiError, HttpAuthProvider, MemorySessionStore, Session, SessionManager, SessionStore, SharedLocation,
    telemetry,
};
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry, config.api.debug)?;

    let result = run(&config).instrument(tracing::info_span!("respect_client")).await;

    telemetry_guard.shutdown();
    result
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut default_headers = HeaderMap::new();
    if let Some(key) = &config.auth.anon_key {
        default_headers.insert("apikey", HeaderValue::from_str(key).context("invalid anon key")?);
    }
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api.timeout_secs))
        .default_headers(default_headers)
        .build()?;

    let store: Arc<dyn SessionStore> = match (&config.auth.access_token, &config.auth.refresh_token) {
        (Some(access), Some(refresh)) => {
            Arc::new(MemorySessionStore::with_session(Session::new(access, refresh, config.auth.expires_at)))
        }
        _ => Arc::new(MemorySessionStore::new()),
    };
    let provider = Arc::new(HttpAuthProvider::new(http.clone(), &config.auth.auth_url, config.auth.anon_key.clone()));
    let sessions = Arc::new(SessionManager::new(store, provider).with_single_flight(config.auth.single_flight));

    let client = ApiClient::builder(&config.api.base_url, sessions)
        .http_client(http)
        .location(Arc::new(SharedLocation::new(&config.api.current_path)))
        .login_path(&config.api.login_path)
        .debug(config.api.debug)
        .build()?;

    match &config.command {
        Command::Request { method, path, body, headers } => {
            request(&client, method, path, body.as_deref(), headers).await
        }
        Command::Check { paths } => check(&client, paths).await,
    }
}

async fn request(
    client: &ApiClient,
    method: &str,
    path: &str,
    body: Option<&str>,
    headers: &[String],
) -> anyhow::Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).context("invalid HTTP method")?;
    let body: Option<Value> = body.map(serde_json::from_str).transpose().context("request body is not valid JSON")?;
    let headers = headers
        .iter()
        .map(|raw| {
            raw.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .with_context(|| format!("header `{raw}` is not in name:value form"))
        })
        .collect::<anyhow::Result<HashMap<_, _>>>()?;

    match client.request::<Value>(method, path, body, Some(headers)).await {
        Ok(value) => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
            Ok(())
        }
        Err(e) => {
            report_redirect(&e);
            Err(anyhow::anyhow!("{}: {e}", e.user_message()))
        }
    }
}

/// Walks the session and probes each path with it, one line per step.
async fn check(client: &ApiClient, paths: &[String]) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();

    match client.sessions().get_session().await {
        Some(session) if session.is_expired() => {
            writeln!(stdout, "session: present, access token expired {}s ago", -session.remaining_secs())?;
        }
        Some(session) => writeln!(stdout, "session: present, expires in {}s", session.remaining_secs())?,
        None => writeln!(stdout, "session: none, requests go out unauthenticated")?,
    }

    let mut failures = 0usize;
    for path in paths {
        match client.get::<Value>(path).await {
            Ok(_) => writeln!(stdout, "{path}: ok")?,
            Err(e) => {
                failures += 1;
                let status = e.status().map_or_else(|| "-".to_string(), |s| s.as_u16().to_string());
                writeln!(stdout, "{path}: {} ({status}) {}", e.kind(), e.user_message())?;
                if matches!(e, ApiError::AuthFailed { .. }) {
                    report_redirect(&e);
                    break;
                }
            }
        }
    }

    match client.sessions().get_session().await {
        Some(session) => writeln!(stdout, "session after checks: expires in {}s", session.remaining_secs())?,
        None => writeln!(stdout, "session after checks: none")?,
    }

    anyhow::ensure!(failures == 0, "{failures} of {} checks failed", paths.len());
    Ok(())
}

fn report_redirect(error: &ApiError) {
    if let Some(redirect) = error.redirect() {
        tracing::warn!(path = redirect.path(), "Session lost, navigate to login");
    }
}
